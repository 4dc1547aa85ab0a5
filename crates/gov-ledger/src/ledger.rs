// ledger.rs — Append-only JSONL receipt log.
//
// One JSON object per line. Each receipt links to the previous one via
// `previous_hash` (the SHA-256 of the prior raw line), forming a chain:
// inserting, deleting, or modifying any line is detectable by
// `verify_chain`. Appends are one line plus flush, so a partially written
// receipt is never visible, and append order matches the causal order of
// the decisions recorded.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::LedgerError;
use crate::hasher;
use crate::receipt::Receipt;
use crate::signer::ReceiptSigner;

/// An append-only receipt log backed by a JSONL file.
pub struct ReceiptLedger {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Hash of the last line written — the next receipt's `previous_hash`.
    last_hash: Option<String>,
    /// Optional signer attesting each appended receipt.
    signer: Option<ReceiptSigner>,
}

impl ReceiptLedger {
    /// Open (or create) a ledger at the given path.
    ///
    /// If the file already exists, the last line is read back so new
    /// receipts continue the existing chain.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open_inner(path.as_ref(), None)
    }

    /// Open a ledger that signs every appended receipt.
    pub fn open_with_signer(
        path: impl AsRef<Path>,
        signer: ReceiptSigner,
    ) -> Result<Self, LedgerError> {
        Self::open_inner(path.as_ref(), Some(signer))
    }

    fn open_inner(path: &Path, signer: Option<ReceiptSigner>) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LedgerError::OpenFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let last_hash = if path.exists() {
            Self::read_last_hash(path)?
        } else {
            None
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LedgerError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            last_hash,
            signer,
        })
    }

    /// Append a receipt, linking and (when configured) signing it.
    pub fn append(&mut self, receipt: &mut Receipt) -> Result<(), LedgerError> {
        receipt.previous_hash = self.last_hash.clone();
        if let Some(signer) = &self.signer {
            receipt.signature = Some(signer.sign(&receipt.payload_hash));
        }

        let json = serde_json::to_string(receipt)?;
        self.last_hash = Some(hasher::hash_str(&json));

        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        debug!(
            execution_id = %receipt.execution_id,
            kind = ?receipt.kind,
            "receipt appended"
        );
        Ok(())
    }

    /// Read all receipts from a ledger file, oldest first.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<Receipt>, LedgerError> {
        let file = File::open(path.as_ref()).map_err(|source| LedgerError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut receipts = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            receipts.push(serde_json::from_str(&line)?);
        }
        Ok(receipts)
    }

    /// Read the receipts at or after a cutoff time.
    pub fn read_since(
        path: impl AsRef<Path>,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Receipt>, LedgerError> {
        Ok(Self::read_all(path)?
            .into_iter()
            .filter(|r| r.timestamp >= cutoff)
            .collect())
    }

    /// Verify the hash chain of a ledger file.
    ///
    /// Hashes each raw line (not the re-serialized receipt — field order
    /// must not matter) and checks the next line's `previous_hash` link.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, LedgerError> {
        let file = File::open(path.as_ref()).map_err(|source| LedgerError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut previous_hash: Option<String> = None;
        let mut count = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let receipt: Receipt = serde_json::from_str(&line)?;
            if receipt.previous_hash != previous_hash {
                return Err(LedgerError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: receipt.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            previous_hash = Some(hasher::hash_str(&line));
            count += 1;
        }

        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_last_hash(path: &Path) -> Result<Option<String>, LedgerError> {
        let file = File::open(path).map_err(|source| LedgerError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut last_line: Option<String> = None;
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                last_line = Some(line);
            }
        }
        Ok(last_line.map(|line| hasher::hash_str(&line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::{ReceiptKind, ReceiptPayload};
    use crate::signer::verify_signature;
    use tempfile::tempdir;

    fn receipt(execution_id: &str, kind: ReceiptKind) -> Receipt {
        Receipt::new(
            execution_id,
            kind,
            ReceiptPayload::Generic {
                data: serde_json::json!({"note": "test"}),
            },
        )
    }

    #[test]
    fn append_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipts.jsonl");
        {
            let mut ledger = ReceiptLedger::open(&path).unwrap();
            let mut a = receipt("exec-1", ReceiptKind::ApprovalRequested);
            let mut b = receipt("exec-1", ReceiptKind::ApprovalRejected);
            ledger.append(&mut a).unwrap();
            ledger.append(&mut b).unwrap();
        }

        let receipts = ReceiptLedger::read_all(&path).unwrap();
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].kind, ReceiptKind::ApprovalRequested);
        assert!(receipts[0].previous_hash.is_none());
        assert!(receipts[1].previous_hash.is_some());
    }

    #[test]
    fn chain_verifies_clean_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipts.jsonl");
        {
            let mut ledger = ReceiptLedger::open(&path).unwrap();
            for i in 0..5 {
                let mut r = receipt(&format!("exec-{}", i), ReceiptKind::ExecutionCompleted);
                ledger.append(&mut r).unwrap();
            }
        }
        assert_eq!(ReceiptLedger::verify_chain(&path).unwrap(), 5);
    }

    #[test]
    fn reopen_continues_the_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipts.jsonl");
        {
            let mut ledger = ReceiptLedger::open(&path).unwrap();
            ledger
                .append(&mut receipt("exec-1", ReceiptKind::PolicyDenied))
                .unwrap();
        }
        {
            let mut ledger = ReceiptLedger::open(&path).unwrap();
            ledger
                .append(&mut receipt("exec-2", ReceiptKind::PolicyDenied))
                .unwrap();
        }
        assert_eq!(ReceiptLedger::verify_chain(&path).unwrap(), 2);
    }

    #[test]
    fn tampered_line_breaks_verification() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipts.jsonl");
        {
            let mut ledger = ReceiptLedger::open(&path).unwrap();
            for i in 0..3 {
                let mut r = receipt(&format!("exec-{}", i), ReceiptKind::ExecutionCompleted);
                ledger.append(&mut r).unwrap();
            }
        }

        // Mutate one byte of the middle line.
        let content = std::fs::read_to_string(&path).unwrap();
        let tampered = content.replacen("exec-1", "exec-X", 1);
        assert_ne!(content, tampered);
        std::fs::write(&path, tampered).unwrap();

        match ReceiptLedger::verify_chain(&path) {
            Err(LedgerError::IntegrityViolation { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected IntegrityViolation, got {:?}", other),
        }
    }

    #[test]
    fn deleted_line_breaks_verification() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipts.jsonl");
        {
            let mut ledger = ReceiptLedger::open(&path).unwrap();
            for i in 0..3 {
                let mut r = receipt(&format!("exec-{}", i), ReceiptKind::ExecutionCompleted);
                ledger.append(&mut r).unwrap();
            }
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let without_middle: Vec<&str> = content
            .lines()
            .enumerate()
            .filter(|(i, _)| *i != 1)
            .map(|(_, l)| l)
            .collect();
        std::fs::write(&path, format!("{}\n", without_middle.join("\n"))).unwrap();

        assert!(matches!(
            ReceiptLedger::verify_chain(&path),
            Err(LedgerError::IntegrityViolation { .. })
        ));
    }

    #[test]
    fn read_since_filters_by_cutoff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipts.jsonl");
        {
            let mut ledger = ReceiptLedger::open(&path).unwrap();
            ledger
                .append(&mut receipt("exec-1", ReceiptKind::ExecutionCompleted))
                .unwrap();
        }

        let future: DateTime<Utc> = Utc::now() + chrono::Duration::hours(1);
        assert!(ReceiptLedger::read_since(&path, future).unwrap().is_empty());

        let past: DateTime<Utc> = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(ReceiptLedger::read_since(&path, past).unwrap().len(), 1);
    }

    #[test]
    fn signed_receipts_verify_against_the_public_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipts.jsonl");
        let (signer, _pkcs8) = ReceiptSigner::generate().unwrap();
        let public_key = signer.public_key_b64();

        {
            let mut ledger = ReceiptLedger::open_with_signer(&path, signer).unwrap();
            ledger
                .append(&mut receipt("exec-1", ReceiptKind::ApprovalGranted))
                .unwrap();
        }

        let receipts = ReceiptLedger::read_all(&path).unwrap();
        let signature = receipts[0].signature.as_deref().unwrap();
        assert!(verify_signature(&public_key, &receipts[0].payload_hash, signature).unwrap());
        // A different message must not verify.
        assert!(!verify_signature(&public_key, "other", signature).unwrap());
    }
}
