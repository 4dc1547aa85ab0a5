// export.rs — Self-contained audit export bundles.
//
// An export bundle is a directory that can be verified with no network and
// no access to the original system:
//
//   receipts.jsonl            — receipts at or after the cutoff, raw lines
//   exhibits/approvals/       — approval records (redacted copies)
//   exhibits/baselines/       — baseline history (redacted copies)
//   exhibits/suspensions/     — suspension records (redacted copies)
//   policy_snapshot.json      — the policy configuration at export time
//   manifest.json             — path, SHA-256, and byte size of every file
//                               above, plus the manifest's own hash
//
// Receipts are copied as raw lines, never re-serialized, so the chain
// bytes in the bundle are byte-identical to the source log. Redaction
// replaces configured field names recursively with "[redacted]" in the
// exhibit copies only — the source ledgers are never touched.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::LedgerError;
use crate::hasher;
use crate::receipt::Receipt;

/// One exported file: relative path, digest, size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

/// The bundle manifest — immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditExportManifest {
    pub created_at: DateTime<Utc>,
    pub files: Vec<ManifestEntry>,
    /// SHA-256 over the serialized (created_at, files) pair.
    pub manifest_hash: String,
}

/// What goes into a bundle. Directories are optional so callers can export
/// partial systems (e.g., no suspensions yet).
pub struct ExportSources<'a> {
    pub receipts_log: &'a Path,
    pub approvals_dir: Option<&'a Path>,
    pub baselines_dir: Option<&'a Path>,
    pub suspensions_dir: Option<&'a Path>,
    /// The policy configuration at export time, as JSON.
    pub policy_snapshot: Value,
}

/// The verifier's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub ok: bool,
    pub files_checked: usize,
    /// Human-readable descriptions of every mismatch found.
    pub failures: Vec<String>,
}

/// Produce a bundle under `bundle_dir`.
///
/// `cutoff` filters receipts (None exports all); `redact_fields` names the
/// JSON fields to blank out in exhibit copies.
pub fn export_bundle(
    bundle_dir: impl AsRef<Path>,
    cutoff: Option<DateTime<Utc>>,
    sources: &ExportSources<'_>,
    redact_fields: &[String],
) -> Result<AuditExportManifest, LedgerError> {
    let bundle_dir = bundle_dir.as_ref();
    fs::create_dir_all(bundle_dir).map_err(|source| LedgerError::OpenFailed {
        path: bundle_dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();

    // Receipts: copy raw lines at/after the cutoff so chain bytes survive.
    let receipts_out = bundle_dir.join("receipts.jsonl");
    copy_filtered_receipts(sources.receipts_log, &receipts_out, cutoff)?;
    files.push(manifest_entry(bundle_dir, &receipts_out)?);

    // Supporting ledgers, redacted.
    for (dir, name) in [
        (sources.approvals_dir, "approvals"),
        (sources.baselines_dir, "baselines"),
        (sources.suspensions_dir, "suspensions"),
    ] {
        let Some(dir) = dir else { continue };
        if !dir.exists() {
            continue;
        }
        let out_dir = bundle_dir.join("exhibits").join(name);
        fs::create_dir_all(&out_dir).map_err(|source| LedgerError::OpenFailed {
            path: out_dir.clone(),
            source,
        })?;
        for path in list_record_files(dir)? {
            let out_path = out_dir.join(path.file_name().unwrap_or_default());
            copy_redacted(&path, &out_path, redact_fields)?;
            files.push(manifest_entry(bundle_dir, &out_path)?);
        }
    }

    // Policy snapshot.
    let snapshot_path = bundle_dir.join("policy_snapshot.json");
    let snapshot_json = serde_json::to_string_pretty(&sources.policy_snapshot)?;
    fs::write(&snapshot_path, &snapshot_json)?;
    files.push(manifest_entry(bundle_dir, &snapshot_path)?);

    files.sort_by(|a, b| a.path.cmp(&b.path));

    // Manifest last — it lists everything else.
    let created_at = Utc::now();
    let manifest = AuditExportManifest {
        manifest_hash: compute_manifest_hash(created_at, &files)?,
        created_at,
        files,
    };
    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    fs::write(bundle_dir.join("manifest.json"), manifest_json)?;

    info!(
        bundle = %bundle_dir.display(),
        files = manifest.files.len(),
        "audit bundle exported"
    );
    Ok(manifest)
}

/// Verify a bundle by recomputing every digest and the manifest hash.
///
/// Needs nothing but the bundle directory. Returns a report rather than an
/// error for content mismatches; errors are reserved for a missing or
/// unreadable manifest.
pub fn verify_bundle(bundle_dir: impl AsRef<Path>) -> Result<VerificationReport, LedgerError> {
    let bundle_dir = bundle_dir.as_ref();
    let manifest_path = bundle_dir.join("manifest.json");
    if !manifest_path.exists() {
        return Err(LedgerError::MissingManifest {
            path: bundle_dir.to_path_buf(),
        });
    }
    let manifest: AuditExportManifest = serde_json::from_str(
        &fs::read_to_string(&manifest_path).map_err(|source| LedgerError::OpenFailed {
            path: manifest_path.clone(),
            source,
        })?,
    )?;

    let mut failures = Vec::new();
    for entry in &manifest.files {
        let path = bundle_dir.join(&entry.path);
        if !path.exists() {
            failures.push(format!("{}: listed in manifest but missing", entry.path));
            continue;
        }
        let digest = hasher::hash_file(&path)?;
        if digest != entry.sha256 {
            failures.push(format!(
                "{}: digest mismatch (manifest {}, actual {})",
                entry.path, entry.sha256, digest
            ));
        }
        let bytes = fs::metadata(&path)?.len();
        if bytes != entry.bytes {
            failures.push(format!(
                "{}: size mismatch (manifest {}, actual {})",
                entry.path, entry.bytes, bytes
            ));
        }
    }

    let expected_hash = compute_manifest_hash(manifest.created_at, &manifest.files)?;
    if expected_hash != manifest.manifest_hash {
        failures.push(format!(
            "manifest_hash mismatch (recorded {}, recomputed {})",
            manifest.manifest_hash, expected_hash
        ));
    }

    Ok(VerificationReport {
        ok: failures.is_empty(),
        files_checked: manifest.files.len(),
        failures,
    })
}

/// The manifest hash covers the creation time and the full file table.
fn compute_manifest_hash(
    created_at: DateTime<Utc>,
    files: &[ManifestEntry],
) -> Result<String, LedgerError> {
    let material = serde_json::to_string(&(created_at, files))?;
    Ok(hasher::hash_str(&material))
}

fn manifest_entry(bundle_dir: &Path, path: &Path) -> Result<ManifestEntry, LedgerError> {
    let relative = path
        .strip_prefix(bundle_dir)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Ok(ManifestEntry {
        path: relative,
        sha256: hasher::hash_file(path)?,
        bytes: fs::metadata(path)?.len(),
    })
}

fn copy_filtered_receipts(
    source: &Path,
    dest: &Path,
    cutoff: Option<DateTime<Utc>>,
) -> Result<(), LedgerError> {
    let mut out = File::create(dest).map_err(|source_err| LedgerError::OpenFailed {
        path: dest.to_path_buf(),
        source: source_err,
    })?;
    if !source.exists() {
        return Ok(());
    }
    let reader = BufReader::new(File::open(source).map_err(|source_err| {
        LedgerError::OpenFailed {
            path: source.to_path_buf(),
            source: source_err,
        }
    })?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let receipt: Receipt = serde_json::from_str(&line)?;
        if cutoff.map_or(true, |c| receipt.timestamp >= c) {
            writeln!(out, "{}", line)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Copy one record file, redacting the named fields. JSONL files are
/// redacted line by line; plain JSON files as one document.
fn copy_redacted(source: &Path, dest: &Path, redact_fields: &[String]) -> Result<(), LedgerError> {
    let content = fs::read_to_string(source).map_err(|source_err| LedgerError::OpenFailed {
        path: source.to_path_buf(),
        source: source_err,
    })?;

    if source.extension().is_some_and(|ext| ext == "jsonl") {
        let mut out = String::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let mut value: Value = serde_json::from_str(line)?;
            redact(&mut value, redact_fields);
            out.push_str(&serde_json::to_string(&value)?);
            out.push('\n');
        }
        fs::write(dest, out)?;
    } else {
        let mut value: Value = serde_json::from_str(&content)?;
        redact(&mut value, redact_fields);
        fs::write(dest, serde_json::to_string_pretty(&value)?)?;
    }
    Ok(())
}

/// Recursively replace the named fields with a redaction marker.
fn redact(value: &mut Value, fields: &[String]) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if fields.iter().any(|f| f == key) {
                    *child = Value::String("[redacted]".to_string());
                } else {
                    redact(child, fields);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact(item, fields);
            }
        }
        _ => {}
    }
}

fn list_record_files(dir: &Path) -> Result<Vec<PathBuf>, LedgerError> {
    let entries = fs::read_dir(dir).map_err(|source| LedgerError::OpenFailed {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let is_record = path
            .extension()
            .is_some_and(|ext| ext == "json" || ext == "jsonl");
        if path.is_file() && is_record {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ReceiptLedger;
    use crate::receipt::{Receipt, ReceiptKind, ReceiptPayload};
    use tempfile::tempdir;

    fn seed_sources(root: &Path) -> (PathBuf, PathBuf) {
        let receipts = root.join("receipts.jsonl");
        let mut ledger = ReceiptLedger::open(&receipts).unwrap();
        for i in 0..3 {
            let mut r = Receipt::new(
                format!("exec-{}", i),
                ReceiptKind::ExecutionCompleted,
                ReceiptPayload::Execution {
                    status: "succeeded".to_string(),
                    confidence: 90,
                },
            );
            ledger.append(&mut r).unwrap();
        }

        let approvals = root.join("approvals");
        fs::create_dir_all(&approvals).unwrap();
        fs::write(
            approvals.join("exec-1.json"),
            serde_json::to_string_pretty(&serde_json::json!({
                "execution_id": "exec-1",
                "status": "approved",
                "api_token": "secret-token-value"
            }))
            .unwrap(),
        )
        .unwrap();

        (receipts, approvals)
    }

    fn sources<'a>(receipts: &'a Path, approvals: &'a Path) -> ExportSources<'a> {
        ExportSources {
            receipts_log: receipts,
            approvals_dir: Some(approvals),
            baselines_dir: None,
            suspensions_dir: None,
            policy_snapshot: serde_json::json!({"policy_version": "v3", "max_steps": 20}),
        }
    }

    #[test]
    fn export_then_verify_succeeds() {
        let dir = tempdir().unwrap();
        let (receipts, approvals) = seed_sources(dir.path());
        let bundle = dir.path().join("bundle");

        let manifest =
            export_bundle(&bundle, None, &sources(&receipts, &approvals), &[]).unwrap();
        assert!(manifest.files.len() >= 3); // receipts + approval + snapshot

        let report = verify_bundle(&bundle).unwrap();
        assert!(report.ok, "failures: {:?}", report.failures);
        assert_eq!(report.files_checked, manifest.files.len());
    }

    #[test]
    fn single_byte_mutation_fails_verification() {
        let dir = tempdir().unwrap();
        let (receipts, approvals) = seed_sources(dir.path());
        let bundle = dir.path().join("bundle");
        export_bundle(&bundle, None, &sources(&receipts, &approvals), &[]).unwrap();

        // Flip one byte in an exported exhibit.
        let target = bundle.join("exhibits").join("approvals").join("exec-1.json");
        let mut content = fs::read(&target).unwrap();
        content[0] ^= 0x01;
        fs::write(&target, content).unwrap();

        let report = verify_bundle(&bundle).unwrap();
        assert!(!report.ok);
        assert!(report.failures.iter().any(|f| f.contains("exec-1.json")));
    }

    #[test]
    fn tampered_manifest_hash_is_detected() {
        let dir = tempdir().unwrap();
        let (receipts, approvals) = seed_sources(dir.path());
        let bundle = dir.path().join("bundle");
        export_bundle(&bundle, None, &sources(&receipts, &approvals), &[]).unwrap();

        let manifest_path = bundle.join("manifest.json");
        let mut manifest: AuditExportManifest =
            serde_json::from_str(&fs::read_to_string(&manifest_path).unwrap()).unwrap();
        manifest.manifest_hash = "0".repeat(64);
        fs::write(
            &manifest_path,
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();

        let report = verify_bundle(&bundle).unwrap();
        assert!(!report.ok);
        assert!(report
            .failures
            .iter()
            .any(|f| f.contains("manifest_hash mismatch")));
    }

    #[test]
    fn redaction_blanks_secret_fields_in_copies_only() {
        let dir = tempdir().unwrap();
        let (receipts, approvals) = seed_sources(dir.path());
        let bundle = dir.path().join("bundle");
        export_bundle(
            &bundle,
            None,
            &sources(&receipts, &approvals),
            &["api_token".to_string()],
        )
        .unwrap();

        let exported =
            fs::read_to_string(bundle.join("exhibits").join("approvals").join("exec-1.json"))
                .unwrap();
        assert!(exported.contains("[redacted]"));
        assert!(!exported.contains("secret-token-value"));

        // The source file is untouched.
        let original = fs::read_to_string(approvals.join("exec-1.json")).unwrap();
        assert!(original.contains("secret-token-value"));

        // Redacted bundle still verifies.
        assert!(verify_bundle(&bundle).unwrap().ok);
    }

    #[test]
    fn cutoff_filters_receipts() {
        let dir = tempdir().unwrap();
        let (receipts, approvals) = seed_sources(dir.path());
        let bundle = dir.path().join("bundle");

        let future = Utc::now() + chrono::Duration::hours(1);
        export_bundle(
            &bundle,
            Some(future),
            &sources(&receipts, &approvals),
            &[],
        )
        .unwrap();

        let exported = fs::read_to_string(bundle.join("receipts.jsonl")).unwrap();
        assert!(exported.trim().is_empty());
        assert!(verify_bundle(&bundle).unwrap().ok);
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            verify_bundle(dir.path()),
            Err(LedgerError::MissingManifest { .. })
        ));
    }
}
