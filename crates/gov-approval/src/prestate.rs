// prestate.rs — Pre-execution resource snapshots.
//
// Before an awaiting-approval record is persisted, a prestate fingerprint
// is captured per affected step: a snapshot identity of the resource about
// to be written. At approval time the same source recaptures and compares —
// a mismatch means the resource changed between proposal and approval, and
// the approval is refused as stale.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ApprovalError;

/// Snapshot identity of one resource at capture time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrestateSnapshot {
    /// Content fingerprint (SHA-256 hex).
    pub fingerprint: String,
    /// What was fingerprinted — the step target URI.
    pub artifact_ref: String,
}

/// Captures prestate snapshots for step targets.
pub trait PrestateSource: Send + Sync {
    /// Capture the current snapshot of a target resource.
    ///
    /// Must be deterministic for an unchanged resource: capturing twice
    /// without an intervening write yields the same fingerprint.
    fn capture(&self, target: &str) -> Result<PrestateSnapshot, ApprovalError>;
}

/// Prestate source for `fs://` targets, hashing file contents under a root
/// directory. Non-file targets fall back to a deterministic identity hash
/// of the target string itself.
pub struct FilePrestateSource {
    root: PathBuf,
}

impl FilePrestateSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Map an `fs://<authority>/<path>` target to a path under the root.
    fn resolve(&self, target: &str) -> Option<PathBuf> {
        let rest = target.strip_prefix("fs://")?;
        let (_authority, path) = rest.split_once('/')?;
        if path.is_empty() {
            return None;
        }
        Some(self.root.join(path))
    }
}

impl PrestateSource for FilePrestateSource {
    fn capture(&self, target: &str) -> Result<PrestateSnapshot, ApprovalError> {
        let mut hasher = Sha256::new();
        match self.resolve(target) {
            Some(path) if path.exists() => {
                let data = std::fs::read(&path).map_err(|source| ApprovalError::Io {
                    path: path.clone(),
                    source,
                })?;
                hasher.update(&data);
            }
            Some(_) => {
                // The resource does not exist yet — its prestate is the
                // stable "absent" marker so creation-then-approval works.
                hasher.update(b"absent:");
                hasher.update(target.as_bytes());
            }
            None => {
                // Not a file target — identity of the reference itself.
                hasher.update(b"ref:");
                hasher.update(target.as_bytes());
            }
        }
        Ok(PrestateSnapshot {
            fingerprint: format!("{:x}", hasher.finalize()),
            artifact_ref: target.to_string(),
        })
    }
}
