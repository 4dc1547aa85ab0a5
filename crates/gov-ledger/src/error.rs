// error.rs — Error types for the ledger subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from receipt logging, signing, and export.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Failed to open or create a ledger or bundle file.
    #[error("failed to open {path}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write to the ledger or a bundle file.
    #[error("ledger write failed")]
    WriteFailed(#[from] std::io::Error),

    /// A receipt failed to serialize or deserialize.
    #[error("receipt (de)serialization failed")]
    Serde(#[from] serde_json::Error),

    /// The hash chain is broken at a specific line.
    #[error("receipt chain integrity violation at line {line}: expected previous_hash {expected}, found {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },

    /// A signing or verification key was rejected or a signature failed.
    #[error("signature operation failed: {0}")]
    Signature(String),

    /// An export bundle is missing its manifest.
    #[error("no manifest found in bundle at {path}")]
    MissingManifest { path: PathBuf },
}
