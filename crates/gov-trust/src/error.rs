// error.rs — Error types for the trust subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from baseline and suspension persistence.
#[derive(Debug, Error)]
pub enum TrustError {
    /// Failed to read or write a store file.
    #[error("trust store I/O failed at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored record failed to serialize or deserialize.
    #[error("trust record (de)serialization failed")]
    Serde(#[from] serde_json::Error),

    /// A baseline already exists for this fingerprint and no override was
    /// requested.
    #[error("baseline already exists for fingerprint {fingerprint}; pass override to replace")]
    BaselineExists { fingerprint: String },
}
