// error.rs — Error types for the approval subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from approval state transitions and persistence.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No approval record exists for this execution id.
    #[error("no approval record for execution '{execution_id}'")]
    NotFound { execution_id: String },

    /// A record already exists for this execution id.
    #[error("approval record for execution '{execution_id}' already exists")]
    AlreadyExists { execution_id: String },

    /// The requested transition is invalid from the record's current status.
    #[error("execution '{execution_id}' is already {status}; transition refused")]
    Conflict {
        execution_id: String,
        status: String,
    },

    /// A resource changed between proposal and approval.
    #[error("prestate for step '{step_id}' is stale; the resource changed since proposal")]
    StalePrestate { step_id: String },

    /// Rejection was attempted without a reason.
    #[error("rejection requires a reason")]
    ReasonRequired,

    /// Failed to read or write a record file.
    #[error("approval store I/O failed at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored record failed to serialize or deserialize.
    #[error("approval record (de)serialization failed")]
    Serde(#[from] serde_json::Error),
}
