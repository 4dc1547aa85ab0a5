// error.rs — Error types for plan construction.

use thiserror::Error;

/// Structural errors raised while turning a raw command into a [`crate::Plan`].
///
/// These are rejected before any policy logic runs — a malformed command
/// never reaches the decision engine.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The command text was empty after normalization.
    #[error("empty command")]
    EmptyCommand,

    /// A clause used a verb outside the known read/write verb table.
    #[error("unknown verb '{verb}' in clause '{clause}'")]
    UnknownVerb { verb: String, clause: String },

    /// A clause named a verb but no target resource.
    #[error("missing target in clause '{clause}'")]
    MissingTarget { clause: String },

    /// A clause carried a trailing timeout token that is not an integer.
    #[error("invalid timeout '{token}' in clause '{clause}'")]
    InvalidTimeout { token: String, clause: String },

    /// A clause had extra tokens beyond verb, target, and timeout.
    #[error("unexpected token '{token}' in clause '{clause}'")]
    UnexpectedToken { token: String, clause: String },
}
