// error.rs — Error types for the policy subsystem.

use thiserror::Error;

/// Raised when an autonomy mode string matches no known alias.
#[derive(Debug, Error)]
#[error("unknown autonomy mode '{0}'")]
pub struct UnknownMode(pub String);
