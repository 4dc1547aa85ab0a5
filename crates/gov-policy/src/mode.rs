// mode.rs — Autonomy modes.
//
// The autonomy mode is the operator's standing instruction for how much the
// system may do on its own. It is a small closed enum: fingerprinting and
// policy evaluation both depend on the normalized form, so free-form mode
// strings are mapped through the alias table exactly once, at the edge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownMode;

/// How much autonomy the system currently has.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyMode {
    /// Writes are denied outright; only read-only plans can run.
    ReadOnly,
    /// Writes are gated behind human approval.
    ApprovalGated,
    /// Writes are allowed without approval (subject to the governor).
    Full,
}

impl AutonomyMode {
    /// Normalized string form — the one fingerprints are computed from.
    pub fn as_str(&self) -> &'static str {
        match self {
            AutonomyMode::ReadOnly => "read_only",
            AutonomyMode::ApprovalGated => "approval_gated",
            AutonomyMode::Full => "full",
        }
    }

    /// Whether this mode is restrictive (anything short of full autonomy).
    pub fn is_restrictive(&self) -> bool {
        !matches!(self, AutonomyMode::Full)
    }
}

impl fmt::Display for AutonomyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutonomyMode {
    type Err = UnknownMode;

    /// Parse a mode string, tolerating the aliases operators actually type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "read_only" | "readonly" | "ro" | "observe" => Ok(AutonomyMode::ReadOnly),
            "approval_gated" | "gated" | "approval" | "supervised" => {
                Ok(AutonomyMode::ApprovalGated)
            }
            "full" | "auto" | "autonomous" => Ok(AutonomyMode::Full),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}
