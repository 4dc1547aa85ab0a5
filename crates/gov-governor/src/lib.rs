//! # gov-governor
//!
//! Operational run governor for the governance core.
//!
//! Independent of policy content, the [`RunGovernor`] answers "can this
//! fingerprint run *right now*" from operational load: a token bucket per
//! fingerprint, a circuit breaker over recent failures, and a global
//! concurrency cap.
//!
//! ## Key invariants
//!
//! - **Governor runs after policy**: a policy Deny is final and the
//!   governor is never consulted for it ([`RunGovernor::gate`]).
//! - **Throttling is advisory, not an error**: DELAY carries a
//!   `retry_after` hint the caller should honor; nothing blocks.
//! - **Disabled means always-allow**: with `enabled = false` the governor
//!   reduces to a pass-through.

pub mod governor;
pub mod outcome;

pub use governor::{ExecutionPermit, GovernorConfig, GovernorDecision, RunGovernor, ThrottleReason, Verdict};
pub use outcome::{compose, OverallOutcome};
