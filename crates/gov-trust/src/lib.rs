//! # gov-trust
//!
//! Trust tracking for the governance core: stable operation fingerprints,
//! an append-only score baseline store, regression detection (against the
//! baseline and across confidence sweeps), and the requalification process
//! that re-earns AUTO_RUN eligibility after a suspension.
//!
//! ## Key invariants
//!
//! - **Fingerprint stability**: superficial formatting differences in the
//!   command never change the fingerprint; changing the policy version or
//!   autonomy mode always does.
//! - **Baselines are append-only**: overwriting a fingerprint's baseline
//!   requires an explicit override.
//! - **Sweep monotonicity is a safety invariant**: a decision sequence
//!   that gets *less* permissive as confidence rises suspends the
//!   fingerprint, it is not merely reported.
//! - **Probation resets on any failure**: only consecutive clean
//!   executions count toward reinstatement.

pub mod baseline;
pub mod error;
pub mod fingerprint;
pub mod regression;
pub mod requalification;

pub use baseline::{BaselineRecord, BaselineStore};
pub use error::TrustError;
pub use fingerprint::compute_fingerprint;
pub use regression::{
    check_sweep, compare_confidence, RegressionResult, ScoreSummary, SweepPoint, SweepViolation,
};
pub use requalification::{
    ExecutionOutcome, ExecutionStatus, RequalificationConfig, SuspensionRecord, SuspensionStore,
};
