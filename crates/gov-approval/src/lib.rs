//! # gov-approval
//!
//! Approval workflow for plans that policy gates behind a human.
//!
//! When the policy engine returns RequireApproval, an [`ApprovalState`]
//! record is created with status `awaiting_approval` and a prestate
//! fingerprint per affected step — a snapshot identity of the resource
//! about to be written, so a later approval can be checked for staleness.
//!
//! ## Key invariants
//!
//! - **Valid transitions only**: `awaiting_approval → {approved, rejected}`.
//!   Rejecting or approving an already-resolved record is an
//!   [`ApprovalError::Conflict`], not a silent no-op.
//! - **Rollback is a marker, not a state**: a rolled-back execution keeps
//!   its `approved` status and gains a terminal `rolled_back_at` stamp.
//! - **Single writer per execution id**: concurrent transitions on the
//!   same id are serialized; exactly one of two racing rejects succeeds.
//! - **Records are never deleted**: superseded records stay on disk as
//!   terminal history.

pub mod error;
pub mod prestate;
pub mod state;
pub mod store;

pub use error::ApprovalError;
pub use prestate::{FilePrestateSource, PrestateSnapshot, PrestateSource};
pub use state::{ApprovalState, ApprovalStatus};
pub use store::ApprovalStore;
