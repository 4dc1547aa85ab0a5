//! # gov-plan
//!
//! Typed plan model for the governance core.
//!
//! A [`Plan`] is an immutable, ordered description of a proposed multi-step
//! automated action. Plans are produced once (usually by [`parse_command`])
//! and then handed to the policy engine, the confidence scorer, and the
//! approval machinery — none of which mutate them.
//!
//! ## Key invariants
//!
//! - **Immutable once produced**: downstream components only read plans.
//! - **Structural errors come first**: a command that cannot be parsed into
//!   a plan is rejected here, before any policy logic runs.
//! - **Stable hashing**: [`Plan::plan_hash`] is deterministic for a given
//!   plan value, so approval records and receipts can reference it.

pub mod command;
pub mod error;
pub mod plan;

pub use command::{normalize_command, parse_command};
pub use error::PlanError;
pub use plan::{DomainSet, Plan, Step};
