//! # gov-policy
//!
//! Policy decision engine for the governance core.
//!
//! Given a [`Plan`](gov_plan::Plan), the raw command text, an
//! [`AutonomyMode`], and an as-of timestamp, [`PolicyEngine::evaluate`]
//! returns Allow, Deny, or RequireApproval. Evaluation is pure: no side
//! effects, and identical inputs always yield an identical decision.
//!
//! ## Key invariants
//!
//! - **Fixed priority**: structural budget caps, then autonomy-mode
//!   restrictions, then the unresolved-capability check. Hard denies are
//!   never reordered below approval gating.
//! - **Stable denial codes**: every Deny carries a [`DenialCode`] that
//!   callers and receipts can match on.
//! - **Simulation is the same path**: [`PolicyEngine::simulate`] runs the
//!   identical evaluation and only adds reporting fields.

pub mod engine;
pub mod error;
pub mod mode;
pub mod registry;

pub use engine::{
    Decision, DenialCode, PolicyConfig, PolicyDecision, PolicyEngine, PolicySimulation,
};
pub use error::UnknownMode;
pub use mode::AutonomyMode;
pub use registry::{unresolved_capabilities, CapabilityRegistry, InMemoryRegistry};
