//! # gov-confidence
//!
//! Feature extraction and confidence scoring for the governance core.
//!
//! [`extract_features`] derives a read-only [`ScoreFeatures`] snapshot from
//! a plan and its policy decision; [`score`] turns that snapshot into a
//! 0–100 [`ConfidenceScore`] with a band, a recommended action, and an
//! itemized reason list.
//!
//! ## Key invariants
//!
//! - **Explainable, not a black box**: every point of the score is
//!   accounted for by a reason with a stable code and numeric weight.
//! - **Hard blocks short-circuit**: a policy deny, an unresolved
//!   capability, or an unparseable step target yields exactly score 0,
//!   band LOW, action BLOCK — regardless of every other feature.
//! - **Deterministic**: identical features and context reproduce the
//!   reason list bit-for-bit.

pub mod features;
pub mod scorer;

pub use features::{extract_features, CapabilityResolution, ScoreFeatures};
pub use scorer::{codes, score, Band, ConfidenceScore, RecommendedAction, ScoreContext, ScoreReason};
