// scorer.rs — Additive, explainable confidence model.
//
// The model starts at a baseline of 50 and accumulates signed weights, each
// recorded as a reason. Hard blocks short-circuit to 0/LOW/BLOCK with a
// single -999 reason. The reason list is the audit explanation: identical
// inputs must reproduce it bit-for-bit.

use serde::{Deserialize, Serialize};

use crate::features::ScoreFeatures;

/// Baseline every score starts from.
const BASELINE: i32 = 50;
/// Sentinel weight on hard-block reasons.
const HARD_BLOCK_WEIGHT: i32 = -999;

/// Stable reason codes. Receipts and tests match on these.
pub mod codes {
    pub const POLICY_DENIED: &str = "policy_denied";
    pub const UNRESOLVED_CAPABILITY: &str = "unresolved_capability";
    pub const INVALID_STEP_TARGET: &str = "invalid_step_target";
    pub const READ_ONLY_PLAN: &str = "read_only_plan";
    pub const WRITE_STEPS_PRESENT: &str = "write_steps_present";
    pub const APPROVAL_GATED_WRITE: &str = "approval_gated_write";
    pub const PRESTATE_REQUIRED: &str = "prestate_required";
    pub const DOMAINS_PARSEABLE: &str = "domains_parseable";
    pub const STEP_COUNT_SMALL: &str = "step_count_small";
    pub const TIMEOUTS_WITHIN_CAP: &str = "timeouts_within_cap";
    pub const AGENT_VERSIONS_PINNED: &str = "agent_versions_pinned";
    pub const CAPABILITIES_RESOLVED: &str = "capabilities_resolved";
    pub const PLANNER_RETRY: &str = "planner_retry";
    pub const LENIENT_PARSE: &str = "lenient_parse";
}

/// Coarse confidence tier derived from the numeric score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Low,
    Medium,
    High,
}

impl Band {
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            Band::High
        } else if score >= 55 {
            Band::Medium
        } else {
            Band::Low
        }
    }

    /// Ordering rank — higher is more trusted.
    pub fn rank(&self) -> u8 {
        match self {
            Band::Low => 0,
            Band::Medium => 1,
            Band::High => 2,
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Band::Low => write!(f, "low"),
            Band::Medium => write!(f, "medium"),
            Band::High => write!(f, "high"),
        }
    }
}

/// What the scorer recommends doing with the plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    AutoRun,
    ProposeForApproval,
    HumanReviewRequired,
    Block,
}

impl RecommendedAction {
    /// Ordering rank — higher is more permissive. Used by the regression
    /// detector to spot action downgrades.
    pub fn rank(&self) -> u8 {
        match self {
            RecommendedAction::Block => 0,
            RecommendedAction::HumanReviewRequired => 1,
            RecommendedAction::ProposeForApproval => 2,
            RecommendedAction::AutoRun => 3,
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendedAction::AutoRun => write!(f, "auto_run"),
            RecommendedAction::ProposeForApproval => write!(f, "propose_for_approval"),
            RecommendedAction::HumanReviewRequired => write!(f, "human_review_required"),
            RecommendedAction::Block => write!(f, "block"),
        }
    }
}

/// One accounted-for contribution to the score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreReason {
    pub code: String,
    pub weight: i32,
    pub detail: String,
}

impl ScoreReason {
    fn new(code: &str, weight: i32, detail: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            weight,
            detail: detail.into(),
        }
    }
}

/// Observability flags from the planning environment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreContext {
    /// The planner needed a retry to produce this plan.
    pub planner_retry_observed: bool,
    /// Lenient/tolerant parsing was used while producing the plan.
    pub lenient_parse_observed: bool,
}

/// The scored result: number, band, recommended action, and the itemized
/// reasons that produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfidenceScore {
    pub score: u32,
    pub band: Band,
    pub action: RecommendedAction,
    pub reasons: Vec<ScoreReason>,
}

/// Score a feature snapshot.
pub fn score(features: &ScoreFeatures, ctx: &ScoreContext) -> ConfidenceScore {
    // Hard blocks short-circuit, each with a single sentinel reason.
    if features.policy_denied {
        return hard_block(ScoreReason::new(
            codes::POLICY_DENIED,
            HARD_BLOCK_WEIGHT,
            "policy denied the plan",
        ));
    }
    if features.any_capability_unresolved() {
        let missing: Vec<&str> = features
            .capabilities
            .iter()
            .filter(|c| !c.resolved)
            .map(|c| c.capability.as_str())
            .collect();
        return hard_block(ScoreReason::new(
            codes::UNRESOLVED_CAPABILITY,
            HARD_BLOCK_WEIGHT,
            format!("no provider for: {}", missing.join(", ")),
        ));
    }
    if features.domains.is_invalid() {
        return hard_block(ScoreReason::new(
            codes::INVALID_STEP_TARGET,
            HARD_BLOCK_WEIGHT,
            "a step target could not be parsed into a domain",
        ));
    }

    let mut total = BASELINE;
    let mut reasons = Vec::new();
    let mut add = |code: &str, weight: i32, detail: String, total: &mut i32| {
        *total += weight;
        reasons.push(ScoreReason::new(code, weight, detail));
    };

    if features.write_step_count == 0 {
        add(
            codes::READ_ONLY_PLAN,
            25,
            "every step is read-only".to_string(),
            &mut total,
        );
    } else {
        add(
            codes::WRITE_STEPS_PRESENT,
            -20,
            format!("{} write step(s) present", features.write_step_count),
            &mut total,
        );
        if features.requires_approval {
            // This pair nets to zero. Both reasons are kept for
            // transparency: the gate earns trust back, the mandatory
            // prestate snapshot spends it.
            add(
                codes::APPROVAL_GATED_WRITE,
                10,
                "write steps are approval-gated".to_string(),
                &mut total,
            );
            add(
                codes::PRESTATE_REQUIRED,
                -10,
                "prestate snapshots required before write".to_string(),
                &mut total,
            );
        }
    }

    add(
        codes::DOMAINS_PARSEABLE,
        10,
        "all step targets parsed into domains".to_string(),
        &mut total,
    );

    if features.step_count <= 5 {
        add(
            codes::STEP_COUNT_SMALL,
            5,
            format!("{} step(s), within the small-plan bound", features.step_count),
            &mut total,
        );
    }
    if features.timeouts_within_cap {
        add(
            codes::TIMEOUTS_WITHIN_CAP,
            5,
            "every step timeout is within the policy cap".to_string(),
            &mut total,
        );
    }
    if features.versions_pinned {
        add(
            codes::AGENT_VERSIONS_PINNED,
            5,
            "agent versions are pinned".to_string(),
            &mut total,
        );
    }
    if !features.capabilities.is_empty() && features.all_capabilities_resolved() {
        add(
            codes::CAPABILITIES_RESOLVED,
            5,
            format!(
                "all {} required capabilit{} resolved",
                features.capabilities.len(),
                if features.capabilities.len() == 1 { "y" } else { "ies" }
            ),
            &mut total,
        );
    }
    if ctx.planner_retry_observed {
        add(
            codes::PLANNER_RETRY,
            -8,
            "planner needed a retry".to_string(),
            &mut total,
        );
    }
    if ctx.lenient_parse_observed {
        add(
            codes::LENIENT_PARSE,
            -6,
            "lenient parsing was used".to_string(),
            &mut total,
        );
    }

    let score = total.clamp(0, 100) as u32;
    let band = Band::from_score(score);
    let action = recommend(features, band);

    ConfidenceScore {
        score,
        band,
        action,
        reasons,
    }
}

fn hard_block(reason: ScoreReason) -> ConfidenceScore {
    ConfidenceScore {
        score: 0,
        band: Band::Low,
        action: RecommendedAction::Block,
        reasons: vec![reason],
    }
}

fn recommend(features: &ScoreFeatures, band: Band) -> RecommendedAction {
    // Policy's own approval requirement always wins, regardless of score.
    if features.requires_approval {
        return RecommendedAction::ProposeForApproval;
    }
    if band == Band::High && features.write_step_count == 0 {
        return RecommendedAction::AutoRun;
    }
    if features.write_step_count > 0 && band != Band::Low {
        return RecommendedAction::ProposeForApproval;
    }
    RecommendedAction::HumanReviewRequired
}
