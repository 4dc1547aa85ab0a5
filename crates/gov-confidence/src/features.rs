// features.rs — Derived score features.
//
// Feature extraction is a pure function over (plan, policy decision,
// capability resolution, policy caps). The snapshot is read-only: the
// scorer consumes it and nothing mutates it.

use serde::{Deserialize, Serialize};

use gov_plan::{DomainSet, Plan};
use gov_policy::{CapabilityRegistry, PolicyConfig, PolicyDecision};

/// One required capability and whether a provider resolved for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityResolution {
    pub capability: String,
    pub resolved: bool,
}

/// A read-only snapshot of everything the scorer looks at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreFeatures {
    pub step_count: usize,
    pub write_step_count: usize,
    /// Touched domains, or Invalid if any step target failed to parse.
    pub domains: DomainSet,
    /// Required capabilities with their resolution status, in plan order.
    pub capabilities: Vec<CapabilityResolution>,
    /// Whether every step timeout is within the policy cap.
    pub timeouts_within_cap: bool,
    /// Whether agent versions are pinned.
    pub versions_pinned: bool,
    /// Whether policy classified the plan as requiring approval.
    pub requires_approval: bool,
    /// Whether policy denied the plan outright.
    pub policy_denied: bool,
}

impl ScoreFeatures {
    /// Whether every required capability resolved (vacuously true when the
    /// plan requires none — the scorer only awards the bonus when some exist).
    pub fn all_capabilities_resolved(&self) -> bool {
        self.capabilities.iter().all(|c| c.resolved)
    }

    pub fn any_capability_unresolved(&self) -> bool {
        self.capabilities.iter().any(|c| !c.resolved)
    }
}

/// Derive the feature snapshot for a plan under a given policy decision.
pub fn extract_features(
    plan: &Plan,
    decision: &PolicyDecision,
    registry: &dyn CapabilityRegistry,
    config: &PolicyConfig,
) -> ScoreFeatures {
    let capabilities = plan
        .required_capabilities
        .iter()
        .map(|cap| CapabilityResolution {
            capability: cap.clone(),
            resolved: registry.resolve(cap).is_some(),
        })
        .collect();

    ScoreFeatures {
        step_count: plan.step_count(),
        write_step_count: plan.write_step_count(),
        domains: plan.domains(),
        capabilities,
        timeouts_within_cap: plan
            .steps
            .iter()
            .all(|s| s.timeout_ms <= config.step_timeout_cap_ms),
        versions_pinned: plan.versions_pinned(),
        requires_approval: decision.requires_approval(),
        policy_denied: decision.is_deny(),
    }
}
