// outcome.rs — Composing policy and governor decisions.
//
// The documented order is governor-after-policy: a policy Deny is final and
// the governor is never consulted for it. When policy allows or requires
// approval, a governor Deny/Delay downgrades the overall outcome to
// Throttle with retry guidance.

use serde::{Deserialize, Serialize};

use gov_policy::{Decision, PolicyDecision};

use crate::governor::{GovernorDecision, RunGovernor, ThrottleReason, Verdict};

/// The combined outcome of policy evaluation plus governor gating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OverallOutcome {
    /// Policy allowed and the governor let it through.
    Allow,
    /// Policy wants human approval; the governor let the request through.
    RequireApproval,
    /// Policy did not deny, but the governor asks the caller to back off.
    Throttle {
        reason: ThrottleReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_after_secs: Option<u64>,
    },
    /// Policy denied. Final.
    Deny,
}

impl OverallOutcome {
    /// Permissiveness ordering used by the confidence-sweep check:
    /// Deny < Throttle = RequireApproval < Allow.
    pub fn permissiveness(&self) -> u8 {
        match self {
            OverallOutcome::Deny => 0,
            OverallOutcome::Throttle { .. } | OverallOutcome::RequireApproval => 1,
            OverallOutcome::Allow => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OverallOutcome::Allow => "allow",
            OverallOutcome::RequireApproval => "require_approval",
            OverallOutcome::Throttle { .. } => "throttle",
            OverallOutcome::Deny => "deny",
        }
    }
}

impl std::fmt::Display for OverallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Pure composition of the two decisions.
pub fn compose(policy: &PolicyDecision, governor: &GovernorDecision) -> OverallOutcome {
    if policy.is_deny() {
        return OverallOutcome::Deny;
    }
    match governor.decision {
        Verdict::Deny | Verdict::Delay => OverallOutcome::Throttle {
            // A non-allow governor decision always carries its reason; fall
            // back to the concurrency cap if a caller built one by hand.
            reason: governor.reason.unwrap_or(ThrottleReason::MaxConcurrent),
            retry_after_secs: governor.retry_after_secs,
        },
        Verdict::Allow => match policy.decision {
            Decision::RequireApproval => OverallOutcome::RequireApproval,
            _ => OverallOutcome::Allow,
        },
    }
}

impl RunGovernor {
    /// Gate a policy decision through the governor.
    ///
    /// Consults the governor only when policy did not deny, preserving the
    /// documented governor-after-policy order.
    pub fn gate(&self, policy: &PolicyDecision, fingerprint: &str) -> OverallOutcome {
        if policy.is_deny() {
            return OverallOutcome::Deny;
        }
        compose(policy, &self.check(fingerprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::GovernorConfig;
    use chrono::Utc;
    use gov_policy::{Decision, PolicyDecision};

    fn policy(decision: Decision) -> PolicyDecision {
        PolicyDecision {
            decision,
            denial_code: None,
            reasons: vec![],
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn policy_deny_is_final() {
        let outcome = compose(&policy(Decision::Deny), &GovernorDecision::allow());
        assert_eq!(outcome, OverallOutcome::Deny);
    }

    #[test]
    fn governor_downgrades_allow_to_throttle() {
        let governor_decision = GovernorDecision {
            decision: Verdict::Deny,
            reason: Some(ThrottleReason::TokenExhausted),
            retry_after_secs: Some(3),
        };
        match compose(&policy(Decision::Allow), &governor_decision) {
            OverallOutcome::Throttle {
                reason,
                retry_after_secs,
            } => {
                assert_eq!(reason, ThrottleReason::TokenExhausted);
                assert_eq!(retry_after_secs, Some(3));
            }
            other => panic!("expected Throttle, got {:?}", other),
        }
    }

    #[test]
    fn approval_passes_through_when_governor_allows() {
        let outcome = compose(&policy(Decision::RequireApproval), &GovernorDecision::allow());
        assert_eq!(outcome, OverallOutcome::RequireApproval);
    }

    #[test]
    fn gate_skips_governor_on_policy_deny() {
        // Bucket of zero would throttle anything — but a policy Deny never
        // reaches it.
        let governor = RunGovernor::new(GovernorConfig {
            bucket_burst: 0,
            bucket_refill_per_sec: 0.0,
            ..GovernorConfig::default()
        });
        assert_eq!(
            governor.gate(&policy(Decision::Deny), "fp-1"),
            OverallOutcome::Deny
        );
        // And an Allow does reach it.
        assert!(matches!(
            governor.gate(&policy(Decision::Allow), "fp-1"),
            OverallOutcome::Throttle { .. }
        ));
    }

    #[test]
    fn permissiveness_ranks_throttle_with_approval() {
        let throttle = OverallOutcome::Throttle {
            reason: ThrottleReason::MaxConcurrent,
            retry_after_secs: None,
        };
        assert_eq!(
            throttle.permissiveness(),
            OverallOutcome::RequireApproval.permissiveness()
        );
        assert!(OverallOutcome::Deny.permissiveness() < throttle.permissiveness());
        assert!(throttle.permissiveness() < OverallOutcome::Allow.permissiveness());
    }
}
