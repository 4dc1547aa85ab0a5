// engine.rs — Policy evaluation engine.
//
// Every proposed plan passes through `evaluate()`, which applies the rules
// in fixed priority:
//
// 1. Structural budget caps — too many steps, or any step timeout over the
//    cap → Deny with a stable denial code.
// 2. Autonomy-mode restrictions — writes are denied in read-only mode.
// 3. Unresolved capabilities — any required capability without a registered
//    provider → Deny.
// 4. Approval gating — writes under approval-gated mode, or explicitly
//    approval-scoped steps, → RequireApproval (Allow if approval was
//    already granted for this evaluation).
// 5. Otherwise → Allow.
//
// Evaluation is pure and deterministic: the same plan evaluated twice at
// the same timestamp under the same mode yields the same decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gov_plan::Plan;

use crate::mode::AutonomyMode;
use crate::registry::{unresolved_capabilities, CapabilityRegistry};

/// Policy caps and versioning. Loadable from `gov.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Version string folded into fingerprints — bump when rules change.
    pub policy_version: String,
    /// Maximum number of steps a plan may carry.
    pub max_steps: usize,
    /// Maximum per-step timeout in milliseconds.
    pub step_timeout_cap_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            policy_version: "v3".to_string(),
            max_steps: 20,
            step_timeout_cap_ms: 60_000,
        }
    }
}

/// The outcome category of a policy evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    RequireApproval,
}

impl Decision {
    /// Permissiveness ordering: Deny < RequireApproval < Allow.
    /// Used by the confidence-sweep monotonicity check.
    pub fn permissiveness(&self) -> u8 {
        match self {
            Decision::Deny => 0,
            Decision::RequireApproval => 1,
            Decision::Allow => 2,
        }
    }
}

/// Stable machine-readable codes attached to every Deny.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenialCode {
    /// The plan exceeds the maximum step count.
    StepBudgetExceeded,
    /// A step's timeout exceeds the per-step cap.
    StepTimeoutExceeded,
    /// The autonomy mode forbids write steps.
    WriteNotPermitted,
    /// A required capability has no registered provider.
    UnresolvedCapability,
}

/// The result of one policy evaluation. Produced fresh per call; never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyDecision {
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_code: Option<DenialCode>,
    /// Human-readable reasons, in evaluation order.
    pub reasons: Vec<String>,
    /// The as-of timestamp this decision was computed for.
    pub evaluated_at: DateTime<Utc>,
}

impl PolicyDecision {
    pub fn is_deny(&self) -> bool {
        self.decision == Decision::Deny
    }

    pub fn requires_approval(&self) -> bool {
        self.decision == Decision::RequireApproval
    }
}

/// A "what would happen" preview — the identical evaluation plus reporting
/// fields, with no execution side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySimulation {
    /// The normalized command the simulation was run for.
    pub command: String,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_code: Option<DenialCode>,
    /// Whether the plan would need human approval before running.
    pub approval_required: bool,
    pub step_count: usize,
    pub autonomy_mode: AutonomyMode,
    pub evaluated_at: DateTime<Utc>,
    pub notes: Vec<String>,
}

/// The policy engine. Holds configuration only — all evaluation state is
/// in the arguments, which is what keeps it pure.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Whether `plan` would need human approval under `mode`, ignoring the
    /// hard-deny rules. Approval-scoped steps require approval in every
    /// mode; unscoped writes require it under approval-gated autonomy.
    pub fn approval_required(&self, plan: &Plan, mode: AutonomyMode) -> bool {
        let scoped = plan.steps.iter().any(|s| s.approval_scoped);
        scoped || (mode == AutonomyMode::ApprovalGated && plan.write_step_count() > 0)
    }

    /// Evaluate a plan and return a decision.
    ///
    /// `approval_granted` asserts that human approval for this plan has
    /// already been obtained: gated paths then evaluate to Allow instead of
    /// RequireApproval. Hard denies are unaffected by it.
    pub fn evaluate(
        &self,
        plan: &Plan,
        mode: AutonomyMode,
        as_of: DateTime<Utc>,
        approval_granted: bool,
        registry: &dyn CapabilityRegistry,
    ) -> PolicyDecision {
        let mut reasons = Vec::new();

        // Rule 1: structural budget caps.
        if plan.step_count() > self.config.max_steps {
            reasons.push(format!(
                "plan has {} steps, exceeding the cap of {}",
                plan.step_count(),
                self.config.max_steps
            ));
            return self.deny(DenialCode::StepBudgetExceeded, reasons, as_of);
        }
        for step in &plan.steps {
            if step.timeout_ms > self.config.step_timeout_cap_ms {
                reasons.push(format!(
                    "step '{}' timeout {}ms exceeds the cap of {}ms",
                    step.step_id, step.timeout_ms, self.config.step_timeout_cap_ms
                ));
                return self.deny(DenialCode::StepTimeoutExceeded, reasons, as_of);
            }
        }

        // Rule 2: autonomy-mode restrictions.
        if mode == AutonomyMode::ReadOnly && plan.write_step_count() > 0 {
            reasons.push(format!(
                "{} write step(s) are not permitted in read_only mode",
                plan.write_step_count()
            ));
            return self.deny(DenialCode::WriteNotPermitted, reasons, as_of);
        }

        // Rule 3: unresolved capabilities are a hard deny.
        let missing = unresolved_capabilities(plan, registry);
        if !missing.is_empty() {
            reasons.push(format!(
                "no registered provider for capabilit{}: {}",
                if missing.len() == 1 { "y" } else { "ies" },
                missing.join(", ")
            ));
            return self.deny(DenialCode::UnresolvedCapability, reasons, as_of);
        }

        // Rule 4: approval gating.
        if self.approval_required(plan, mode) {
            if approval_granted {
                reasons.push("approval requirement satisfied by granted approval".to_string());
                return PolicyDecision {
                    decision: Decision::Allow,
                    denial_code: None,
                    reasons,
                    evaluated_at: as_of,
                };
            }
            reasons.push(if mode == AutonomyMode::ApprovalGated {
                "write steps require approval under approval_gated mode".to_string()
            } else {
                "plan contains approval-scoped steps".to_string()
            });
            return PolicyDecision {
                decision: Decision::RequireApproval,
                denial_code: None,
                reasons,
                evaluated_at: as_of,
            };
        }

        reasons.push("all policy checks passed".to_string());
        PolicyDecision {
            decision: Decision::Allow,
            denial_code: None,
            reasons,
            evaluated_at: as_of,
        }
    }

    /// Run the identical evaluation without any execution side effects and
    /// package it as a preview. Used by the operator `simulate` surface and
    /// by confidence-sweep generation.
    pub fn simulate(
        &self,
        plan: &Plan,
        command: &str,
        mode: AutonomyMode,
        as_of: DateTime<Utc>,
        approval_granted: bool,
        registry: &dyn CapabilityRegistry,
    ) -> PolicySimulation {
        let decision = self.evaluate(plan, mode, as_of, approval_granted, registry);
        PolicySimulation {
            command: gov_plan::normalize_command(command),
            decision: decision.decision,
            denial_code: decision.denial_code,
            approval_required: self.approval_required(plan, mode),
            step_count: plan.step_count(),
            autonomy_mode: mode,
            evaluated_at: as_of,
            notes: decision.reasons,
        }
    }

    fn deny(
        &self,
        code: DenialCode,
        reasons: Vec<String>,
        as_of: DateTime<Utc>,
    ) -> PolicyDecision {
        PolicyDecision {
            decision: Decision::Deny,
            denial_code: Some(code),
            reasons,
            evaluated_at: as_of,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use gov_plan::parse_command;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(PolicyConfig::default())
    }

    fn registry() -> InMemoryRegistry {
        InMemoryRegistry::with_default_providers(&["fs", "mail", "web"])
    }

    fn now() -> DateTime<Utc> {
        "2026-01-15T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn read_only_plan_is_allowed_everywhere() {
        let plan = parse_command("read fs://w/a; read fs://w/b").unwrap();
        for mode in [
            AutonomyMode::ReadOnly,
            AutonomyMode::ApprovalGated,
            AutonomyMode::Full,
        ] {
            let decision = engine().evaluate(&plan, mode, now(), false, &registry());
            assert_eq!(decision.decision, Decision::Allow, "mode {:?}", mode);
        }
    }

    #[test]
    fn write_denied_in_read_only_mode() {
        let plan = parse_command("write fs://w/a").unwrap();
        let decision = engine().evaluate(&plan, AutonomyMode::ReadOnly, now(), false, &registry());
        assert_eq!(decision.decision, Decision::Deny);
        assert_eq!(decision.denial_code, Some(DenialCode::WriteNotPermitted));
    }

    #[test]
    fn write_gated_in_approval_gated_mode() {
        let plan = parse_command("write fs://w/a").unwrap();
        let decision =
            engine().evaluate(&plan, AutonomyMode::ApprovalGated, now(), false, &registry());
        assert_eq!(decision.decision, Decision::RequireApproval);
        assert!(decision.denial_code.is_none());
    }

    #[test]
    fn write_allowed_in_full_mode() {
        let plan = parse_command("write fs://w/a").unwrap();
        let decision = engine().evaluate(&plan, AutonomyMode::Full, now(), false, &registry());
        assert_eq!(decision.decision, Decision::Allow);
    }

    #[test]
    fn approval_scoped_step_gates_even_in_full_mode() {
        let plan = parse_command("write! fs://w/a").unwrap();
        let decision = engine().evaluate(&plan, AutonomyMode::Full, now(), false, &registry());
        assert_eq!(decision.decision, Decision::RequireApproval);
    }

    #[test]
    fn granted_approval_converts_gate_to_allow() {
        let plan = parse_command("write fs://w/a").unwrap();
        let decision =
            engine().evaluate(&plan, AutonomyMode::ApprovalGated, now(), true, &registry());
        assert_eq!(decision.decision, Decision::Allow);
        // The gate was still there — simulate reports it.
        let sim = engine().simulate(
            &plan,
            "write fs://w/a",
            AutonomyMode::ApprovalGated,
            now(),
            true,
            &registry(),
        );
        assert!(sim.approval_required);
        assert_eq!(sim.decision, Decision::Allow);
    }

    #[test]
    fn step_budget_denial() {
        let clauses: Vec<String> = (0..25).map(|i| format!("read fs://w/f{}", i)).collect();
        let plan = parse_command(&clauses.join("; ")).unwrap();
        let decision = engine().evaluate(&plan, AutonomyMode::Full, now(), false, &registry());
        assert_eq!(decision.denial_code, Some(DenialCode::StepBudgetExceeded));
    }

    #[test]
    fn timeout_cap_denial() {
        let plan = parse_command("read fs://w/a 120000").unwrap();
        let decision = engine().evaluate(&plan, AutonomyMode::Full, now(), false, &registry());
        assert_eq!(decision.denial_code, Some(DenialCode::StepTimeoutExceeded));
    }

    #[test]
    fn unresolved_capability_is_hard_deny() {
        let plan = parse_command("send mail://outbox/report").unwrap();
        let registry = InMemoryRegistry::with_default_providers(&["fs"]);
        let decision = engine().evaluate(&plan, AutonomyMode::Full, now(), false, &registry);
        assert_eq!(decision.decision, Decision::Deny);
        assert_eq!(decision.denial_code, Some(DenialCode::UnresolvedCapability));
        assert!(decision.reasons.iter().any(|r| r.contains("mail")));
    }

    #[test]
    fn unresolved_capability_outranks_approval_gating() {
        // A gated write with a missing provider must deny, not ask for approval.
        let plan = parse_command("send mail://outbox/report").unwrap();
        let registry = InMemoryRegistry::with_default_providers(&["fs"]);
        let decision =
            engine().evaluate(&plan, AutonomyMode::ApprovalGated, now(), false, &registry);
        assert_eq!(decision.decision, Decision::Deny);
    }

    #[test]
    fn structural_caps_outrank_everything() {
        // Oversized plan with a missing capability: the budget code wins.
        let clauses: Vec<String> = (0..25).map(|i| format!("send mail://o/m{}", i)).collect();
        let plan = parse_command(&clauses.join("; ")).unwrap();
        let registry = InMemoryRegistry::new();
        let decision = engine().evaluate(&plan, AutonomyMode::Full, now(), false, &registry);
        assert_eq!(decision.denial_code, Some(DenialCode::StepBudgetExceeded));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let plan = parse_command("write fs://w/a; read fs://w/b").unwrap();
        let ts = now();
        let a = engine().evaluate(&plan, AutonomyMode::ApprovalGated, ts, false, &registry());
        let b = engine().evaluate(&plan, AutonomyMode::ApprovalGated, ts, false, &registry());
        assert_eq!(a, b);
        let ja = serde_json::to_string(&a).unwrap();
        let jb = serde_json::to_string(&b).unwrap();
        assert_eq!(ja, jb);
    }

    #[test]
    fn permissiveness_ordering() {
        assert!(Decision::Deny.permissiveness() < Decision::RequireApproval.permissiveness());
        assert!(Decision::RequireApproval.permissiveness() < Decision::Allow.permissiveness());
    }

    #[test]
    fn simulation_reports_step_count_and_notes() {
        let plan = parse_command("read fs://w/a; write fs://w/b").unwrap();
        let sim = engine().simulate(
            &plan,
            "Read fs://w/a;  write fs://w/b",
            AutonomyMode::ApprovalGated,
            now(),
            false,
            &registry(),
        );
        assert_eq!(sim.step_count, 2);
        assert_eq!(sim.command, "read fs://w/a; write fs://w/b");
        assert!(sim.approval_required);
        assert!(!sim.notes.is_empty());
    }
}
