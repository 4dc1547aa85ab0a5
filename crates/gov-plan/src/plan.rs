// plan.rs — Step and Plan data model.
//
// A Plan ties together everything the governance core needs to judge a
// proposed action:
// - An ordered list of Steps (what will be done, to what, with what timeout)
// - The capabilities the plan requires (resolved against an external registry)
// - Pinned agent versions and free-text assumptions
//
// Plans are immutable once produced. The policy engine, scorer, and approval
// store all take `&Plan` and never write back.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One step of a proposed action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    /// Stable identifier within the plan (e.g., "step-1").
    pub step_id: String,

    /// The action verb (e.g., "read", "send").
    pub action: String,

    /// Which adapter/provider executes this step (e.g., "fs", "mail").
    pub adapter: String,

    /// The target resource URI (e.g., "fs://workspace/src/main.rs").
    pub target: String,

    /// Whether this step only reads — write steps are the ones policy gates.
    pub read_only: bool,

    /// Whether this step was explicitly scoped for human approval.
    pub approval_scoped: bool,

    /// Per-step timeout in milliseconds. Checked against the policy cap.
    pub timeout_ms: u64,

    /// Optional idempotency key so a retried step is not applied twice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// The set of resource domains a plan touches.
///
/// A domain is the `scheme://authority` prefix of a step target. If any
/// step's target cannot be parsed, the whole set is `Invalid` — the scorer
/// treats that as a hard block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DomainSet {
    /// Every step target parsed; the distinct domains touched.
    Parsed(BTreeSet<String>),
    /// At least one step target could not be parsed.
    Invalid,
}

impl DomainSet {
    pub fn is_invalid(&self) -> bool {
        matches!(self, DomainSet::Invalid)
    }
}

/// An immutable description of a proposed multi-step action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier for this plan instance.
    pub plan_id: Uuid,

    /// The ordered steps to perform.
    pub steps: Vec<Step>,

    /// Capabilities the plan requires (e.g., "fs", "mail"). Each must have
    /// a registered provider or policy hard-denies the plan.
    pub required_capabilities: Vec<String>,

    /// Pinned agent versions, keyed by agent name. Empty means unpinned.
    pub agent_versions: BTreeMap<String, String>,

    /// Free-text assumptions the planner made.
    pub assumptions: Vec<String>,

    /// When this plan was produced.
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Create a plan from parts with a fresh id and the current timestamp.
    pub fn new(steps: Vec<Step>, required_capabilities: Vec<String>) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            steps,
            required_capabilities,
            agent_versions: BTreeMap::new(),
            assumptions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Set pinned agent versions and return self (builder pattern).
    pub fn with_agent_versions(mut self, versions: BTreeMap<String, String>) -> Self {
        self.agent_versions = versions;
        self
    }

    /// Add a free-text assumption and return self.
    pub fn with_assumption(mut self, assumption: impl Into<String>) -> Self {
        self.assumptions.push(assumption.into());
        self
    }

    /// Number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Number of write (non-read-only) steps.
    pub fn write_step_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.read_only).count()
    }

    /// The write steps themselves, in plan order.
    pub fn write_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| !s.read_only)
    }

    /// Whether every step is read-only.
    pub fn is_read_only(&self) -> bool {
        self.steps.iter().all(|s| s.read_only)
    }

    /// Whether agent versions are pinned (at least one, none empty).
    pub fn versions_pinned(&self) -> bool {
        !self.agent_versions.is_empty() && self.agent_versions.values().all(|v| !v.is_empty())
    }

    /// Distinct domains touched by the plan, or `Invalid` if any step's
    /// target cannot be parsed.
    pub fn domains(&self) -> DomainSet {
        let mut set = BTreeSet::new();
        for step in &self.steps {
            match parse_domain(&step.target) {
                Some(domain) => {
                    set.insert(domain);
                }
                None => return DomainSet::Invalid,
            }
        }
        DomainSet::Parsed(set)
    }

    /// SHA-256 over the canonical JSON encoding of this plan.
    ///
    /// Field order is fixed by the struct definition and `agent_versions`
    /// is a BTreeMap, so the encoding (and therefore the hash) is stable
    /// for a given plan value.
    pub fn plan_hash(&self) -> String {
        // Serialization of this type cannot fail: no maps with non-string
        // keys, no non-finite floats.
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Extract the `scheme://authority` domain from a step target.
///
/// Returns None when the target has no scheme separator, an empty scheme,
/// or an empty authority — those targets are unparseable.
pub fn parse_domain(target: &str) -> Option<String> {
    let (scheme, rest) = target.split_once("://")?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let authority = rest.split('/').next().unwrap_or("");
    if authority.is_empty() {
        return None;
    }
    Some(format!("{}://{}", scheme, authority))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, target: &str, read_only: bool) -> Step {
        Step {
            step_id: id.to_string(),
            action: if read_only { "read" } else { "write" }.to_string(),
            adapter: "fs".to_string(),
            target: target.to_string(),
            read_only,
            approval_scoped: false,
            timeout_ms: 30_000,
            idempotency_key: None,
        }
    }

    #[test]
    fn domain_parsing_happy_path() {
        assert_eq!(
            parse_domain("fs://workspace/src/main.rs"),
            Some("fs://workspace".to_string())
        );
        assert_eq!(
            parse_domain("web://example.com/path?q=1"),
            Some("web://example.com".to_string())
        );
    }

    #[test]
    fn domain_parsing_rejects_malformed_targets() {
        assert_eq!(parse_domain("no-scheme-here"), None);
        assert_eq!(parse_domain("://workspace/x"), None);
        assert_eq!(parse_domain("fs://"), None);
        assert_eq!(parse_domain("f s://workspace/x"), None);
    }

    #[test]
    fn domains_collects_distinct_prefixes() {
        let plan = Plan::new(
            vec![
                step("step-1", "fs://workspace/a.rs", true),
                step("step-2", "fs://workspace/b.rs", true),
                step("step-3", "web://example.com/page", true),
            ],
            vec!["fs".to_string(), "web".to_string()],
        );
        match plan.domains() {
            DomainSet::Parsed(set) => {
                assert_eq!(set.len(), 2);
                assert!(set.contains("fs://workspace"));
                assert!(set.contains("web://example.com"));
            }
            DomainSet::Invalid => panic!("expected parsed domains"),
        }
    }

    #[test]
    fn single_bad_target_poisons_domain_set() {
        let plan = Plan::new(
            vec![
                step("step-1", "fs://workspace/a.rs", true),
                step("step-2", "not a target", true),
            ],
            vec!["fs".to_string()],
        );
        assert!(plan.domains().is_invalid());
    }

    #[test]
    fn write_step_accounting() {
        let plan = Plan::new(
            vec![
                step("step-1", "fs://workspace/a.rs", true),
                step("step-2", "fs://workspace/b.rs", false),
            ],
            vec!["fs".to_string()],
        );
        assert_eq!(plan.step_count(), 2);
        assert_eq!(plan.write_step_count(), 1);
        assert!(!plan.is_read_only());
    }

    #[test]
    fn plan_hash_is_stable_and_sensitive() {
        let plan = Plan::new(
            vec![step("step-1", "fs://workspace/a.rs", true)],
            vec!["fs".to_string()],
        );
        assert_eq!(plan.plan_hash(), plan.plan_hash());

        let mut other = plan.clone();
        other.steps[0].target = "fs://workspace/b.rs".to_string();
        assert_ne!(plan.plan_hash(), other.plan_hash());
    }

    #[test]
    fn versions_pinned_requires_nonempty_values() {
        let mut plan = Plan::new(
            vec![step("step-1", "fs://workspace/a.rs", true)],
            vec!["fs".to_string()],
        );
        assert!(!plan.versions_pinned());

        plan.agent_versions
            .insert("planner".to_string(), "1.4.2".to_string());
        assert!(plan.versions_pinned());

        plan.agent_versions
            .insert("executor".to_string(), String::new());
        assert!(!plan.versions_pinned());
    }

    #[test]
    fn plan_serialization_round_trip() {
        let plan = Plan::new(
            vec![step("step-1", "fs://workspace/a.rs", false)],
            vec!["fs".to_string()],
        )
        .with_assumption("workspace is checked out");

        let json = serde_json::to_string(&plan).unwrap();
        let restored: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.plan_id, plan.plan_id);
        assert_eq!(restored.steps, plan.steps);
        assert_eq!(restored.assumptions, plan.assumptions);
    }
}
