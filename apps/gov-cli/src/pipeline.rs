// pipeline.rs — The shared evaluation pipeline.
//
// Every policy command runs the same sequence: parse the command into a
// plan, evaluate policy, extract features, score, fingerprint. Keeping it
// in one place guarantees `simulate`, `score`, and `baseline` can never
// disagree about what a command would do.

use chrono::{DateTime, Utc};

use gov_confidence::{extract_features, score, ConfidenceScore, ScoreContext, ScoreFeatures};
use gov_plan::{parse_command, Plan, PlanError};
use gov_policy::{AutonomyMode, PolicyDecision, PolicyEngine};
use gov_trust::compute_fingerprint;

use crate::config::CoreSettings;

/// The result of one full pipeline run.
pub struct Evaluation {
    /// Normalized command text.
    pub command: String,
    pub plan: Plan,
    pub decision: PolicyDecision,
    pub features: ScoreFeatures,
    pub score: ConfidenceScore,
    pub fingerprint: String,
}

/// Run the full pipeline for a command. Pure — no receipts, no stores.
pub fn evaluate_command(
    settings: &CoreSettings,
    command: &str,
    mode: AutonomyMode,
    as_of: DateTime<Utc>,
    approval_granted: bool,
    ctx: &ScoreContext,
) -> Result<Evaluation, PlanError> {
    let plan = parse_command(command)?;
    let registry = settings.registry();
    let engine = PolicyEngine::new(settings.policy.clone());

    let decision = engine.evaluate(&plan, mode, as_of, approval_granted, &registry);
    let features = extract_features(&plan, &decision, &registry, engine.config());
    let confidence = score(&features, ctx);
    let fingerprint = compute_fingerprint(
        command,
        &settings.policy.policy_version,
        mode,
        &plan.required_capabilities,
    );

    Ok(Evaluation {
        command: gov_plan::normalize_command(command),
        plan,
        decision,
        features,
        score: confidence,
        fingerprint,
    })
}

/// Parse an `--at` timestamp, defaulting to now.
pub fn parse_at(at: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match at {
        Some(text) => Ok(text
            .parse::<DateTime<Utc>>()
            .map_err(|e| anyhow::anyhow!("invalid --at timestamp '{}': {}", text, e))?),
        None => Ok(Utc::now()),
    }
}
