// policy.rs — Policy subcommands: simulate, score, baseline, simulate-variants.

use chrono::Utc;
use clap::Subcommand;

use gov_confidence::{Band, ScoreContext};
use gov_governor::RunGovernor;
use gov_ledger::{
    AlertEvent, AlertSink, FileAlertSink, Receipt, ReceiptKind, ReceiptPayload,
};
use gov_plan::PlanError;
use gov_policy::{AutonomyMode, Decision, PolicyDecision};
use gov_trust::{
    check_sweep, compare_confidence, BaselineStore, RegressionResult, RequalificationConfig,
    ScoreSummary, SuspensionStore, SweepPoint, TrustError,
};

use crate::config::{CoreConfig, CoreSettings};
use crate::pipeline::{evaluate_command, parse_at, Evaluation};
use crate::{EXIT_REGRESSION_CI, EXIT_REGRESSION_RESTRICTED, EXIT_STRUCTURAL};

use super::append_receipt;

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Preview what a command would do, with no side effects.
    Simulate {
        /// The command to evaluate.
        command: String,
        /// Evaluate as of this RFC 3339 timestamp (defaults to now).
        #[arg(long)]
        at: Option<String>,
        /// Autonomy mode to evaluate under.
        #[arg(long, default_value = "approval_gated")]
        autonomy: String,
        /// Treat human approval as already granted.
        #[arg(long)]
        approval: bool,
    },
    /// Score a command's confidence, optionally against its baseline.
    Score {
        command: String,
        #[arg(long)]
        at: Option<String>,
        #[arg(long, default_value = "approval_gated")]
        autonomy: String,
        /// Compare against the stored baseline for this fingerprint.
        #[arg(long)]
        compare: bool,
        /// Acknowledge a hard regression (records a receipt).
        #[arg(long)]
        ack_regression: bool,
        /// The planner needed a retry to produce this plan.
        #[arg(long)]
        planner_retried: bool,
        /// Lenient parsing was used while producing the plan.
        #[arg(long)]
        lenient_parse: bool,
    },
    /// Capture (or refuse to overwrite) a baseline for a command.
    Baseline {
        command: String,
        #[arg(long, default_value = "approval_gated")]
        autonomy: String,
        /// Replace an existing baseline.
        #[arg(long = "override")]
        override_existing: bool,
    },
    /// Sweep synthetic confidence inputs for a known fingerprint and check
    /// that decisions never become less permissive as confidence rises.
    SimulateVariants {
        /// The fingerprint to sweep (must have a baseline).
        fingerprint: String,
        /// Confidence values to evaluate, comma-separated.
        #[arg(long, value_delimiter = ',', required = true)]
        confidence: Vec<u32>,
    },
}

pub fn execute(cmd: &PolicyCommands, config: &CoreConfig) -> anyhow::Result<i32> {
    let settings = CoreSettings::load(&config.settings_file)?;
    match cmd {
        PolicyCommands::Simulate {
            command,
            at,
            autonomy,
            approval,
        } => simulate(config, &settings, command, at.as_deref(), autonomy, *approval),
        PolicyCommands::Score {
            command,
            at,
            autonomy,
            compare,
            ack_regression,
            planner_retried,
            lenient_parse,
        } => score(
            config,
            &settings,
            command,
            at.as_deref(),
            autonomy,
            *compare,
            *ack_regression,
            ScoreContext {
                planner_retry_observed: *planner_retried,
                lenient_parse_observed: *lenient_parse,
            },
        ),
        PolicyCommands::Baseline {
            command,
            autonomy,
            override_existing,
        } => baseline(config, &settings, command, autonomy, *override_existing),
        PolicyCommands::SimulateVariants {
            fingerprint,
            confidence,
        } => simulate_variants(config, &settings, fingerprint, confidence),
    }
}

fn simulate(
    _config: &CoreConfig,
    settings: &CoreSettings,
    command: &str,
    at: Option<&str>,
    autonomy: &str,
    approval: bool,
) -> anyhow::Result<i32> {
    let mode: AutonomyMode = autonomy.parse()?;
    let as_of = parse_at(at)?;

    let eval = match evaluate_command(
        settings,
        command,
        mode,
        as_of,
        approval,
        &ScoreContext::default(),
    ) {
        Ok(eval) => eval,
        Err(err) => return structural_failure(err),
    };

    // The governor is fresh for a simulation — this previews the composed
    // outcome under no operational load.
    let governor = RunGovernor::new(settings.governor.clone());
    let outcome = governor.gate(&eval.decision, &eval.fingerprint);

    println!("Simulation for: {}", eval.command);
    println!("  decision:          {:?}", eval.decision.decision);
    if let Some(code) = eval.decision.denial_code {
        println!("  denial_code:       {:?}", code);
    }
    println!(
        "  approval_required: {}",
        eval.features.requires_approval || eval.decision.requires_approval()
    );
    println!("  governor:          {}", outcome);
    println!("  steps:             {}", eval.plan.step_count());
    println!("  notes:");
    for reason in &eval.decision.reasons {
        println!("    - {}", reason);
    }
    Ok(0)
}

#[allow(clippy::too_many_arguments)]
fn score(
    config: &CoreConfig,
    settings: &CoreSettings,
    command: &str,
    at: Option<&str>,
    autonomy: &str,
    compare: bool,
    ack_regression: bool,
    ctx: ScoreContext,
) -> anyhow::Result<i32> {
    let mode: AutonomyMode = autonomy.parse()?;
    let as_of = parse_at(at)?;

    let eval = match evaluate_command(settings, command, mode, as_of, false, &ctx) {
        Ok(eval) => eval,
        Err(err) => return structural_failure(err),
    };

    print_score(&eval);

    if eval.decision.is_deny() {
        append_receipt(config, denial_receipt(&eval))?;
    }

    if !compare {
        return Ok(0);
    }

    let baselines = BaselineStore::new(&config.baselines_dir)?;
    let Some(previous) = baselines.latest(&eval.fingerprint)? else {
        println!();
        println!("No baseline recorded for this fingerprint yet.");
        return Ok(0);
    };

    let result = compare_confidence(
        ScoreSummary::from(&previous),
        ScoreSummary::from(&eval.score),
        settings.regression.tolerance,
    );
    print_regression(&result);

    if !result.regressed {
        return Ok(0);
    }

    let sink = FileAlertSink::new(&config.alerts_log);
    // Alert failures are logged, never fatal to the decision.
    if let Err(err) = sink.alert(&AlertEvent::RegressionDetected {
        fingerprint: eval.fingerprint.clone(),
        from_score: result.from.score,
        to_score: result.to.score,
        requires_ack: result.requires_ack,
        timestamp: Utc::now(),
    }) {
        tracing::warn!(error = %err, "alert delivery failed");
    }

    if !result.requires_ack {
        return Ok(0);
    }

    // Hard regression: suspend the fingerprint and demand acknowledgment.
    suspend_fingerprint(
        config,
        settings,
        &eval.fingerprint,
        format!(
            "hard regression: {} {} -> {} {}",
            result.from.score, result.from.action, result.to.score, result.to.action
        ),
    )?;

    if ack_regression {
        append_receipt(
            config,
            Receipt::new(
                eval.fingerprint.clone(),
                ReceiptKind::RegressionAcknowledged,
                ReceiptPayload::Regression {
                    fingerprint: eval.fingerprint.clone(),
                    from_score: result.from.score,
                    to_score: result.to.score,
                    acknowledged_by: "operator".to_string(),
                },
            ),
        )?;
        println!("Hard regression acknowledged and receipted.");
        return Ok(0);
    }

    println!("Hard regression NOT acknowledged (re-run with --ack-regression).");
    if std::env::var("CI").is_ok() {
        return Ok(EXIT_REGRESSION_CI);
    }
    if mode.is_restrictive() {
        return Ok(EXIT_REGRESSION_RESTRICTED);
    }
    Ok(0)
}

fn baseline(
    config: &CoreConfig,
    settings: &CoreSettings,
    command: &str,
    autonomy: &str,
    override_existing: bool,
) -> anyhow::Result<i32> {
    let mode: AutonomyMode = autonomy.parse()?;
    let eval = match evaluate_command(
        settings,
        command,
        mode,
        Utc::now(),
        false,
        &ScoreContext::default(),
    ) {
        Ok(eval) => eval,
        Err(err) => return structural_failure(err),
    };

    let record = gov_trust::BaselineRecord::from_score(
        eval.fingerprint.clone(),
        eval.command.clone(),
        settings.policy.policy_version.clone(),
        mode,
        eval.plan.required_capabilities.clone(),
        &eval.score,
        Utc::now(),
    );

    let store = BaselineStore::new(&config.baselines_dir)?;
    match store.append(&record, override_existing) {
        Ok(()) => {}
        Err(TrustError::BaselineExists { fingerprint }) => {
            println!(
                "Baseline already exists for fingerprint {} — re-run with --override to replace.",
                fingerprint
            );
            return Ok(1);
        }
        Err(err) => return Err(err.into()),
    }

    append_receipt(
        config,
        Receipt::new(
            eval.fingerprint.clone(),
            ReceiptKind::BaselineCaptured,
            ReceiptPayload::Baseline {
                fingerprint: eval.fingerprint.clone(),
                score: eval.score.score,
            },
        ),
    )?;

    println!(
        "Baseline recorded: fingerprint {} score {} band {} action {}",
        eval.fingerprint, eval.score.score, eval.score.band, eval.score.action
    );
    Ok(0)
}

fn simulate_variants(
    config: &CoreConfig,
    settings: &CoreSettings,
    fingerprint: &str,
    confidence: &[u32],
) -> anyhow::Result<i32> {
    let baselines = BaselineStore::new(&config.baselines_dir)?;
    let Some(record) = baselines.latest(fingerprint)? else {
        anyhow::bail!(
            "no baseline for fingerprint {} — capture one with `gov policy baseline` first",
            fingerprint
        );
    };

    let mut confidences: Vec<u32> = confidence.iter().map(|c| (*c).min(100)).collect();
    confidences.sort_unstable();
    confidences.dedup();

    let eval = match evaluate_command(
        settings,
        &record.command,
        record.autonomy_mode,
        Utc::now(),
        false,
        &ScoreContext::default(),
    ) {
        Ok(eval) => eval,
        Err(err) => return structural_failure(err),
    };

    let governor = RunGovernor::new(settings.governor.clone());
    let mut points = Vec::new();
    for &c in &confidences {
        let synthetic = synthetic_decision(&eval, c);
        let outcome = governor.gate(&synthetic, fingerprint);
        points.push(SweepPoint {
            confidence: c,
            outcome,
        });
    }

    println!("Confidence sweep for fingerprint {}:", fingerprint);
    println!("  command: {}", record.command);
    for point in &points {
        let bar: String = "#".repeat((point.confidence / 10) as usize);
        println!(
            "  {:>3} |{:<10}| {}",
            point.confidence, bar, point.outcome
        );
    }

    let violations = check_sweep(&points);
    if violations.is_empty() {
        println!("Decision ordering is monotonic across the sweep.");
        return Ok(0);
    }

    println!("ORDERING VIOLATIONS:");
    for v in &violations {
        println!(
            "  at confidence {}: {} -> {}",
            v.at_confidence, v.from, v.to
        );
    }

    // A non-monotonic sweep is a safety invariant violation, not advisory:
    // the fingerprint is suspended immediately.
    suspend_fingerprint(
        config,
        settings,
        fingerprint,
        format!(
            "sweep ordering violation at confidence {}",
            violations[0].at_confidence
        ),
    )?;
    Ok(1)
}

/// The per-variant decision for a synthetic confidence input: the real
/// policy decision, with the allow/approve split replayed at the synthetic
/// confidence band.
fn synthetic_decision(eval: &Evaluation, confidence: u32) -> PolicyDecision {
    let mut decision = eval.decision.clone();
    if decision.is_deny() {
        return decision;
    }
    let band = Band::from_score(confidence);
    decision.decision = if !eval.features.requires_approval
        && band == Band::High
        && eval.features.write_step_count == 0
    {
        Decision::Allow
    } else {
        Decision::RequireApproval
    };
    decision
}

fn suspend_fingerprint(
    config: &CoreConfig,
    settings: &CoreSettings,
    fingerprint: &str,
    reason: String,
) -> anyhow::Result<()> {
    let suspensions = SuspensionStore::new(
        &config.suspensions_dir,
        RequalificationConfig {
            required_successes: settings.requalification.required_successes,
        },
    )?;
    suspensions.suspend(fingerprint, reason.clone())?;

    append_receipt(
        config,
        Receipt::new(
            fingerprint,
            ReceiptKind::FingerprintSuspended,
            ReceiptPayload::Suspension {
                fingerprint: fingerprint.to_string(),
                reason: reason.clone(),
            },
        ),
    )?;

    let sink = FileAlertSink::new(&config.alerts_log);
    if let Err(err) = sink.alert(&AlertEvent::FingerprintSuspended {
        fingerprint: fingerprint.to_string(),
        reason,
        timestamp: Utc::now(),
    }) {
        tracing::warn!(error = %err, "alert delivery failed");
    }

    println!("Fingerprint {} SUSPENDED pending requalification.", fingerprint);
    Ok(())
}

fn denial_receipt(eval: &Evaluation) -> Receipt {
    Receipt::new(
        eval.fingerprint.clone(),
        ReceiptKind::PolicyDenied,
        ReceiptPayload::PolicyDenial {
            denial_code: eval
                .decision
                .denial_code
                .map(|c| format!("{:?}", c))
                .unwrap_or_default(),
            reasons: eval.decision.reasons.clone(),
        },
    )
}

fn print_score(eval: &Evaluation) {
    println!("Confidence for: {}", eval.command);
    println!(
        "  score {} | band {} | action {}",
        eval.score.score, eval.score.band, eval.score.action
    );
    println!("  fingerprint: {}", eval.fingerprint);
    println!("  reasons:");
    for reason in &eval.score.reasons {
        println!("    {:>5}  {:<24} {}", reason.weight, reason.code, reason.detail);
    }
}

fn print_regression(result: &RegressionResult) {
    println!();
    if !result.regressed {
        println!(
            "No regression against baseline ({} -> {}, tolerance {}).",
            result.from.score, result.to.score, result.tolerance
        );
        return;
    }
    println!("REGRESSION against baseline:");
    println!(
        "  from: score {} band {:?} action {}",
        result.from.score, result.from.band, result.from.action
    );
    println!(
        "  to:   score {} band {:?} action {}",
        result.to.score, result.to.band, result.to.action
    );
    println!(
        "  tolerance: {} | requires_ack: {}",
        result.tolerance, result.requires_ack
    );
}

fn structural_failure(err: PlanError) -> anyhow::Result<i32> {
    eprintln!("structural error: {}", err);
    Ok(EXIT_STRUCTURAL)
}
