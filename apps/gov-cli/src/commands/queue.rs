// queue.rs — Approval queue subcommands: submit, list, approve, reject,
// rollback, complete.

use clap::Subcommand;
use uuid::Uuid;

use gov_approval::{ApprovalStatus, ApprovalStore, FilePrestateSource};
use gov_confidence::ScoreContext;
use gov_governor::Verdict;
use gov_ledger::{AlertEvent, AlertSink, FileAlertSink, Receipt, ReceiptKind, ReceiptPayload};
use gov_policy::AutonomyMode;
use gov_trust::{ExecutionOutcome, ExecutionStatus, SuspensionStore};

use crate::config::{CoreConfig, CoreSettings};
use crate::pipeline::{evaluate_command, parse_at};
use crate::EXIT_STRUCTURAL;

use super::append_receipt;

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Evaluate a command and, if policy requires approval, enqueue it
    /// with prestate snapshots.
    Submit {
        command: String,
        #[arg(long, default_value = "approval_gated")]
        autonomy: String,
        #[arg(long)]
        at: Option<String>,
        /// Execution id to assign (defaults to a fresh UUID).
        #[arg(long)]
        execution_id: Option<String>,
    },
    /// List approval records.
    List {
        /// Filter by status: awaiting_approval, approved, rejected.
        #[arg(long)]
        status: Option<String>,
    },
    /// Approve an awaiting record (checks prestate staleness).
    Approve {
        execution_id: String,
        /// Who is approving.
        #[arg(long, default_value = "operator")]
        by: String,
    },
    /// Reject an awaiting record with a reason.
    Reject {
        execution_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Record a rollback against an approved execution.
    Rollback { execution_id: String },
    /// Record an execution's completion reported by the executor. Feeds
    /// the probation counter for suspended fingerprints.
    Complete {
        execution_id: String,
        /// The fingerprint this execution ran under.
        #[arg(long)]
        fingerprint: String,
        /// Terminal status: succeeded or failed.
        #[arg(long, default_value = "succeeded")]
        status: String,
        /// Confidence score the execution ran with.
        #[arg(long, default_value = "0")]
        confidence: u32,
        /// The execution was throttled by the governor.
        #[arg(long)]
        throttled: bool,
        /// A rollback was recorded for this execution.
        #[arg(long)]
        rolled_back: bool,
        #[arg(long, default_value = "approval_gated")]
        autonomy: String,
    },
}

pub fn execute(cmd: &QueueCommands, config: &CoreConfig) -> anyhow::Result<i32> {
    let settings = CoreSettings::load(&config.settings_file)?;
    let store = ApprovalStore::new(&config.approvals_dir)?;
    let prestates = FilePrestateSource::new(&config.workspace_root);

    match cmd {
        QueueCommands::Submit {
            command,
            autonomy,
            at,
            execution_id,
        } => {
            let mode: AutonomyMode = autonomy.parse()?;
            let as_of = parse_at(at.as_deref())?;
            let eval = match evaluate_command(
                &settings,
                command,
                mode,
                as_of,
                false,
                &ScoreContext::default(),
            ) {
                Ok(eval) => eval,
                Err(err) => {
                    eprintln!("structural error: {}", err);
                    return Ok(EXIT_STRUCTURAL);
                }
            };

            if eval.decision.is_deny() {
                append_receipt(
                    config,
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
                    ),
                )?;
                println!("Policy denied — nothing to enqueue.");
                for reason in &eval.decision.reasons {
                    println!("  - {}", reason);
                }
                return Ok(1);
            }

            if !eval.decision.requires_approval() {
                println!("Policy allows this command without approval — nothing to enqueue.");
                return Ok(0);
            }

            let execution_id = execution_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let state = store.create(&execution_id, &eval.plan, &prestates)?;

            append_receipt(
                config,
                Receipt::new(
                    execution_id.clone(),
                    ReceiptKind::ApprovalRequested,
                    ReceiptPayload::Approval {
                        plan_hash: state.plan_hash.clone(),
                        pending_step_ids: state.pending_step_ids.clone(),
                    },
                ),
            )?;

            println!(
                "Awaiting approval: execution {} ({} step(s), {} prestate snapshot(s))",
                execution_id,
                state.pending_step_ids.len(),
                state.prestates.len()
            );
            Ok(0)
        }

        QueueCommands::List { status } => {
            let filter = match status.as_deref() {
                None => None,
                Some("awaiting_approval") => Some(ApprovalStatus::AwaitingApproval),
                Some("approved") => Some(ApprovalStatus::Approved),
                Some("rejected") => Some(ApprovalStatus::Rejected),
                Some(other) => anyhow::bail!("unknown status filter '{}'", other),
            };
            let records = store.list(filter)?;
            if records.is_empty() {
                println!("No approval records.");
                return Ok(0);
            }
            println!(
                "{:<38} {:<18} {:<7} {:<26} ROLLED_BACK",
                "EXECUTION", "STATUS", "STEPS", "CREATED"
            );
            println!("{}", "-".repeat(100));
            for record in records {
                println!(
                    "{:<38} {:<18} {:<7} {:<26} {}",
                    record.execution_id,
                    record.status.to_string(),
                    record.pending_step_ids.len(),
                    record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    if record.rolled_back_at.is_some() { "yes" } else { "-" },
                );
            }
            Ok(0)
        }

        QueueCommands::Approve { execution_id, by } => {
            let state = store.approve(execution_id, by, &prestates)?;
            append_receipt(
                config,
                Receipt::new(
                    execution_id.clone(),
                    ReceiptKind::ApprovalGranted,
                    ReceiptPayload::Approval {
                        plan_hash: state.plan_hash.clone(),
                        pending_step_ids: state.pending_step_ids.clone(),
                    },
                ),
            )?;
            println!(
                "Approved execution {} — handed off to the executor.",
                execution_id
            );
            Ok(0)
        }

        QueueCommands::Reject {
            execution_id,
            reason,
        } => {
            store.reject(execution_id, reason)?;
            append_receipt(
                config,
                Receipt::new(
                    execution_id.clone(),
                    ReceiptKind::ApprovalRejected,
                    ReceiptPayload::Rejection {
                        reason: reason.clone(),
                    },
                ),
            )?;
            println!("Rejected execution {}: {}", execution_id, reason);
            Ok(0)
        }

        QueueCommands::Rollback { execution_id } => {
            store.rollback(execution_id)?;
            append_receipt(
                config,
                Receipt::new(
                    execution_id.clone(),
                    ReceiptKind::RollbackRecorded,
                    ReceiptPayload::Generic {
                        data: serde_json::json!({ "execution_id": execution_id }),
                    },
                ),
            )?;
            println!("Rollback recorded for execution {}.", execution_id);
            Ok(0)
        }

        QueueCommands::Complete {
            execution_id,
            fingerprint,
            status,
            confidence,
            throttled,
            rolled_back,
            autonomy,
        } => {
            let mode: AutonomyMode = autonomy.parse()?;
            let status = match status.as_str() {
                "succeeded" => ExecutionStatus::Succeeded,
                "failed" => ExecutionStatus::Failed,
                other => anyhow::bail!("unknown status '{}' (succeeded|failed)", other),
            };

            append_receipt(
                config,
                Receipt::new(
                    execution_id.clone(),
                    ReceiptKind::ExecutionCompleted,
                    ReceiptPayload::Execution {
                        status: format!("{:?}", status).to_lowercase(),
                        confidence: *confidence,
                    },
                ),
            )?;

            let suspensions = SuspensionStore::new(
                &config.suspensions_dir,
                settings.requalification.clone(),
            )?;
            let outcome = ExecutionOutcome {
                status,
                confidence: *confidence,
                governor: if *throttled {
                    Verdict::Delay
                } else {
                    Verdict::Allow
                },
                policy_denied: false,
                throttled: *throttled,
                rollback_recorded: *rolled_back,
                approval_required: false,
                autonomy_mode: mode,
            };

            let was_suspended = suspensions.is_suspended(fingerprint)?;
            match suspensions.record_outcome(fingerprint, &outcome)? {
                Some(record) if was_suspended && !record.suspended => {
                    append_receipt(
                        config,
                        Receipt::new(
                            fingerprint.clone(),
                            ReceiptKind::FingerprintReinstated,
                            ReceiptPayload::Generic {
                                data: serde_json::json!({ "fingerprint": fingerprint }),
                            },
                        ),
                    )?;
                    let sink = FileAlertSink::new(&config.alerts_log);
                    if let Err(err) = sink.alert(&AlertEvent::FingerprintReinstated {
                        fingerprint: fingerprint.clone(),
                        timestamp: chrono::Utc::now(),
                    }) {
                        tracing::warn!(error = %err, "alert delivery failed");
                    }
                    println!(
                        "Execution recorded. Fingerprint {} REINSTATED after probation.",
                        fingerprint
                    );
                }
                Some(record) if record.suspended => {
                    println!(
                        "Execution recorded. Probation streak {}/{} for fingerprint {}.",
                        record.streak, record.probation_required, fingerprint
                    );
                }
                _ => println!("Execution recorded."),
            }
            Ok(0)
        }
    }
}
