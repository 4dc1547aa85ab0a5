// audit.rs — Audit subcommands: verify, tail, export, verify-export.

use std::path::PathBuf;

use chrono::Utc;
use clap::Subcommand;

use gov_ledger::{export_bundle, verify_bundle, ExportSources, LedgerError, ReceiptLedger};

use crate::config::{CoreConfig, CoreSettings};
use crate::pipeline::parse_at;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the receipt chain integrity.
    Verify {
        /// Path to the receipt log (defaults to .gov/receipts.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Show recent receipts.
    Tail {
        #[arg(long)]
        log: Option<PathBuf>,
        /// Number of receipts to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
    /// Produce a self-contained, offline-verifiable audit bundle.
    Export {
        /// Output directory (defaults to a timestamped dir under .gov/exports).
        #[arg(long)]
        out: Option<PathBuf>,
        /// Only include receipts at or after this RFC 3339 timestamp.
        #[arg(long)]
        since: Option<String>,
    },
    /// Verify a previously exported bundle.
    VerifyExport {
        /// Path to the bundle directory.
        bundle: PathBuf,
    },
}

pub fn execute(cmd: &AuditCommands, config: &CoreConfig) -> anyhow::Result<i32> {
    match cmd {
        AuditCommands::Verify { log } => {
            let path = log.clone().unwrap_or_else(|| config.receipts_log.clone());
            if !path.exists() {
                println!("No receipt log found at {}", path.display());
                return Ok(0);
            }
            match ReceiptLedger::verify_chain(&path) {
                Ok(count) => {
                    println!("Receipt log verified: {} receipt(s), chain intact.", count);
                    Ok(0)
                }
                Err(LedgerError::IntegrityViolation {
                    line,
                    expected,
                    actual,
                }) => {
                    println!("INTEGRITY VIOLATION at line {}:", line);
                    println!("  Expected previous_hash: {}", expected);
                    println!("  Actual previous_hash:   {}", actual);
                    println!();
                    println!("The receipt log may have been tampered with.");
                    Ok(1)
                }
                Err(err) => Err(err.into()),
            }
        }

        AuditCommands::Tail { log, n } => {
            let path = log.clone().unwrap_or_else(|| config.receipts_log.clone());
            if !path.exists() {
                println!("No receipt log found at {}", path.display());
                return Ok(0);
            }
            let receipts = ReceiptLedger::read_all(&path)?;
            let start = receipts.len().saturating_sub(*n);
            let recent = &receipts[start..];
            if recent.is_empty() {
                println!("No receipts.");
                return Ok(0);
            }
            println!(
                "{:<26} {:<26} {:<24} SIGNED",
                "TIMESTAMP", "KIND", "EXECUTION"
            );
            println!("{}", "-".repeat(90));
            for receipt in recent {
                println!(
                    "{:<26} {:<26} {:<24} {}",
                    receipt.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    format!("{:?}", receipt.kind),
                    receipt.execution_id,
                    if receipt.signature.is_some() { "yes" } else { "-" },
                );
            }
            Ok(0)
        }

        AuditCommands::Export { out, since } => {
            let settings = CoreSettings::load(&config.settings_file)?;
            let cutoff = match since.as_deref() {
                Some(text) => Some(parse_at(Some(text))?),
                None => None,
            };
            let bundle_dir = out.clone().unwrap_or_else(|| {
                config
                    .exports_dir
                    .join(format!("bundle-{}", Utc::now().format("%Y%m%dT%H%M%SZ")))
            });

            let sources = ExportSources {
                receipts_log: &config.receipts_log,
                approvals_dir: Some(&config.approvals_dir),
                baselines_dir: Some(&config.baselines_dir),
                suspensions_dir: Some(&config.suspensions_dir),
                policy_snapshot: serde_json::to_value(&settings.policy)?,
            };
            let manifest = export_bundle(
                &bundle_dir,
                cutoff,
                &sources,
                &settings.export.redact_fields,
            )?;

            println!("Exported audit bundle: {}", bundle_dir.display());
            println!(
                "  {} file(s), manifest hash {}",
                manifest.files.len(),
                manifest.manifest_hash
            );
            Ok(0)
        }

        AuditCommands::VerifyExport { bundle } => {
            let report = verify_bundle(bundle)?;
            if report.ok {
                println!(
                    "Bundle verified: {} file(s), all digests and the manifest hash match.",
                    report.files_checked
                );
                Ok(0)
            } else {
                println!("BUNDLE VERIFICATION FAILED:");
                for failure in &report.failures {
                    println!("  - {}", failure);
                }
                Ok(1)
            }
        }
    }
}
