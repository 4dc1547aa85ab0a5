//! # gov-cli
//!
//! Operator CLI for the governance core.
//!
//! - `gov policy simulate/score/baseline/simulate-variants` — preview what
//!   a command would do, score it, manage trust baselines, and sweep
//!   synthetic confidence inputs for ordering regressions
//! - `gov queue submit/list/approve/reject/rollback` — the approval queue
//! - `gov audit verify/tail/export/verify-export` — the receipt ledger and
//!   offline-verifiable export bundles
//!
//! Exit codes: 0 success; 1 operational error; 2 structural/parse error;
//! 3 unacknowledged hard regression under CI; 4 unacknowledged hard
//! regression under a restrictive autonomy mode.

mod commands;
mod config;
mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use config::CoreConfig;

/// Exit code for structural/parse errors.
pub(crate) const EXIT_STRUCTURAL: i32 = 2;
/// Exit code for an unacknowledged hard regression under CI.
pub(crate) const EXIT_REGRESSION_CI: i32 = 3;
/// Exit code for an unacknowledged hard regression under restrictive modes.
pub(crate) const EXIT_REGRESSION_RESTRICTED: i32 = 4;

/// Governance core CLI — policy, confidence, approvals, audit.
#[derive(Parser)]
#[command(name = "gov", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate, score, and baseline commands under policy.
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommands,
    },
    /// Operate on the approval queue.
    Queue {
        #[command(subcommand)]
        command: commands::queue::QueueCommands,
    },
    /// Inspect and export the receipt ledger.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = CoreConfig::for_project(&project_root);

    let result = match &cli.command {
        Commands::Policy { command } => commands::policy::execute(command, &config),
        Commands::Queue { command } => commands::queue::execute(command, &config),
        Commands::Audit { command } => commands::audit::execute(command, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
