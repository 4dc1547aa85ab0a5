// commands/ — Subcommand implementations.

pub mod audit;
pub mod policy;
pub mod queue;

use gov_ledger::{Receipt, ReceiptLedger};

use crate::config::CoreConfig;

/// Append one receipt to the project ledger.
///
/// Every governed decision is receipted, including denials — visibility
/// into *why* something was blocked is part of the contract.
pub fn append_receipt(config: &CoreConfig, mut receipt: Receipt) -> anyhow::Result<()> {
    let mut ledger = ReceiptLedger::open(&config.receipts_log)?;
    ledger.append(&mut receipt)?;
    Ok(())
}
