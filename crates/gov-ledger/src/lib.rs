//! # gov-ledger
//!
//! Tamper-evident audit trail for the governance core.
//!
//! Every governed decision — policy denial, approval creation, rejection,
//! execution completion, regression acknowledgment, suspension — appends
//! one [`Receipt`] to an append-only JSONL log. Receipts chain via
//! `previous_hash`, so inserting, deleting, or editing any record breaks
//! verification. An optional Ed25519 signer attests each receipt.
//!
//! [`export_bundle`] produces a self-contained, timestamped audit bundle:
//! filtered receipts, redacted copies of the supporting ledgers, a policy
//! snapshot, and a manifest of every file's digest — itself hashed.
//! [`verify_bundle`] recomputes everything offline.
//!
//! ## Key invariants
//!
//! - **Receipts are never edited or deleted**: export creates filtered
//!   copies, never mutations of the source log.
//! - **Appends are atomic per record**: one JSON line plus flush; a
//!   partially written receipt is never visible to readers.
//! - **Verification needs nothing but the bundle**: no network, no access
//!   to the original system.

pub mod alert;
pub mod error;
pub mod export;
pub mod hasher;
pub mod ledger;
pub mod receipt;
pub mod signer;

pub use alert::{AlertEvent, AlertSink, FileAlertSink, LogAlertSink};
pub use error::LedgerError;
pub use export::{
    export_bundle, verify_bundle, AuditExportManifest, ExportSources, ManifestEntry,
    VerificationReport,
};
pub use ledger::ReceiptLedger;
pub use receipt::{Receipt, ReceiptKind, ReceiptPayload};
pub use signer::{verify_signature, ReceiptSigner};
