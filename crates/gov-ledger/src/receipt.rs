// receipt.rs — The receipt data model.
//
// One receipt per governed decision. Payloads are tagged variants per known
// record kind, validated at the boundary; the Generic fallback keeps the
// format forward-compatible for record kinds this version does not know.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hasher;

/// What kind of governed decision this receipt records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    /// Policy denied a plan.
    PolicyDenied,
    /// An awaiting-approval record was created.
    ApprovalRequested,
    /// An approval was granted and handed off to the executor.
    ApprovalGranted,
    /// An approval was rejected.
    ApprovalRejected,
    /// A rollback was recorded against an approved execution.
    RollbackRecorded,
    /// An execution finished (success or failure).
    ExecutionCompleted,
    /// An operator acknowledged a hard confidence regression.
    RegressionAcknowledged,
    /// A fingerprint was suspended.
    FingerprintSuspended,
    /// A fingerprint was reinstated after probation.
    FingerprintReinstated,
    /// A confidence baseline was captured.
    BaselineCaptured,
}

/// Structured payload per receipt kind, with a generic fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "payload_kind", rename_all = "snake_case")]
pub enum ReceiptPayload {
    PolicyDenial {
        denial_code: String,
        reasons: Vec<String>,
    },
    Approval {
        plan_hash: String,
        pending_step_ids: Vec<String>,
    },
    Rejection {
        reason: String,
    },
    Execution {
        status: String,
        confidence: u32,
    },
    Regression {
        fingerprint: String,
        from_score: u32,
        to_score: u32,
        acknowledged_by: String,
    },
    Suspension {
        fingerprint: String,
        reason: String,
    },
    Baseline {
        fingerprint: String,
        score: u32,
    },
    /// Forward-compatible escape hatch for kinds added later.
    Generic {
        data: serde_json::Value,
    },
}

/// One immutable, chained audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    /// Unique identifier for this receipt.
    pub receipt_id: Uuid,

    /// The execution (or operation) this receipt belongs to.
    pub execution_id: String,

    pub kind: ReceiptKind,

    pub timestamp: DateTime<Utc>,

    pub payload: ReceiptPayload,

    /// SHA-256 of the serialized payload.
    pub payload_hash: String,

    /// Hash of the previous receipt's JSON line. None only for the first
    /// receipt in a log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,

    /// Optional base64 Ed25519 signature over the payload hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Receipt {
    /// Create a new receipt with the current timestamp.
    ///
    /// `previous_hash` and `signature` are set by the ledger at append
    /// time — a receipt's position in the chain is not the caller's call.
    pub fn new(execution_id: impl Into<String>, kind: ReceiptKind, payload: ReceiptPayload) -> Self {
        // Payload serialization cannot fail for these types.
        let payload_json = serde_json::to_string(&payload).unwrap_or_default();
        Self {
            receipt_id: Uuid::new_v4(),
            execution_id: execution_id.into(),
            kind,
            timestamp: Utc::now(),
            payload,
            payload_hash: hasher::hash_str(&payload_json),
            previous_hash: None,
            signature: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_hash_is_computed_on_creation() {
        let receipt = Receipt::new(
            "exec-1",
            ReceiptKind::ApprovalRejected,
            ReceiptPayload::Rejection {
                reason: "too risky".to_string(),
            },
        );
        assert_eq!(receipt.payload_hash.len(), 64);
        assert!(receipt.previous_hash.is_none());
        assert!(receipt.signature.is_none());
    }

    #[test]
    fn identical_payloads_hash_identically() {
        let payload = ReceiptPayload::Baseline {
            fingerprint: "fp-1".to_string(),
            score: 90,
        };
        let a = Receipt::new("exec-1", ReceiptKind::BaselineCaptured, payload.clone());
        let b = Receipt::new("exec-2", ReceiptKind::BaselineCaptured, payload);
        assert_eq!(a.payload_hash, b.payload_hash);
        assert_ne!(a.receipt_id, b.receipt_id);
    }

    #[test]
    fn serialization_round_trip() {
        let receipt = Receipt::new(
            "exec-1",
            ReceiptKind::PolicyDenied,
            ReceiptPayload::PolicyDenial {
                denial_code: "write_not_permitted".to_string(),
                reasons: vec!["write steps are not permitted in read_only mode".to_string()],
            },
        );
        let json = serde_json::to_string(&receipt).unwrap();
        let restored: Receipt = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, receipt);
    }

    #[test]
    fn generic_payload_survives_round_trip() {
        let receipt = Receipt::new(
            "exec-1",
            ReceiptKind::ExecutionCompleted,
            ReceiptPayload::Generic {
                data: serde_json::json!({"future_field": [1, 2, 3]}),
            },
        );
        let json = serde_json::to_string(&receipt).unwrap();
        let restored: Receipt = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.payload, receipt.payload);
    }
}
