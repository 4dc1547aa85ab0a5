// state.rs — The approval record and its transitions.
//
// Lifecycle: awaiting_approval → approved | rejected. Both outcomes are
// terminal. Rollback is a marker stamped onto an approved record, not a
// state re-entry. Transition methods validate the current status and
// return ApprovalError::Conflict for anything else — callers must see
// invalid transitions, not have them silently ignored.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApprovalError;
use crate::prestate::PrestateSnapshot;

/// Where an approval record is in its lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    AwaitingApproval,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::AwaitingApproval => write!(f, "awaiting_approval"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// One approval record — a single execution id's pending human decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalState {
    pub execution_id: String,
    pub status: ApprovalStatus,
    /// Hash of the plan this approval covers.
    pub plan_hash: String,
    /// Steps awaiting approval, in plan order.
    pub pending_step_ids: Vec<String>,
    /// Prestate snapshot per pending step, captured before this record
    /// was persisted.
    pub prestates: BTreeMap<String, PrestateSnapshot>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    /// Terminal rollback marker. Only set on approved records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back_at: Option<DateTime<Utc>>,
}

impl ApprovalState {
    /// Create a fresh awaiting-approval record.
    pub fn new(
        execution_id: impl Into<String>,
        plan_hash: impl Into<String>,
        pending_step_ids: Vec<String>,
        prestates: BTreeMap<String, PrestateSnapshot>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: ApprovalStatus::AwaitingApproval,
            plan_hash: plan_hash.into(),
            pending_step_ids,
            prestates,
            created_at: Utc::now(),
            resolved_at: None,
            rejection_reason: None,
            approved_by: None,
            rolled_back_at: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status != ApprovalStatus::AwaitingApproval
    }

    /// Approve: marks the handoff to the external executor. Valid only
    /// from awaiting_approval.
    pub fn approve(&mut self, approved_by: impl Into<String>) -> Result<(), ApprovalError> {
        self.require_awaiting()?;
        self.status = ApprovalStatus::Approved;
        self.approved_by = Some(approved_by.into());
        self.resolved_at = Some(Utc::now());
        Ok(())
    }

    /// Reject with a reason. Valid only from awaiting_approval; an empty
    /// reason is refused.
    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), ApprovalError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(ApprovalError::ReasonRequired);
        }
        self.require_awaiting()?;
        self.status = ApprovalStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.resolved_at = Some(Utc::now());
        Ok(())
    }

    /// Stamp the terminal rollback marker. Valid only on approved records
    /// that have not already been rolled back.
    pub fn mark_rolled_back(&mut self) -> Result<(), ApprovalError> {
        if self.status != ApprovalStatus::Approved {
            return Err(self.conflict());
        }
        if self.rolled_back_at.is_some() {
            return Err(ApprovalError::Conflict {
                execution_id: self.execution_id.clone(),
                status: "rolled_back".to_string(),
            });
        }
        self.rolled_back_at = Some(Utc::now());
        Ok(())
    }

    fn require_awaiting(&self) -> Result<(), ApprovalError> {
        if self.status == ApprovalStatus::AwaitingApproval {
            Ok(())
        } else {
            Err(self.conflict())
        }
    }

    fn conflict(&self) -> ApprovalError {
        ApprovalError::Conflict {
            execution_id: self.execution_id.clone(),
            status: self.status.to_string(),
        }
    }
}
