// requalification.rs — Suspension and probation tracking.
//
// A confirmed regression suspends a fingerprint: AUTO_RUN eligibility is
// denied until probation accumulates the configured number of consecutive
// clean executions. A clean execution succeeded, was not policy-denied,
// was not throttled, and recorded no rollback. Any unclean outcome resets
// the streak to zero.
//
// State is one JSON file per fingerprint so it survives process restarts.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use gov_governor::Verdict;
use gov_policy::AutonomyMode;

use crate::error::TrustError;

/// Probation tuning. Loadable from `gov.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RequalificationConfig {
    /// Consecutive clean executions required to reinstate a fingerprint.
    pub required_successes: u32,
}

impl Default for RequalificationConfig {
    fn default() -> Self {
        Self {
            required_successes: 3,
        }
    }
}

/// Terminal status of one execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Succeeded,
    Failed,
}

/// Everything the probation counter looks at for one execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub confidence: u32,
    pub governor: Verdict,
    pub policy_denied: bool,
    pub throttled: bool,
    pub rollback_recorded: bool,
    pub approval_required: bool,
    pub autonomy_mode: AutonomyMode,
}

impl ExecutionOutcome {
    /// Whether this outcome counts toward the probation streak.
    pub fn is_clean(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
            && !self.policy_denied
            && !self.throttled
            && !self.rollback_recorded
    }
}

/// Per-fingerprint suspension and probation state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuspensionRecord {
    pub fingerprint: String,
    pub suspended: bool,
    /// Why the fingerprint was suspended (regression description).
    pub reason: String,
    pub suspended_at: DateTime<Utc>,
    /// Clean executions required before reinstatement.
    pub probation_required: u32,
    /// Current consecutive clean streak.
    pub streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reinstated_at: Option<DateTime<Utc>>,
}

/// File-backed suspension store, one JSON record per fingerprint.
pub struct SuspensionStore {
    dir: PathBuf,
    config: RequalificationConfig,
}

impl SuspensionStore {
    pub fn new(dir: impl AsRef<Path>, config: RequalificationConfig) -> Result<Self, TrustError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| TrustError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, config })
    }

    /// Suspend a fingerprint. Restarts probation from zero even when the
    /// fingerprint was already suspended.
    pub fn suspend(
        &self,
        fingerprint: &str,
        reason: impl Into<String>,
    ) -> Result<SuspensionRecord, TrustError> {
        let record = SuspensionRecord {
            fingerprint: fingerprint.to_string(),
            suspended: true,
            reason: reason.into(),
            suspended_at: Utc::now(),
            probation_required: self.config.required_successes,
            streak: 0,
            reinstated_at: None,
        };
        self.save(&record)?;
        info!(fingerprint, reason = %record.reason, "fingerprint suspended");
        Ok(record)
    }

    /// The stored record for a fingerprint, if any.
    pub fn get(&self, fingerprint: &str) -> Result<Option<SuspensionRecord>, TrustError> {
        let path = self.record_file(fingerprint);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| TrustError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Whether AUTO_RUN is currently denied for this fingerprint.
    pub fn is_suspended(&self, fingerprint: &str) -> Result<bool, TrustError> {
        Ok(self.get(fingerprint)?.map(|r| r.suspended).unwrap_or(false))
    }

    /// Record an execution outcome against a fingerprint's probation.
    ///
    /// Returns the updated record when the fingerprint is (or was) under
    /// suspension; None when there is nothing to track. Reinstates the
    /// fingerprint automatically once the streak reaches the requirement.
    pub fn record_outcome(
        &self,
        fingerprint: &str,
        outcome: &ExecutionOutcome,
    ) -> Result<Option<SuspensionRecord>, TrustError> {
        let Some(mut record) = self.get(fingerprint)? else {
            return Ok(None);
        };
        if !record.suspended {
            return Ok(Some(record));
        }

        if outcome.is_clean() {
            record.streak += 1;
            debug!(
                fingerprint,
                streak = record.streak,
                required = record.probation_required,
                "probation success recorded"
            );
            if record.streak >= record.probation_required {
                record.suspended = false;
                record.reinstated_at = Some(Utc::now());
                info!(fingerprint, "fingerprint reinstated after probation");
            }
        } else {
            // Any unclean outcome restarts probation.
            record.streak = 0;
            debug!(fingerprint, "probation streak reset");
        }

        self.save(&record)?;
        Ok(Some(record))
    }

    /// All fingerprints with suspension records, sorted.
    pub fn list_fingerprints(&self) -> Result<Vec<String>, TrustError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| TrustError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut fingerprints = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| TrustError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    fingerprints.push(stem.to_string());
                }
            }
        }
        fingerprints.sort();
        Ok(fingerprints)
    }

    fn save(&self, record: &SuspensionRecord) -> Result<(), TrustError> {
        let path = self.record_file(&record.fingerprint);
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json).map_err(|source| TrustError::Io { path, source })?;
        Ok(())
    }

    fn record_file(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint))
    }
}
