// baseline.rs — Append-only score baseline store.
//
// One `<fingerprint>.jsonl` file per fingerprint. Records are appended,
// never edited: the "latest" lookup reads the last line, and history is the
// whole file in order. Writing over an existing baseline requires an
// explicit override so trust cannot be silently re-anchored.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use gov_confidence::{Band, ConfidenceScore, RecommendedAction};
use gov_policy::AutonomyMode;

use crate::error::TrustError;

/// One captured baseline for a fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BaselineRecord {
    pub fingerprint: String,
    /// The normalized command this class of operation runs.
    pub command: String,
    pub policy_version: String,
    pub autonomy_mode: AutonomyMode,
    /// Sorted, de-duplicated capability set.
    pub capability_set: Vec<String>,
    pub score: u32,
    pub band: Band,
    pub action: RecommendedAction,
    pub captured_at: DateTime<Utc>,
}

impl BaselineRecord {
    /// Build a record from a scored evaluation.
    #[allow(clippy::too_many_arguments)]
    pub fn from_score(
        fingerprint: impl Into<String>,
        command: impl Into<String>,
        policy_version: impl Into<String>,
        autonomy_mode: AutonomyMode,
        mut capability_set: Vec<String>,
        score: &ConfidenceScore,
        captured_at: DateTime<Utc>,
    ) -> Self {
        capability_set.sort();
        capability_set.dedup();
        Self {
            fingerprint: fingerprint.into(),
            command: command.into(),
            policy_version: policy_version.into(),
            autonomy_mode,
            capability_set,
            score: score.score,
            band: score.band,
            action: score.action,
            captured_at,
        }
    }
}

/// Append-only baseline store, one JSONL file per fingerprint.
pub struct BaselineStore {
    dir: PathBuf,
}

impl BaselineStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, TrustError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| TrustError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// The most recent baseline for a fingerprint, if any.
    pub fn latest(&self, fingerprint: &str) -> Result<Option<BaselineRecord>, TrustError> {
        Ok(self.history(fingerprint)?.into_iter().last())
    }

    /// All baselines recorded for a fingerprint, oldest first.
    pub fn history(&self, fingerprint: &str) -> Result<Vec<BaselineRecord>, TrustError> {
        let path = self.record_file(fingerprint);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).map_err(|source| TrustError::Io {
            path: path.clone(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|source| TrustError::Io {
                path: path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    /// Append a baseline record.
    ///
    /// Refuses with [`TrustError::BaselineExists`] when a record is already
    /// present and `override_existing` is false. The append itself is one
    /// JSON line plus flush, so readers never observe a partial record.
    pub fn append(
        &self,
        record: &BaselineRecord,
        override_existing: bool,
    ) -> Result<(), TrustError> {
        if !override_existing && self.latest(&record.fingerprint)?.is_some() {
            return Err(TrustError::BaselineExists {
                fingerprint: record.fingerprint.clone(),
            });
        }

        let path = self.record_file(&record.fingerprint);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TrustError::Io {
                path: path.clone(),
                source,
            })?;
        let json = serde_json::to_string(record)?;
        writeln!(file, "{}", json).map_err(|source| TrustError::Io {
            path: path.clone(),
            source,
        })?;
        file.flush().map_err(|source| TrustError::Io { path, source })?;
        debug!(
            fingerprint = %record.fingerprint,
            score = record.score,
            "baseline recorded"
        );
        Ok(())
    }

    /// All fingerprints with at least one baseline, sorted.
    pub fn list_fingerprints(&self) -> Result<Vec<String>, TrustError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|source| TrustError::Io {
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
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    fingerprints.push(stem.to_string());
                }
            }
        }
        fingerprints.sort();
        Ok(fingerprints)
    }

    fn record_file(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", fingerprint))
    }
}
