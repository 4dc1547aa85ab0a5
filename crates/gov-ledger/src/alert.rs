// alert.rs — Alert sink interface.
//
// Trust-breaking events (confirmed regressions, suspensions) are pushed to
// an alert sink. Delivery backends (email, chat, pagers) live outside this
// core; implementations of the trait decide what to do with each event.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LedgerError;

/// Events worth a human's attention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AlertEvent {
    /// A confidence regression was confirmed against the baseline.
    RegressionDetected {
        fingerprint: String,
        from_score: u32,
        to_score: u32,
        requires_ack: bool,
        timestamp: DateTime<Utc>,
    },
    /// A fingerprint lost AUTO_RUN eligibility.
    FingerprintSuspended {
        fingerprint: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// A fingerprint completed probation.
    FingerprintReinstated {
        fingerprint: String,
        timestamp: DateTime<Utc>,
    },
}

/// Receives alert events. Errors are logged by callers but never stop a
/// governance decision.
pub trait AlertSink: Send {
    fn alert(&self, event: &AlertEvent) -> Result<(), LedgerError>;
}

/// Always-on sink that logs through `tracing`.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, event: &AlertEvent) -> Result<(), LedgerError> {
        warn!(event = ?event, "governance alert");
        Ok(())
    }
}

/// Appends alert events as JSONL to a file.
pub struct FileAlertSink {
    path: PathBuf,
}

impl FileAlertSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl AlertSink for FileAlertSink {
    fn alert(&self, event: &AlertEvent) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| LedgerError::OpenFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| LedgerError::OpenFailed {
                path: self.path.clone(),
                source,
            })?;
        writeln!(file, "{}", serde_json::to_string(event)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_sink_appends_jsonl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");
        let sink = FileAlertSink::new(&path);

        sink.alert(&AlertEvent::FingerprintSuspended {
            fingerprint: "fp-1".to_string(),
            reason: "sweep violation".to_string(),
            timestamp: Utc::now(),
        })
        .unwrap();
        sink.alert(&AlertEvent::FingerprintReinstated {
            fingerprint: "fp-1".to_string(),
            timestamp: Utc::now(),
        })
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("fingerprint_suspended"));
        assert!(content.contains("fingerprint_reinstated"));
    }

    #[test]
    fn log_sink_never_fails() {
        let sink = LogAlertSink;
        assert!(sink
            .alert(&AlertEvent::RegressionDetected {
                fingerprint: "fp-1".to_string(),
                from_score: 90,
                to_score: 60,
                requires_ack: true,
                timestamp: Utc::now(),
            })
            .is_ok());
    }
}
