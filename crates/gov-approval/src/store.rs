// store.rs — File-backed approval store with per-id serialization.
//
// One JSON record per execution id: `<dir>/<execution_id>.json`. Records
// are created once, transitioned through the state methods, and never
// deleted.
//
// Exactly one writer may hold a given execution id at a time. Transitions
// take a per-id mutex before the read-modify-write, so two concurrent
// rejects on the same id resolve to exactly one success and one Conflict,
// while operations on distinct ids proceed in parallel.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use gov_plan::Plan;

use crate::error::ApprovalError;
use crate::prestate::PrestateSource;
use crate::state::{ApprovalState, ApprovalStatus};

/// Persistent store for approval records.
pub struct ApprovalStore {
    dir: PathBuf,
    /// Per-execution-id locks. The outer mutex only guards map access;
    /// the inner ones serialize transitions on one id.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ApprovalStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, ApprovalError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| ApprovalError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Create an awaiting-approval record for a plan.
    ///
    /// The affected steps are the approval-scoped and write steps; a
    /// prestate snapshot is captured for each *before* the record is
    /// persisted. Creating over an existing id is an error.
    pub fn create(
        &self,
        execution_id: &str,
        plan: &Plan,
        prestate_source: &dyn PrestateSource,
    ) -> Result<ApprovalState, ApprovalError> {
        let _guard = self.id_lock(execution_id);
        let _held = _guard.lock().unwrap_or_else(|e| e.into_inner());

        if self.record_file(execution_id).exists() {
            return Err(ApprovalError::AlreadyExists {
                execution_id: execution_id.to_string(),
            });
        }

        let mut pending_step_ids = Vec::new();
        let mut prestates = BTreeMap::new();
        for step in plan
            .steps
            .iter()
            .filter(|s| s.approval_scoped || !s.read_only)
        {
            let snapshot = prestate_source.capture(&step.target)?;
            pending_step_ids.push(step.step_id.clone());
            prestates.insert(step.step_id.clone(), snapshot);
        }

        let state = ApprovalState::new(
            execution_id,
            plan.plan_hash(),
            pending_step_ids,
            prestates,
        );
        self.save(&state)?;
        info!(
            execution_id,
            steps = state.pending_step_ids.len(),
            "approval requested"
        );
        Ok(state)
    }

    /// Load a record by execution id.
    pub fn get(&self, execution_id: &str) -> Result<ApprovalState, ApprovalError> {
        let path = self.record_file(execution_id);
        if !path.exists() {
            return Err(ApprovalError::NotFound {
                execution_id: execution_id.to_string(),
            });
        }
        let json = fs::read_to_string(&path).map_err(|source| ApprovalError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// All records, newest first, optionally filtered by status.
    pub fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<ApprovalState>, ApprovalError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| ApprovalError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ApprovalError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| ApprovalError::Io {
                    path: path.clone(),
                    source,
                })?;
                if let Ok(record) = serde_json::from_str::<ApprovalState>(&json) {
                    if status.is_none() || status == Some(record.status) {
                        records.push(record);
                    }
                }
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Approve a record after checking prestate staleness.
    ///
    /// Every recorded prestate is recaptured through `prestate_source`; a
    /// fingerprint mismatch means the resource changed between proposal
    /// and approval, and the approval is refused.
    pub fn approve(
        &self,
        execution_id: &str,
        approved_by: &str,
        prestate_source: &dyn PrestateSource,
    ) -> Result<ApprovalState, ApprovalError> {
        let lock = self.id_lock(execution_id);
        let _held = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut state = self.get(execution_id)?;
        // Staleness gate before the transition: an already-resolved record
        // still fails with Conflict first, inside approve().
        if state.status == ApprovalStatus::AwaitingApproval {
            for (step_id, recorded) in &state.prestates {
                let current = prestate_source.capture(&recorded.artifact_ref)?;
                if current.fingerprint != recorded.fingerprint {
                    return Err(ApprovalError::StalePrestate {
                        step_id: step_id.clone(),
                    });
                }
            }
        }
        state.approve(approved_by)?;
        self.save(&state)?;
        info!(execution_id, approved_by, "approval granted, handing off");
        Ok(state)
    }

    /// Reject a record with a reason.
    pub fn reject(
        &self,
        execution_id: &str,
        reason: &str,
    ) -> Result<ApprovalState, ApprovalError> {
        let lock = self.id_lock(execution_id);
        let _held = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut state = self.get(execution_id)?;
        state.reject(reason)?;
        self.save(&state)?;
        info!(execution_id, reason, "approval rejected");
        Ok(state)
    }

    /// Stamp the terminal rollback marker on an approved record.
    pub fn rollback(&self, execution_id: &str) -> Result<ApprovalState, ApprovalError> {
        let lock = self.id_lock(execution_id);
        let _held = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut state = self.get(execution_id)?;
        state.mark_rolled_back()?;
        self.save(&state)?;
        debug!(execution_id, "rollback recorded");
        Ok(state)
    }

    fn id_lock(&self, execution_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            locks
                .entry(execution_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    fn save(&self, state: &ApprovalState) -> Result<(), ApprovalError> {
        let path = self.record_file(&state.execution_id);
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&path, json).map_err(|source| ApprovalError::Io { path, source })?;
        Ok(())
    }

    fn record_file(&self, execution_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", execution_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prestate::FilePrestateSource;
    use gov_plan::parse_command;
    use tempfile::tempdir;

    fn write_plan() -> Plan {
        parse_command("read fs://workspace/a.txt; write fs://workspace/b.txt").unwrap()
    }

    #[test]
    fn create_captures_prestates_for_write_steps_only() {
        let dir = tempdir().unwrap();
        let store = ApprovalStore::new(dir.path().join("approvals")).unwrap();
        let source = FilePrestateSource::new(dir.path().join("ws"));

        let state = store.create("exec-1", &write_plan(), &source).unwrap();
        assert_eq!(state.status, ApprovalStatus::AwaitingApproval);
        assert_eq!(state.pending_step_ids, vec!["step-2".to_string()]);
        assert_eq!(state.prestates.len(), 1);
        assert!(state.prestates.contains_key("step-2"));
    }

    #[test]
    fn duplicate_create_is_refused() {
        let dir = tempdir().unwrap();
        let store = ApprovalStore::new(dir.path().join("approvals")).unwrap();
        let source = FilePrestateSource::new(dir.path().join("ws"));

        store.create("exec-1", &write_plan(), &source).unwrap();
        assert!(matches!(
            store.create("exec-1", &write_plan(), &source),
            Err(ApprovalError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn approve_happy_path_hands_off() {
        let dir = tempdir().unwrap();
        let store = ApprovalStore::new(dir.path().join("approvals")).unwrap();
        let source = FilePrestateSource::new(dir.path().join("ws"));

        store.create("exec-1", &write_plan(), &source).unwrap();
        let state = store.approve("exec-1", "reviewer", &source).unwrap();
        assert_eq!(state.status, ApprovalStatus::Approved);
        assert_eq!(state.approved_by.as_deref(), Some("reviewer"));
    }

    #[test]
    fn stale_prestate_blocks_approval() {
        let dir = tempdir().unwrap();
        let ws = dir.path().join("ws");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("b.txt"), b"original").unwrap();

        let store = ApprovalStore::new(dir.path().join("approvals")).unwrap();
        let source = FilePrestateSource::new(&ws);
        store.create("exec-1", &write_plan(), &source).unwrap();

        // The resource changes between proposal and approval.
        fs::write(ws.join("b.txt"), b"someone else wrote this").unwrap();

        match store.approve("exec-1", "reviewer", &source) {
            Err(ApprovalError::StalePrestate { step_id }) => assert_eq!(step_id, "step-2"),
            other => panic!("expected StalePrestate, got {:?}", other),
        }
        // The record is still awaiting — a stale approval changes nothing.
        assert_eq!(
            store.get("exec-1").unwrap().status,
            ApprovalStatus::AwaitingApproval
        );
    }

    #[test]
    fn reject_then_reject_conflicts() {
        let dir = tempdir().unwrap();
        let store = ApprovalStore::new(dir.path().join("approvals")).unwrap();
        let source = FilePrestateSource::new(dir.path().join("ws"));

        store.create("exec-1", &write_plan(), &source).unwrap();
        store.reject("exec-1", "not today").unwrap();
        assert!(matches!(
            store.reject("exec-1", "again"),
            Err(ApprovalError::Conflict { .. })
        ));
    }

    #[test]
    fn concurrent_rejects_resolve_to_one_success_one_conflict() {
        let dir = tempdir().unwrap();
        let store =
            Arc::new(ApprovalStore::new(dir.path().join("approvals")).unwrap());
        let source = FilePrestateSource::new(dir.path().join("ws"));
        store.create("exec-1", &write_plan(), &source).unwrap();

        let mut handles = Vec::new();
        for i in 0..2 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store.reject("exec-1", &format!("race-{}", i)).is_ok()
            }));
        }
        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1, "exactly one reject must win");

        let record = store.get("exec-1").unwrap();
        assert_eq!(record.status, ApprovalStatus::Rejected);
        assert!(record
            .rejection_reason
            .as_deref()
            .unwrap()
            .starts_with("race-"));
    }

    #[test]
    fn rollback_marks_approved_record() {
        let dir = tempdir().unwrap();
        let store = ApprovalStore::new(dir.path().join("approvals")).unwrap();
        let source = FilePrestateSource::new(dir.path().join("ws"));

        store.create("exec-1", &write_plan(), &source).unwrap();
        store.approve("exec-1", "reviewer", &source).unwrap();
        let state = store.rollback("exec-1").unwrap();
        assert!(state.rolled_back_at.is_some());
        assert_eq!(state.status, ApprovalStatus::Approved);
    }

    #[test]
    fn list_filters_by_status() {
        let dir = tempdir().unwrap();
        let store = ApprovalStore::new(dir.path().join("approvals")).unwrap();
        let source = FilePrestateSource::new(dir.path().join("ws"));

        store.create("exec-1", &write_plan(), &source).unwrap();
        store.create("exec-2", &write_plan(), &source).unwrap();
        store.reject("exec-2", "nope").unwrap();

        let awaiting = store.list(Some(ApprovalStatus::AwaitingApproval)).unwrap();
        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0].execution_id, "exec-1");
        assert_eq!(store.list(None).unwrap().len(), 2);
    }

    #[test]
    fn approving_missing_record_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ApprovalStore::new(dir.path().join("approvals")).unwrap();
        let source = FilePrestateSource::new(dir.path().join("ws"));
        assert!(matches!(
            store.approve("exec-none", "reviewer", &source),
            Err(ApprovalError::NotFound { .. })
        ));
    }
}
