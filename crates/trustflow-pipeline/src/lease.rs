// crates/trustflow-pipeline/src/lease.rs
//
// Per-subject run leases: at most one non-terminal process per subject.
//
// A lease is taken by `initiate` before the process is stored and is held
// by the driver task until after the terminal write. Dropping the lease
// releases the subject.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use trustflow_core::{ProcessId, TrustflowError};

/// The set of subjects with a running process.
#[derive(Debug, Clone, Default)]
pub struct SubjectLeases {
    held: Arc<Mutex<HashMap<String, ProcessId>>>,
}

impl SubjectLeases {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProcessId>> {
        // A panic while holding the lock cannot leave the map inconsistent.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the lease for `subject_id`, failing with `AlreadyRunning` if held.
    pub fn acquire(
        &self,
        subject_id: &str,
        process_id: &ProcessId,
    ) -> Result<SubjectLease, TrustflowError> {
        let mut held = self.lock();
        if let Some(existing) = held.get(subject_id) {
            return Err(TrustflowError::AlreadyRunning {
                subject_id: subject_id.to_string(),
                process_id: existing.to_string(),
            });
        }
        held.insert(subject_id.to_string(), process_id.clone());
        Ok(SubjectLease {
            leases: self.clone(),
            subject_id: subject_id.to_string(),
            process_id: process_id.clone(),
        })
    }

    /// Process currently holding the lease for `subject_id`.
    pub fn holder(&self, subject_id: &str) -> Option<ProcessId> {
        self.lock().get(subject_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}

/// RAII guard for one subject's lease.
#[derive(Debug)]
pub struct SubjectLease {
    leases: SubjectLeases,
    subject_id: String,
    process_id: ProcessId,
}

impl SubjectLease {
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }
}

impl Drop for SubjectLease {
    fn drop(&mut self) {
        let mut held = self.leases.lock();
        if held.get(&self.subject_id) == Some(&self.process_id) {
            held.remove(&self.subject_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let leases = SubjectLeases::new();
        let first = leases.acquire("agent-42", &ProcessId::from("tsp_a")).unwrap();
        let err = leases
            .acquire("agent-42", &ProcessId::from("tsp_b"))
            .unwrap_err();
        assert!(matches!(
            err,
            TrustflowError::AlreadyRunning { ref process_id, .. } if process_id == "tsp_a"
        ));

        drop(first);
        assert!(leases.holder("agent-42").is_none());
        assert!(leases.acquire("agent-42", &ProcessId::from("tsp_b")).is_ok());
    }

    #[test]
    fn test_different_subjects_do_not_contend() {
        let leases = SubjectLeases::new();
        let _a = leases.acquire("agent-1", &ProcessId::from("tsp_1")).unwrap();
        let _b = leases.acquire("agent-2", &ProcessId::from("tsp_2")).unwrap();
        assert_eq!(leases.active_count(), 2);
    }
}
