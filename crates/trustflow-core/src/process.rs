// crates/trustflow-core/src/process.rs
//
// ScoringProcess: one pipeline run for one subject.
//
// Valid transitions:
//   Pending -> InProgress -> Completed
//                   |
//                   v
//                 Failed
//
// Completed and Failed are terminal; records leave the registry only
// through the retention sweep.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::catalog::PipelineFlags;
use crate::collaborators::{AnchorReceipt, OracleSubmission, ProofOutput};
use crate::error::TrustflowError;
use crate::step::{StepId, StepResult, StepSpec};

/// Opaque, unique process identifier derived from subject and creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(String);

impl ProcessId {
    /// Derive a new id: `tsp_` + 32 hex chars of
    /// SHA-256(subject || creation nanos || UUIDv7).
    pub fn derive(subject_id: &str, created_at: &DateTime<Utc>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(subject_id.as_bytes());
        hasher.update(
            created_at
                .timestamp_nanos_opt()
                .unwrap_or_else(|| created_at.timestamp_micros())
                .to_le_bytes(),
        );
        hasher.update(Uuid::now_v7().as_bytes());
        let digest = hex::encode(hasher.finalize());
        ProcessId(format!("tsp_{}", &digest[..32]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProcessId {
    fn from(s: &str) -> Self {
        ProcessId(s.to_string())
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle states of a scoring process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ProcessStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStatus::Completed | ProcessStatus::Failed)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Pending => write!(f, "Pending"),
            ProcessStatus::InProgress => write!(f, "InProgress"),
            ProcessStatus::Completed => write!(f, "Completed"),
            ProcessStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// An anchor descriptor collected by step 7.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorRecord {
    #[serde(flatten)]
    pub receipt: AnchorReceipt,
    pub simulated: bool,
}

/// A proof collected by step 9.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub proof: ProofOutput,
    pub statement: String,
    pub proof_type: String,
    pub simulated: bool,
}

/// Run-scoped bookkeeping attached to a process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetadata {
    pub flags: PipelineFlags,
    /// Failed attempts per step.
    pub retry_counts: BTreeMap<StepId, u32>,
    pub anchors: Vec<AnchorRecord>,
    pub oracle_submissions: Vec<OracleSubmission>,
    pub proofs: Vec<ProofRecord>,
    /// Steps that fell back to a simulated result.
    pub degraded_steps: Vec<StepId>,
    pub last_error: Option<String>,
}

/// One pipeline run for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProcess {
    pub id: ProcessId,
    pub subject_id: String,
    /// Catalog snapshot taken at creation.
    pub steps: Vec<StepSpec>,
    pub status: ProcessStatus,
    pub current_step: Option<StepId>,
    /// Append-only step results keyed by step id.
    pub results: BTreeMap<StepId, StepResult>,
    pub metadata: ProcessMetadata,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub final_score: Option<u32>,
}

impl ScoringProcess {
    /// Create a `Pending` process over the given catalog.
    pub fn new(subject_id: &str, flags: PipelineFlags, steps: Vec<StepSpec>) -> Self {
        let now = Utc::now();
        Self {
            id: ProcessId::derive(subject_id, &now),
            subject_id: subject_id.to_string(),
            steps,
            status: ProcessStatus::Pending,
            current_step: None,
            results: BTreeMap::new(),
            metadata: ProcessMetadata {
                flags,
                ..Default::default()
            },
            started_at: now,
            completed_at: None,
            final_score: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Attempt a status transition.
    ///
    /// Returns an error if the transition is not valid.
    pub fn transition(&mut self, next: ProcessStatus) -> Result<(), TrustflowError> {
        let valid = matches!(
            (self.status, next),
            (ProcessStatus::Pending, ProcessStatus::InProgress)
                | (ProcessStatus::InProgress, ProcessStatus::Completed)
                | (ProcessStatus::InProgress, ProcessStatus::Failed)
        );

        if !valid {
            return Err(TrustflowError::InvalidState(format!(
                "Invalid process transition for {}: {} -> {}",
                self.id, self.status, next
            )));
        }

        self.status = next;
        Ok(())
    }

    /// Record an unrecoverable error and move to `Failed`.
    pub fn fail(
        &mut self,
        error: &TrustflowError,
        now: DateTime<Utc>,
    ) -> Result<(), TrustflowError> {
        self.transition(ProcessStatus::Failed)?;
        self.metadata.last_error = Some(error.to_string());
        self.current_step = None;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Insert a step result. Results are append-only.
    pub fn record_result(&mut self, result: StepResult) -> Result<(), TrustflowError> {
        if self.results.contains_key(&result.step_id) {
            return Err(TrustflowError::InvalidState(format!(
                "step {} already has a result in {}",
                result.step_id, self.id
            )));
        }
        self.results.insert(result.step_id, result);
        Ok(())
    }

    pub fn step(&self, step_id: StepId) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Dependencies of `step` that have not produced a result yet.
    pub fn missing_dependencies(&self, step: &StepSpec) -> Vec<StepId> {
        step.dependencies
            .iter()
            .copied()
            .filter(|d| !self.results.contains_key(d))
            .collect()
    }

    /// Wall-clock run time, if the process has finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StepCatalogBuilder;

    fn make_process() -> ScoringProcess {
        let flags = PipelineFlags::default();
        ScoringProcess::new("agent-42", flags, StepCatalogBuilder::new(flags).build())
    }

    #[test]
    fn test_process_ids_are_unique_and_prefixed() {
        let now = Utc::now();
        let a = ProcessId::derive("agent-42", &now);
        let b = ProcessId::derive("agent-42", &now);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("tsp_"));
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_valid_lifecycle() {
        let mut p = make_process();
        assert_eq!(p.status, ProcessStatus::Pending);
        p.transition(ProcessStatus::InProgress).unwrap();
        p.transition(ProcessStatus::Completed).unwrap();
        assert!(p.is_terminal());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut p = make_process();
        p.transition(ProcessStatus::InProgress).unwrap();
        p.fail(&TrustflowError::ConsensusUnavailable("no quorum".into()), Utc::now())
            .unwrap();
        assert_eq!(p.status, ProcessStatus::Failed);
        assert!(p.metadata.last_error.as_deref().unwrap().contains("no quorum"));
        assert!(p.transition(ProcessStatus::InProgress).is_err());
        assert!(p.transition(ProcessStatus::Completed).is_err());
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut p = make_process();
        assert!(p.transition(ProcessStatus::Completed).is_err());
    }

    #[test]
    fn test_results_are_append_only() {
        let mut p = make_process();
        p.record_result(StepResult::measured(1, serde_json::json!({ "technicalScore": 50.0 })))
            .unwrap();
        let again = StepResult::measured(1, serde_json::json!({ "technicalScore": 90.0 }));
        assert!(p.record_result(again).is_err());
        assert_eq!(p.results[&1].number("technicalScore"), Some(50.0));
    }
}
