// crates/trustflow-core/src/traits.rs

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::collaborators::{
    AnchorReceipt, BiasAnalysis, FairnessMetrics, OracleConsensusReport, ProofOutput,
    ProofPrivateInputs,
};
use crate::error::TrustflowError;
use crate::process::{ProcessId, ScoringProcess};
use crate::subject::{DecisionRecord, SubjectProfile};

/// Detects bias in a subject's decision history.
#[async_trait]
pub trait BiasAnalysisService: Send + Sync {
    async fn analyze(
        &self,
        subject_id: &str,
        history: &[DecisionRecord],
        context: &BTreeMap<String, String>,
    ) -> Result<BiasAnalysis, TrustflowError>;
}

/// Scores fairness given a bias analysis.
#[async_trait]
pub trait FairnessScorer: Send + Sync {
    async fn score(
        &self,
        subject_id: &str,
        analysis: &BiasAnalysis,
    ) -> Result<FairnessMetrics, TrustflowError>;
}

/// Anchors a payload digest on a ledger.
///
/// Fails with `TrustflowError::AnchorUnavailable` when the ledger cannot be reached.
#[async_trait]
pub trait BlockchainAnchorService: Send + Sync {
    async fn anchor(
        &self,
        subject_id: &str,
        payload: &serde_json::Value,
        network: &str,
    ) -> Result<AnchorReceipt, TrustflowError>;
}

/// Collects and aggregates oracle observations about a subject.
///
/// Fails with `TrustflowError::ConsensusUnavailable` when no consensus can be formed.
#[async_trait]
pub trait OracleConsensusService: Send + Sync {
    async fn consensus(
        &self,
        subject_id: &str,
        data_type: &str,
    ) -> Result<OracleConsensusReport, TrustflowError>;
}

/// Produces a zero-knowledge style proof for a statement.
///
/// Fails with `TrustflowError::ProofGenerationFailed`.
#[async_trait]
pub trait ProofService: Send + Sync {
    async fn prove(
        &self,
        statement: &str,
        private_inputs: &ProofPrivateInputs,
        public_inputs: &serde_json::Value,
    ) -> Result<ProofOutput, TrustflowError>;
}

/// Storage for scoring process records.
///
/// The registry is the only writer; implementations may be in-memory,
/// database-backed, or distributed.
#[async_trait]
pub trait ProcessStore: Send + Sync {
    /// Retrieve a process by id.
    async fn get(&self, id: &ProcessId) -> Result<Option<ScoringProcess>, TrustflowError>;

    /// Insert or overwrite a process record.
    async fn put(&self, process: &ScoringProcess) -> Result<(), TrustflowError>;

    /// Delete a process by id. Deleting a missing id is not an error.
    async fn delete(&self, id: &ProcessId) -> Result<(), TrustflowError>;

    /// List every stored process.
    async fn list(&self) -> Result<Vec<ScoringProcess>, TrustflowError>;
}

/// Source of subject profiles.
pub trait SubjectDirectory: Send + Sync {
    /// Look up the profile of a subject. Returns `None` for unknown subjects.
    fn lookup(&self, subject_id: &str) -> Option<SubjectProfile>;
}
