// crates/trustflow-core/src/collaborators.rs
//
// Data exchanged with the external collaborators: bias analysis, fairness
// scoring, blockchain anchoring, oracle consensus, and proof generation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a detected bias type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Penalty multiplier used by the ethical score.
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Low => 1.0,
            Severity::Medium => 2.0,
            Severity::High => 3.0,
        }
    }
}

/// Output of `BiasAnalysisService::analyze`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasAnalysis {
    pub detected: bool,
    pub types: Vec<String>,
    /// Confidence in [0, 1] per bias type.
    pub confidence_per_type: BTreeMap<String, f64>,
    pub severity_per_type: BTreeMap<String, Severity>,
    pub affected_metrics: Vec<String>,
    pub recommendations: Vec<String>,
}

impl BiasAnalysis {
    /// Σ confidence × severity weight over every detected type.
    ///
    /// Types without a recorded severity count as low.
    pub fn weighted_penalty(&self) -> f64 {
        self.types
            .iter()
            .map(|t| {
                let confidence = self.confidence_per_type.get(t).copied().unwrap_or(0.0);
                let severity = self.severity_per_type.get(t).copied().unwrap_or(Severity::Low);
                confidence.clamp(0.0, 1.0) * severity.weight()
            })
            .sum()
    }
}

/// Output of `FairnessScorer::score`. All values in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessMetrics {
    pub demographic_parity: f64,
    pub equalized_odds: f64,
    pub calibration: f64,
    pub individual_fairness: f64,
    pub group_fairness: f64,
    pub overall: f64,
}

/// Anchor descriptor returned by `BlockchainAnchorService::anchor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorReceipt {
    pub data_hash: String,
    pub block_number: u64,
    pub tx_hash: String,
    pub network: String,
    pub timestamp: DateTime<Utc>,
}

/// One oracle's signed observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleSubmission {
    pub oracle_id: String,
    pub value: f64,
    pub signature: String,
}

/// Aggregated oracle value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusValue {
    pub value: f64,
    pub confidence: f64,
    pub algorithm: String,
}

/// Output of `OracleConsensusService::consensus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleConsensusReport {
    pub submissions: Vec<OracleSubmission>,
    pub result: ConsensusValue,
    pub threshold: f64,
}

impl OracleConsensusReport {
    /// Fraction of submissions within `tolerance` of the consensus value.
    pub fn agreement(&self, tolerance: f64) -> f64 {
        if self.submissions.is_empty() {
            return 0.0;
        }
        let agreeing = self
            .submissions
            .iter()
            .filter(|s| (s.value - self.result.value).abs() <= tolerance)
            .count();
        agreeing as f64 / self.submissions.len() as f64
    }
}

/// Private inputs for a threshold proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPrivateInputs {
    pub score: f64,
    pub threshold: u32,
    pub salt: String,
}

/// Output of `ProofService::prove`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOutput {
    pub proof_id: String,
    pub public_signals: Vec<String>,
    pub is_valid: bool,
}
