// crates/trustflow-core/src/step.rs
//
// Step descriptors and step results for the nine-step scoring process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a pipeline step (1..=9).
pub type StepId = u8;

/// The computation performed by a step. Each variant maps to exactly one step id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Computation {
    TechnicalAssessment,
    EthicalEvaluation,
    OperationalAnalysis,
    TransparencyAudit,
    SecurityAssessment,
    ComplianceCheck,
    BlockchainAnchoring,
    OracleConsensus,
    CryptographicVerification,
}

impl Computation {
    /// All computations in step-id order.
    pub const ALL: [Computation; 9] = [
        Computation::TechnicalAssessment,
        Computation::EthicalEvaluation,
        Computation::OperationalAnalysis,
        Computation::TransparencyAudit,
        Computation::SecurityAssessment,
        Computation::ComplianceCheck,
        Computation::BlockchainAnchoring,
        Computation::OracleConsensus,
        Computation::CryptographicVerification,
    ];

    pub fn step_id(&self) -> StepId {
        match self {
            Computation::TechnicalAssessment => 1,
            Computation::EthicalEvaluation => 2,
            Computation::OperationalAnalysis => 3,
            Computation::TransparencyAudit => 4,
            Computation::SecurityAssessment => 5,
            Computation::ComplianceCheck => 6,
            Computation::BlockchainAnchoring => 7,
            Computation::OracleConsensus => 8,
            Computation::CryptographicVerification => 9,
        }
    }

    /// Look up the computation for a step id.
    pub fn from_step_id(id: StepId) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.step_id() == id)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Computation::TechnicalAssessment => "Technical Assessment",
            Computation::EthicalEvaluation => "Ethical Evaluation",
            Computation::OperationalAnalysis => "Operational Analysis",
            Computation::TransparencyAudit => "Transparency Audit",
            Computation::SecurityAssessment => "Security Assessment",
            Computation::ComplianceCheck => "Compliance Check",
            Computation::BlockchainAnchoring => "Blockchain Anchoring",
            Computation::OracleConsensus => "Oracle Consensus",
            Computation::CryptographicVerification => "Cryptographic Verification",
        }
    }

    /// Whether exhausting the retry budget degrades to a simulated result
    /// instead of failing the whole process.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            Computation::EthicalEvaluation
                | Computation::BlockchainAnchoring
                | Computation::CryptographicVerification
        )
    }

    /// Payload field holding the primary score, or `None` for steps that
    /// contribute a fixed bonus instead of a measured value.
    pub fn score_field(&self) -> Option<&'static str> {
        match self {
            Computation::TechnicalAssessment => Some("technicalScore"),
            Computation::EthicalEvaluation => Some("ethicalScore"),
            Computation::OperationalAnalysis => Some("operationalScore"),
            Computation::TransparencyAudit => Some("transparencyScore"),
            Computation::SecurityAssessment => Some("securityScore"),
            Computation::ComplianceCheck => Some("complianceScore"),
            Computation::OracleConsensus => Some("consensusScore"),
            Computation::BlockchainAnchoring | Computation::CryptographicVerification => None,
        }
    }
}

/// Static description of one step in a process's catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub id: StepId,
    pub name: String,
    /// Contribution weight in [0, 1].
    pub weight: f64,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    /// Ids of steps that must have produced a result first. Always lower than `id`.
    pub dependencies: Vec<StepId>,
    pub computation: Computation,
}

/// Whether a result came from a genuine computation or a local stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultOrigin {
    Measured,
    Simulated,
}

impl ResultOrigin {
    pub fn is_simulated(&self) -> bool {
        matches!(self, ResultOrigin::Simulated)
    }
}

/// Output of one completed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub origin: ResultOrigin,
    /// Structured step output. Carries the primary score under the
    /// field named by [`Computation::score_field`].
    pub payload: serde_json::Value,
    /// Number of attempts made, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl StepResult {
    pub fn measured(step_id: StepId, payload: serde_json::Value) -> Self {
        Self::new(step_id, ResultOrigin::Measured, payload)
    }

    pub fn simulated(step_id: StepId, payload: serde_json::Value) -> Self {
        Self::new(step_id, ResultOrigin::Simulated, payload)
    }

    fn new(step_id: StepId, origin: ResultOrigin, payload: serde_json::Value) -> Self {
        Self {
            step_id,
            origin,
            payload,
            attempts: 1,
            duration_ms: 0,
            completed_at: Utc::now(),
        }
    }

    /// Read a numeric payload field.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.payload.get(field).and_then(|v| v.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_ids_round_trip_through_lookup() {
        for id in 1..=9u8 {
            let c = Computation::from_step_id(id).unwrap();
            assert_eq!(c.step_id(), id);
        }
        assert!(Computation::from_step_id(0).is_none());
        assert!(Computation::from_step_id(10).is_none());
    }

    #[test]
    fn test_only_ethical_anchor_and_proof_fall_back() {
        let fallback: Vec<StepId> = Computation::ALL
            .iter()
            .filter(|c| c.allows_fallback())
            .map(|c| c.step_id())
            .collect();
        assert_eq!(fallback, vec![2, 7, 9]);
    }

    #[test]
    fn test_bonus_steps_have_no_score_field() {
        assert!(Computation::BlockchainAnchoring.score_field().is_none());
        assert!(Computation::CryptographicVerification.score_field().is_none());
        assert_eq!(Computation::OracleConsensus.score_field(), Some("consensusScore"));
    }

    #[test]
    fn test_result_number_reads_payload() {
        let r = StepResult::measured(1, serde_json::json!({ "technicalScore": 81.5 }));
        assert_eq!(r.number("technicalScore"), Some(81.5));
        assert_eq!(r.number("missing"), None);
        assert!(!r.origin.is_simulated());
    }
}
