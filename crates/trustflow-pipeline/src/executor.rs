// crates/trustflow-pipeline/src/executor.rs
//
// StepExecutor: dispatches one step to its handler under the per-step
// timeout.
//
// Handlers never touch `status` or `current_step`. Anything a step wants
// recorded in process metadata (anchors, oracle submissions, proofs) is
// returned as a `StepEffect` for the driver to merge.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::RngCore;
use serde_json::json;
use trustflow_core::{
    AnchorRecord, BiasAnalysisService, BlockchainAnchorService, Computation, FairnessScorer,
    OracleConsensusService, OracleSubmission, ProofPrivateInputs, ProofRecord, ProofService,
    ScoringProcess, StepResult, StepSpec, SubjectProfile, TrustflowError,
};

use crate::aggregator;
use crate::config::PipelineConfig;
use crate::scoring;

/// Statement kind passed to the proof service by step 9.
pub const TRUST_THRESHOLD_STATEMENT: &str = "trust_threshold";
/// Data type requested from the oracle network by step 8.
pub const TRUST_SCORE_DATA_TYPE: &str = "trust_score";
/// Proof type recorded for proofs produced by the proof service.
pub const ZK_PROOF_TYPE: &str = "zk-threshold";

/// The external services a pipeline run consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub bias: Arc<dyn BiasAnalysisService>,
    pub fairness: Arc<dyn FairnessScorer>,
    pub anchor: Arc<dyn BlockchainAnchorService>,
    pub oracle: Arc<dyn OracleConsensusService>,
    pub prover: Arc<dyn ProofService>,
}

/// Metadata a step asks the driver to record.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEffect {
    None,
    Anchor(AnchorRecord),
    OracleSubmissions(Vec<OracleSubmission>),
    Proof(ProofRecord),
}

/// A step result plus the metadata it produced.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub result: StepResult,
    pub effect: StepEffect,
}

impl StepOutcome {
    fn plain(result: StepResult) -> Self {
        Self {
            result,
            effect: StepEffect::None,
        }
    }
}

/// Runs single steps against the subject profile and the collaborators.
pub struct StepExecutor {
    collaborators: Collaborators,
    config: PipelineConfig,
}

impl StepExecutor {
    pub fn new(collaborators: Collaborators, config: PipelineConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one step, failing with `StepTimeout` if the handler does not
    /// finish within the configured per-step timeout.
    pub async fn execute(
        &self,
        process: &ScoringProcess,
        profile: &SubjectProfile,
        step: &StepSpec,
    ) -> Result<StepOutcome, TrustflowError> {
        if profile.subject_id != process.subject_id {
            return Err(TrustflowError::Validation(format!(
                "profile for {} supplied to process of subject {}",
                profile.subject_id, process.subject_id
            )));
        }

        let timeout = self.config.step_timeout();
        match tokio::time::timeout(timeout, self.dispatch(process, profile, step)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TrustflowError::StepTimeout {
                step_id: step.id,
                timeout_ms: self.config.step_timeout_ms,
            }),
        }
    }

    async fn dispatch(
        &self,
        process: &ScoringProcess,
        profile: &SubjectProfile,
        step: &StepSpec,
    ) -> Result<StepOutcome, TrustflowError> {
        let id = step.id;
        match step.computation {
            Computation::TechnicalAssessment => {
                local(id, &scoring::score_technical(&profile.technical))
            }
            Computation::EthicalEvaluation => self.ethical(profile).await,
            Computation::OperationalAnalysis => {
                local(id, &scoring::score_operational(&profile.operational))
            }
            Computation::TransparencyAudit => {
                local(id, &scoring::score_transparency(&profile.transparency))
            }
            Computation::SecurityAssessment => {
                local(id, &scoring::score_security(&profile.security))
            }
            Computation::ComplianceCheck => {
                local(id, &scoring::score_compliance(&profile.compliance))
            }
            Computation::BlockchainAnchoring => self.anchor(process).await,
            Computation::OracleConsensus => self.oracle_consensus(process).await,
            Computation::CryptographicVerification => self.verify(process).await,
        }
    }

    /// Step 2: bias analysis, fairness scoring, ethical formula.
    async fn ethical(&self, profile: &SubjectProfile) -> Result<StepOutcome, TrustflowError> {
        let analysis = self
            .collaborators
            .bias
            .analyze(&profile.subject_id, &profile.history, &profile.context)
            .await?;
        let fairness = self
            .collaborators
            .fairness
            .score(&profile.subject_id, &analysis)
            .await?;

        let ethical_score = scoring::ethical_score(&analysis, &fairness);
        let payload = json!({
            "ethicalScore": ethical_score,
            "biasDetected": analysis.detected,
            "biasTypes": analysis.types,
            "biasPenalty": analysis.weighted_penalty() * 5.0,
            "affectedMetrics": analysis.affected_metrics,
            "fairness": fairness,
            "recommendations": analysis.recommendations,
        });
        Ok(StepOutcome::plain(StepResult::measured(2, payload)))
    }

    /// Step 7: anchor a digest of the base results.
    async fn anchor(&self, process: &ScoringProcess) -> Result<StepOutcome, TrustflowError> {
        let payload = anchor_payload(process);
        let receipt = self
            .collaborators
            .anchor
            .anchor(&process.subject_id, &payload, &self.config.anchor_network)
            .await?;

        let result = StepResult::measured(
            7,
            json!({
                "anchored": true,
                "dataHash": receipt.data_hash,
                "blockNumber": receipt.block_number,
                "txHash": receipt.tx_hash,
                "network": receipt.network,
                "timestamp": receipt.timestamp,
            }),
        );
        Ok(StepOutcome {
            result,
            effect: StepEffect::Anchor(AnchorRecord {
                receipt,
                simulated: false,
            }),
        })
    }

    /// Step 8: oracle consensus on the subject's trust score.
    ///
    /// The quorum is a fraction of submissions: every submission counts once,
    /// whatever weight the service gave its oracle. The service's own
    /// confidence is recorded in the result but is not gated on.
    async fn oracle_consensus(
        &self,
        process: &ScoringProcess,
    ) -> Result<StepOutcome, TrustflowError> {
        let report = self
            .collaborators
            .oracle
            .consensus(&process.subject_id, TRUST_SCORE_DATA_TYPE)
            .await?;

        if report.submissions.is_empty() {
            return Err(TrustflowError::ConsensusUnavailable(format!(
                "no oracle submissions for {}",
                process.subject_id
            )));
        }

        let agreement = report.agreement(self.config.oracle_tolerance);
        if agreement < self.config.oracle_quorum {
            return Err(TrustflowError::ConsensusUnavailable(format!(
                "quorum not reached for {}: {:.2} of {} submissions agree, {:.2} required",
                process.subject_id,
                agreement,
                report.submissions.len(),
                self.config.oracle_quorum
            )));
        }

        let result = StepResult::measured(
            8,
            json!({
                "consensusScore": scoring::clamp_score(report.result.value),
                "confidence": report.result.confidence,
                "algorithm": report.result.algorithm,
                "agreement": agreement,
                "submissionCount": report.submissions.len(),
                "threshold": report.threshold,
            }),
        );
        Ok(StepOutcome {
            result,
            effect: StepEffect::OracleSubmissions(report.submissions),
        })
    }

    /// Step 9: prove that the provisional score meets the threshold.
    async fn verify(&self, process: &ScoringProcess) -> Result<StepOutcome, TrustflowError> {
        let provisional = aggregator::provisional_score(process);
        let threshold = self.config.proof_threshold;
        let private_inputs = ProofPrivateInputs {
            score: provisional,
            threshold,
            salt: random_salt(),
        };
        let public_inputs = json!({
            "subjectId": process.subject_id,
            "processId": process.id,
            "threshold": threshold,
        });

        let proof = self
            .collaborators
            .prover
            .prove(TRUST_THRESHOLD_STATEMENT, &private_inputs, &public_inputs)
            .await?;

        let statement = threshold_statement(threshold);
        let result = StepResult::measured(
            9,
            json!({
                "proofId": proof.proof_id,
                "statementKind": TRUST_THRESHOLD_STATEMENT,
                "statement": statement,
                "proofType": ZK_PROOF_TYPE,
                "isValid": proof.is_valid,
                "meetsThreshold": provisional >= threshold as f64,
                "publicSignals": proof.public_signals,
            }),
        );
        Ok(StepOutcome {
            result,
            effect: StepEffect::Proof(ProofRecord {
                proof,
                statement,
                proof_type: ZK_PROOF_TYPE.to_string(),
                simulated: false,
            }),
        })
    }
}

fn local<T: serde::Serialize>(step_id: u8, detail: &T) -> Result<StepOutcome, TrustflowError> {
    let payload = serde_json::to_value(detail)?;
    Ok(StepOutcome::plain(StepResult::measured(step_id, payload)))
}

/// Human-readable form of the threshold statement.
pub fn threshold_statement(threshold: u32) -> String {
    format!("trust_score >= {}", threshold)
}

/// Summary handed to the anchoring service: primary scores of the steps
/// completed so far, keyed by step id.
pub fn anchor_payload(process: &ScoringProcess) -> serde_json::Value {
    let scores: BTreeMap<String, f64> = process
        .steps
        .iter()
        .filter_map(|step| {
            let result = process.results.get(&step.id)?;
            aggregator::primary_score(step.computation, result)
                .map(|score| (step.id.to_string(), score))
        })
        .collect();
    json!({
        "subjectId": process.subject_id,
        "processId": process.id,
        "scores": scores,
        "provisionalScore": aggregator::provisional_score(process),
    })
}

fn random_salt() -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}
