// crates/trustflow-pipeline/src/simulation.rs
//
// Local stand-ins for steps 2, 7, and 9 when their collaborator stays
// unavailable after the retry budget is spent.
//
// Simulated results are structurally identical to measured ones but carry
// `ResultOrigin::Simulated` and a `simulated: true` payload flag, so callers
// can always tell them apart.

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use trustflow_core::{
    AnchorReceipt, AnchorRecord, Computation, ProofOutput, ProofRecord, ScoringProcess,
    StepResult, StepSpec,
};

use crate::aggregator;
use crate::config::PipelineConfig;
use crate::executor::{anchor_payload, threshold_statement, StepEffect, StepOutcome};

/// Ethical score assumed when bias analysis is unavailable.
pub const SIMULATED_ETHICAL_SCORE: f64 = 70.0;
/// Network name recorded on simulated anchors.
pub const SIMULATED_NETWORK: &str = "simulated";
/// Proof type recorded on simulated proofs.
pub const SIMULATED_PROOF_TYPE: &str = "simulated";

/// Build the fallback outcome for a step, or `None` if the step has no fallback.
pub fn simulate(
    step: &StepSpec,
    process: &ScoringProcess,
    config: &PipelineConfig,
    reason: &str,
) -> Option<StepOutcome> {
    if !step.computation.allows_fallback() {
        return None;
    }
    let outcome = match step.computation {
        Computation::EthicalEvaluation => simulate_ethical(reason),
        Computation::BlockchainAnchoring => simulate_anchor(process, reason),
        Computation::CryptographicVerification => simulate_proof(process, config, reason),
        _ => return None,
    };
    Some(outcome)
}

fn simulate_ethical(reason: &str) -> StepOutcome {
    StepOutcome {
        result: StepResult::simulated(
            2,
            json!({
                "ethicalScore": SIMULATED_ETHICAL_SCORE,
                "biasDetected": false,
                "biasTypes": [],
                "recommendations": ["Re-run bias analysis once the service is reachable"],
                "simulated": true,
                "reason": reason,
            }),
        ),
        effect: StepEffect::None,
    }
}

fn simulate_anchor(process: &ScoringProcess, reason: &str) -> StepOutcome {
    let payload = anchor_payload(process);
    let data_hash = sha256_hex(payload.to_string().as_bytes());
    let receipt = AnchorReceipt {
        data_hash: data_hash.clone(),
        block_number: 0,
        tx_hash: format!("sim_{}", data_hash),
        network: SIMULATED_NETWORK.to_string(),
        timestamp: Utc::now(),
    };

    let result = StepResult::simulated(
        7,
        json!({
            "anchored": false,
            "dataHash": receipt.data_hash,
            "blockNumber": receipt.block_number,
            "txHash": receipt.tx_hash,
            "network": receipt.network,
            "timestamp": receipt.timestamp,
            "simulated": true,
            "reason": reason,
        }),
    );
    StepOutcome {
        result,
        effect: StepEffect::Anchor(AnchorRecord {
            receipt,
            simulated: true,
        }),
    }
}

fn simulate_proof(process: &ScoringProcess, config: &PipelineConfig, reason: &str) -> StepOutcome {
    let provisional = aggregator::provisional_score(process);
    let threshold = config.proof_threshold;
    let meets = provisional >= threshold as f64;
    let statement = threshold_statement(threshold);
    let seed = format!(
        "{}|{}|{}",
        process.id,
        statement,
        Utc::now().timestamp_micros()
    );
    let proof_id = format!("sim-{}", &sha256_hex(seed.as_bytes())[..24]);
    let proof = ProofOutput {
        proof_id: proof_id.clone(),
        public_signals: vec![threshold.to_string(), meets.to_string()],
        is_valid: meets,
    };

    let result = StepResult::simulated(
        9,
        json!({
            "proofId": proof_id,
            "statementKind": crate::executor::TRUST_THRESHOLD_STATEMENT,
            "statement": statement,
            "proofType": SIMULATED_PROOF_TYPE,
            "isValid": meets,
            "meetsThreshold": meets,
            "publicSignals": proof.public_signals,
            "simulated": true,
            "reason": reason,
        }),
    );
    StepOutcome {
        result,
        effect: StepEffect::Proof(ProofRecord {
            proof,
            statement,
            proof_type: SIMULATED_PROOF_TYPE.to_string(),
            simulated: true,
        }),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
