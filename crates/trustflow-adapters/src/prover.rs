// crates/trustflow-adapters/src/prover.rs
//
// HashCommitmentProver: a stand-in for a zero-knowledge threshold prover.
//
// The "proof" is a SHA-256 commitment to (score, salt) bound to the public
// inputs. It reveals neither the score nor the salt, and `is_valid` reports
// whether the committed score meets the threshold. It offers none of the
// soundness guarantees of a real proving system.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use trustflow_core::{ProofOutput, ProofPrivateInputs, ProofService, TrustflowError};

/// Statement kinds this prover understands.
pub const SUPPORTED_STATEMENTS: &[&str] = &["trust_threshold"];

#[derive(Debug, Clone, Default)]
pub struct HashCommitmentProver;

impl HashCommitmentProver {
    pub fn new() -> Self {
        Self
    }

    /// Commitment to the private score and salt.
    pub fn commitment(inputs: &ProofPrivateInputs) -> String {
        let mut hasher = Sha256::new();
        hasher.update(inputs.score.to_le_bytes());
        hasher.update(inputs.salt.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check a proof's public signals against the private inputs that
    /// produced it.
    pub fn verify(proof: &ProofOutput, inputs: &ProofPrivateInputs) -> bool {
        let meets = inputs.score >= inputs.threshold as f64;
        proof.public_signals.len() == 3
            && proof.public_signals[0] == Self::commitment(inputs)
            && proof.public_signals[1] == inputs.threshold.to_string()
            && proof.public_signals[2] == if meets { "1" } else { "0" }
            && proof.is_valid == meets
    }
}

#[async_trait]
impl ProofService for HashCommitmentProver {
    async fn prove(
        &self,
        statement: &str,
        private_inputs: &ProofPrivateInputs,
        public_inputs: &serde_json::Value,
    ) -> Result<ProofOutput, TrustflowError> {
        if !SUPPORTED_STATEMENTS.contains(&statement) {
            return Err(TrustflowError::ProofGenerationFailed(format!(
                "unsupported statement {}",
                statement
            )));
        }
        if private_inputs.salt.is_empty() {
            return Err(TrustflowError::ProofGenerationFailed(
                "empty salt".to_string(),
            ));
        }

        let commitment = Self::commitment(private_inputs);
        let meets = private_inputs.score >= private_inputs.threshold as f64;

        let mut hasher = Sha256::new();
        hasher.update(statement.as_bytes());
        hasher.update(commitment.as_bytes());
        hasher.update(serde_json::to_vec(public_inputs)?);
        let digest = hex::encode(hasher.finalize());

        Ok(ProofOutput {
            proof_id: format!("proof_{}", &digest[..32]),
            public_signals: vec![
                commitment,
                private_inputs.threshold.to_string(),
                if meets { "1" } else { "0" }.to_string(),
            ],
            is_valid: meets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(score: f64) -> ProofPrivateInputs {
        ProofPrivateInputs {
            score,
            threshold: 70,
            salt: "abcd".to_string(),
        }
    }

    #[tokio::test]
    async fn test_proof_above_threshold() {
        let prover = HashCommitmentProver::new();
        let private = inputs(82.5);
        let proof = prover
            .prove("trust_threshold", &private, &json!({"subjectId": "a"}))
            .await
            .unwrap();

        assert!(proof.is_valid);
        assert!(proof.proof_id.starts_with("proof_"));
        assert_eq!(proof.public_signals[1], "70");
        assert!(HashCommitmentProver::verify(&proof, &private));
        assert!(!HashCommitmentProver::verify(&proof, &inputs(60.0)));
    }

    #[tokio::test]
    async fn test_proof_below_threshold_is_not_valid() {
        let prover = HashCommitmentProver::new();
        let private = inputs(40.0);
        let proof = prover.prove("trust_threshold", &private, &json!({})).await.unwrap();
        assert!(!proof.is_valid);
        assert_eq!(proof.public_signals[2], "0");
        assert!(HashCommitmentProver::verify(&proof, &private));
    }

    #[tokio::test]
    async fn test_unknown_statement_fails() {
        let prover = HashCommitmentProver::new();
        let err = prover.prove("membership", &inputs(90.0), &json!({})).await.unwrap_err();
        assert!(matches!(err, TrustflowError::ProofGenerationFailed(_)));
    }

    #[test]
    fn test_commitment_hides_score_behind_salt() {
        let a = HashCommitmentProver::commitment(&inputs(80.0));
        let mut salted = inputs(80.0);
        salted.salt = "other".to_string();
        assert_ne!(a, HashCommitmentProver::commitment(&salted));
    }
}
