// crates/trustflow-core/src/error.rs

use thiserror::Error;

/// Pipeline-wide error types for Trustflow.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrustflowError {
    /// Malformed input (subject id, flags, configuration, step payload).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A scoring process for this subject is already in progress.
    #[error("A scoring process is already running for subject {subject_id} ({process_id})")]
    AlreadyRunning {
        subject_id: String,
        process_id: String,
    },

    /// A step handler did not finish within the per-step timeout.
    #[error("Step {step_id} timed out after {timeout_ms} ms")]
    StepTimeout { step_id: u8, timeout_ms: u64 },

    /// An external collaborator could not be reached or refused the call.
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// The oracle network did not reach quorum.
    #[error("Consensus unavailable: {0}")]
    ConsensusUnavailable(String),

    /// The anchoring service could not anchor the payload.
    #[error("Anchor unavailable: {0}")]
    AnchorUnavailable(String),

    /// The proof service could not produce a proof.
    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(String),

    /// A step exhausted its retry budget and has no fallback.
    #[error("Step {step_id} unrecoverable after {attempts} attempts: {reason}")]
    Unrecoverable {
        step_id: u8,
        attempts: u32,
        reason: String,
    },

    /// Invalid state transition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Process store error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl TrustflowError {
    /// Whether this failure originated from an external collaborator and
    /// may succeed on another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrustflowError::StepTimeout { .. }
                | TrustflowError::CollaboratorUnavailable(_)
                | TrustflowError::ConsensusUnavailable(_)
                | TrustflowError::AnchorUnavailable(_)
                | TrustflowError::ProofGenerationFailed(_)
        )
    }
}

impl From<serde_json::Error> for TrustflowError {
    fn from(e: serde_json::Error) -> Self {
        TrustflowError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_failures_are_retryable() {
        assert!(TrustflowError::StepTimeout { step_id: 2, timeout_ms: 10 }.is_retryable());
        assert!(TrustflowError::CollaboratorUnavailable("bias".into()).is_retryable());
        assert!(TrustflowError::ConsensusUnavailable("quorum".into()).is_retryable());
        assert!(TrustflowError::AnchorUnavailable("rpc down".into()).is_retryable());
        assert!(TrustflowError::ProofGenerationFailed("oom".into()).is_retryable());
    }

    #[test]
    fn test_validation_is_fatal() {
        assert!(!TrustflowError::Validation("bad".into()).is_retryable());
        assert!(!TrustflowError::Unrecoverable {
            step_id: 8,
            attempts: 3,
            reason: "x".into()
        }
        .is_retryable());
    }
}
