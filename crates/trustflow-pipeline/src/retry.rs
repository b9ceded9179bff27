// crates/trustflow-pipeline/src/retry.rs
//
// RetryController: bounded retry with linear backoff around StepExecutor,
// plus the degradation policy applied once the budget is spent.
//
// Only collaborator-originated failures are retried. Validation errors are
// fatal on the first attempt. After the last attempt, steps 2, 7, and 9
// fall back to a simulated result; every other step becomes Unrecoverable.

use std::time::Instant;

use trustflow_core::{ScoringProcess, StepSpec, SubjectProfile, TrustflowError};

use crate::config::PipelineConfig;
use crate::executor::{StepExecutor, StepOutcome};
use crate::simulation;

/// Result of running a step through the retry controller.
#[derive(Debug, Clone)]
pub struct RetryReport {
    pub outcome: StepOutcome,
    /// Failed attempts before success or fallback.
    pub failures: u32,
    /// Set when the outcome is a simulated fallback; holds the last error.
    pub degraded: Option<String>,
}

/// Wraps a `StepExecutor` with the retry budget and fallback policy.
pub struct RetryController {
    executor: StepExecutor,
}

impl RetryController {
    pub fn new(executor: StepExecutor) -> Self {
        Self { executor }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.executor.config()
    }

    /// Run `step` with up to `max_attempts` attempts.
    ///
    /// Each call starts with a fresh budget, so failures in one step never
    /// consume the budget of another.
    pub async fn run_step(
        &self,
        process: &ScoringProcess,
        profile: &SubjectProfile,
        step: &StepSpec,
    ) -> Result<RetryReport, TrustflowError> {
        let max_attempts = self.config().max_attempts.max(1);
        let started = Instant::now();
        let mut last_error: Option<TrustflowError> = None;

        for attempt in 1..=max_attempts {
            match self.executor.execute(process, profile, step).await {
                Ok(mut outcome) => {
                    outcome.result.attempts = attempt;
                    outcome.result.duration_ms = started.elapsed().as_millis() as u64;
                    return Ok(RetryReport {
                        outcome,
                        failures: attempt - 1,
                        degraded: None,
                    });
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        "Process {}: step {} attempt {}/{} failed: {}",
                        process.id,
                        step.id,
                        attempt,
                        max_attempts,
                        e
                    );
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config().backoff_for(attempt)).await;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Process {}: step {} failed with non-retryable error: {}",
                        process.id,
                        step.id,
                        e
                    );
                    return Err(e);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "retry budget exhausted".to_string());

        match simulation::simulate(step, process, self.config(), &reason) {
            Some(mut outcome) => {
                tracing::warn!(
                    "Process {}: step {} degraded to simulated result after {} attempts",
                    process.id,
                    step.id,
                    max_attempts
                );
                outcome.result.attempts = max_attempts;
                outcome.result.duration_ms = started.elapsed().as_millis() as u64;
                Ok(RetryReport {
                    outcome,
                    failures: max_attempts,
                    degraded: Some(reason),
                })
            }
            None => Err(TrustflowError::Unrecoverable {
                step_id: step.id,
                attempts: max_attempts,
                reason,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use trustflow_core::{
        AnchorReceipt, BiasAnalysis, BiasAnalysisService, BlockchainAnchorService,
        DecisionRecord, FairnessMetrics, FairnessScorer, OracleConsensusReport,
        OracleConsensusService, PipelineFlags, ProcessStatus, ProofOutput, ProofPrivateInputs,
        ProofService, ResultOrigin, StepCatalogBuilder,
    };

    use super::*;
    use crate::executor::Collaborators;

    /// Fails the first `failures` calls of every service, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        error: TrustflowError,
    }

    impl Flaky {
        fn new(failures: u32, error: TrustflowError) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                error,
            }
        }

        fn check(&self) -> Result<(), TrustflowError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl BiasAnalysisService for Flaky {
        async fn analyze(
            &self,
            _subject_id: &str,
            _history: &[DecisionRecord],
            _context: &BTreeMap<String, String>,
        ) -> Result<BiasAnalysis, TrustflowError> {
            self.check()?;
            Ok(BiasAnalysis::default())
        }
    }

    #[async_trait]
    impl FairnessScorer for Flaky {
        async fn score(
            &self,
            _subject_id: &str,
            _analysis: &BiasAnalysis,
        ) -> Result<FairnessMetrics, TrustflowError> {
            Ok(FairnessMetrics {
                demographic_parity: 80.0,
                equalized_odds: 80.0,
                calibration: 80.0,
                individual_fairness: 80.0,
                group_fairness: 80.0,
                overall: 80.0,
            })
        }
    }

    #[async_trait]
    impl BlockchainAnchorService for Flaky {
        async fn anchor(
            &self,
            _subject_id: &str,
            _payload: &serde_json::Value,
            network: &str,
        ) -> Result<AnchorReceipt, TrustflowError> {
            self.check()?;
            Ok(AnchorReceipt {
                data_hash: "00".repeat(32),
                block_number: 1,
                tx_hash: "11".repeat(32),
                network: network.to_string(),
                timestamp: Utc::now(),
            })
        }
    }

    #[async_trait]
    impl OracleConsensusService for Flaky {
        async fn consensus(
            &self,
            _subject_id: &str,
            _data_type: &str,
        ) -> Result<OracleConsensusReport, TrustflowError> {
            self.check()?;
            Err(TrustflowError::ConsensusUnavailable("no oracles".into()))
        }
    }

    #[async_trait]
    impl ProofService for Flaky {
        async fn prove(
            &self,
            _statement: &str,
            _private_inputs: &ProofPrivateInputs,
            _public_inputs: &serde_json::Value,
        ) -> Result<ProofOutput, TrustflowError> {
            self.check()?;
            Ok(ProofOutput {
                proof_id: "p".into(),
                public_signals: vec![],
                is_valid: true,
            })
        }
    }

    fn controller(flaky: Arc<Flaky>) -> RetryController {
        let config = PipelineConfig {
            retry_backoff_ms: 1,
            ..Default::default()
        };
        RetryController::new(StepExecutor::new(
            Collaborators {
                bias: flaky.clone(),
                fairness: flaky.clone(),
                anchor: flaky.clone(),
                oracle: flaky.clone(),
                prover: flaky,
            },
            config,
        ))
    }

    fn process() -> ScoringProcess {
        let flags = PipelineFlags::all();
        let mut p = ScoringProcess::new("agent-42", flags, StepCatalogBuilder::new(flags).build());
        p.transition(ProcessStatus::InProgress).unwrap();
        p
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let flaky = Arc::new(Flaky::new(
            2,
            TrustflowError::AnchorUnavailable("rpc timeout".into()),
        ));
        let p = process();
        let report = controller(flaky.clone())
            .run_step(&p, &SubjectProfile::new("agent-42"), p.step(7).unwrap())
            .await
            .unwrap();
        assert_eq!(report.failures, 2);
        assert_eq!(report.outcome.result.attempts, 3);
        assert_eq!(report.outcome.result.origin, ResultOrigin::Measured);
        assert!(report.degraded.is_none());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_fallback_step_degrades() {
        let flaky = Arc::new(Flaky::new(
            u32::MAX,
            TrustflowError::CollaboratorUnavailable("bias service down".into()),
        ));
        let p = process();
        let report = controller(flaky.clone())
            .run_step(&p, &SubjectProfile::new("agent-42"), p.step(2).unwrap())
            .await
            .unwrap();
        assert_eq!(report.outcome.result.origin, ResultOrigin::Simulated);
        assert_eq!(report.failures, 3);
        assert!(report.degraded.unwrap().contains("bias service down"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_oracle_step_is_unrecoverable() {
        let flaky = Arc::new(Flaky::new(0, TrustflowError::ConsensusUnavailable("x".into())));
        let p = process();
        let err = controller(flaky)
            .run_step(&p, &SubjectProfile::new("agent-42"), p.step(8).unwrap())
            .await
            .unwrap_err();
        match err {
            TrustflowError::Unrecoverable { step_id, attempts, .. } => {
                assert_eq!(step_id, 8);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validation_error_is_not_retried() {
        let flaky = Arc::new(Flaky::new(
            u32::MAX,
            TrustflowError::Validation("malformed history".into()),
        ));
        let p = process();
        let err = controller(flaky.clone())
            .run_step(&p, &SubjectProfile::new("agent-42"), p.step(2).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, TrustflowError::Validation(_)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_is_per_step() {
        let flaky = Arc::new(Flaky::new(
            2,
            TrustflowError::ProofGenerationFailed("busy".into()),
        ));
        let p = process();
        let ctl = controller(flaky);
        let profile = SubjectProfile::new("agent-42");
        // Two failures in step 7 leave step 9 with its own full budget.
        let first = ctl.run_step(&p, &profile, p.step(7).unwrap()).await.unwrap();
        assert_eq!(first.failures, 2);
        let second = ctl.run_step(&p, &profile, p.step(9).unwrap()).await.unwrap();
        assert_eq!(second.failures, 0);
        assert_eq!(second.outcome.result.origin, ResultOrigin::Measured);
    }
}
