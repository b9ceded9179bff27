// crates/trustflow-pipeline/src/driver.rs
//
// The driver loop: the single logical owner of a running process.
//
// Steps run strictly in ascending id order, one at a time:
// 1. Record the current step and persist
// 2. Check that every dependency produced a result
// 3. Run the step through the RetryController
// 4. Merge the result and its metadata effect, persist, emit an event
// On the last step the Aggregator finalizes the process. Any unrecoverable
// error marks the process Failed instead. The terminal write is always the
// last mutation, and the subject lease is released only after it.
//
// `supervise` runs `drive` in its own task. If that task panics, the stored
// record is failed from the outside before the lease is released.

use std::any::Any;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use trustflow_core::{
    ProcessId, ProcessStore, ScoringProcess, StepSpec, SubjectProfile, TrustflowError,
};

use crate::aggregator::Aggregator;
use crate::events::ProcessEvent;
use crate::executor::StepEffect;
use crate::lease::SubjectLease;
use crate::retry::{RetryController, RetryReport};

/// Drives processes from `InProgress` to a terminal status.
pub struct PipelineRunner {
    retry: RetryController,
    store: Arc<dyn ProcessStore>,
    events: broadcast::Sender<ProcessEvent>,
}

impl PipelineRunner {
    pub fn new(
        retry: RetryController,
        store: Arc<dyn ProcessStore>,
        events: broadcast::Sender<ProcessEvent>,
    ) -> Self {
        Self {
            retry,
            store,
            events,
        }
    }

    /// Drive `process` to a terminal status in a child task, holding `lease`
    /// until the terminal record is stored. Emits the terminal event last.
    pub async fn supervise(
        self: Arc<Self>,
        process: ScoringProcess,
        profile: SubjectProfile,
        lease: SubjectLease,
    ) {
        let runner = self.clone();
        let handle = tokio::spawn(async move { runner.drive(process, profile).await });

        let terminal_event = match handle.await {
            Ok(event) => event,
            Err(e) => self.recover(lease.process_id(), lease.subject_id(), e).await,
        };

        drop(lease);
        let _ = self.events.send(terminal_event);
    }

    /// Fail the stored record of a driver task that died before finishing.
    async fn recover(&self, id: &ProcessId, subject_id: &str, err: JoinError) -> ProcessEvent {
        let cause = describe_join_error(err);
        tracing::error!("Process {} for {}: {}", id, subject_id, cause);

        let mut error = TrustflowError::InvalidState(cause.clone());
        match self.store.get(id).await {
            Ok(Some(mut process)) if !process.is_terminal() => {
                if let Some(step_id) = process.current_step {
                    error = TrustflowError::InvalidState(format!("{} in step {}", cause, step_id));
                }
                match process.fail(&error, Utc::now()) {
                    Ok(()) => {
                        if let Err(e) = self.store.put(&process).await {
                            tracing::error!("Process {}: terminal write failed: {}", id, e);
                        }
                    }
                    Err(e) => tracing::error!("Process {}: could not record failure: {}", id, e),
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Process {}: could not load record: {}", id, e),
        }

        ProcessEvent::Failed {
            process_id: id.clone(),
            error: error.to_string(),
        }
    }

    /// Run every step of `process`, then finalize or fail it and store the
    /// terminal record.
    ///
    /// Never returns an error: failures are recorded on the process record.
    /// Returns the terminal event for the caller to emit.
    pub async fn drive(
        &self,
        mut process: ScoringProcess,
        profile: SubjectProfile,
    ) -> ProcessEvent {
        tracing::info!(
            "Process {}: running {} steps for subject {}",
            process.id,
            process.steps.len(),
            process.subject_id
        );

        let run = self.run_steps(&mut process, &profile).await;
        let now = Utc::now();

        let terminal_event = match run.and_then(|()| Aggregator::finalize(&mut process, now)) {
            Ok(final_score) => {
                tracing::info!(
                    "Process {}: completed with final score {} (degraded steps: {:?})",
                    process.id,
                    final_score,
                    process.metadata.degraded_steps
                );
                ProcessEvent::Completed {
                    process_id: process.id.clone(),
                    final_score,
                }
            }
            Err(e) => {
                if let TrustflowError::Unrecoverable { step_id, attempts, .. } = &e {
                    process.metadata.retry_counts.insert(*step_id, *attempts);
                }
                tracing::error!("Process {}: failed: {}", process.id, e);
                if let Err(transition_err) = process.fail(&e, now) {
                    tracing::error!(
                        "Process {}: could not record failure: {}",
                        process.id,
                        transition_err
                    );
                }
                ProcessEvent::Failed {
                    process_id: process.id.clone(),
                    error: e.to_string(),
                }
            }
        };

        if let Err(e) = self.store.put(&process).await {
            tracing::error!("Process {}: terminal write failed: {}", process.id, e);
        }
        terminal_event
    }

    async fn run_steps(
        &self,
        process: &mut ScoringProcess,
        profile: &SubjectProfile,
    ) -> Result<(), TrustflowError> {
        let mut steps: Vec<StepSpec> = process.steps.clone();
        steps.sort_by_key(|s| s.id);

        for step in &steps {
            process.current_step = Some(step.id);
            self.store.put(process).await?;

            let missing = process.missing_dependencies(step);
            if !missing.is_empty() {
                return Err(TrustflowError::Validation(format!(
                    "step {} is missing results for dependencies {:?}",
                    step.id, missing
                )));
            }

            tracing::debug!("Process {}: step {} ({}) started", process.id, step.id, step.name);
            let report = self.retry.run_step(process, profile, step).await?;
            self.apply(process, step, report)?;
            self.store.put(process).await?;
        }

        Ok(())
    }

    fn apply(
        &self,
        process: &mut ScoringProcess,
        step: &StepSpec,
        report: RetryReport,
    ) -> Result<(), TrustflowError> {
        let RetryReport {
            outcome,
            failures,
            degraded,
        } = report;

        process.metadata.retry_counts.insert(step.id, failures);
        match outcome.effect {
            StepEffect::None => {}
            StepEffect::Anchor(anchor) => process.metadata.anchors.push(anchor),
            StepEffect::OracleSubmissions(submissions) => {
                process.metadata.oracle_submissions.extend(submissions)
            }
            StepEffect::Proof(proof) => process.metadata.proofs.push(proof),
        }

        if let Some(reason) = degraded {
            process.metadata.degraded_steps.push(step.id);
            process.metadata.last_error = Some(reason.clone());
            let _ = self.events.send(ProcessEvent::StepDegraded {
                process_id: process.id.clone(),
                step_id: step.id,
                reason,
            });
        }

        let origin = outcome.result.origin;
        let attempts = outcome.result.attempts;
        process.record_result(outcome.result)?;

        tracing::debug!(
            "Process {}: step {} completed ({:?}, {} attempts)",
            process.id,
            step.id,
            origin,
            attempts
        );
        let _ = self.events.send(ProcessEvent::StepCompleted {
            process_id: process.id.clone(),
            step_id: step.id,
            origin,
            attempts,
        });
        Ok(())
    }
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return "driver task cancelled".to_string();
    }
    let payload: Box<dyn Any + Send> = err.into_panic();
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    format!("driver panicked: {}", message)
}
