// crates/trustflow-pipeline/src/registry.rs
//
// ProcessRegistry: owns scoring process records.
//
// `initiate` validates the request, takes the subject lease, stores the new
// InProgress record, and spawns its driver task before returning. Callers
// then poll `get`/`get_status` or subscribe to process events. `sweep`
// evicts terminal records past the retention window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use trustflow_core::{
    validate_subject_id, PipelineFlags, ProcessId, ProcessStatus, ProcessStore, ScoringProcess,
    StepCatalogBuilder, SubjectDirectory, TrustflowError,
};

use crate::config::PipelineConfig;
use crate::driver::PipelineRunner;
use crate::events::ProcessEvent;
use crate::executor::{Collaborators, StepExecutor};
use crate::lease::SubjectLeases;
use crate::retry::RetryController;
use crate::stats::PipelineStatistics;
use crate::store::InMemoryProcessStore;

struct RegistryInner {
    config: PipelineConfig,
    store: Arc<dyn ProcessStore>,
    directory: Arc<dyn SubjectDirectory>,
    runner: Arc<PipelineRunner>,
    leases: SubjectLeases,
    events: broadcast::Sender<ProcessEvent>,
}

/// Entry point of the pipeline: create, query, and sweep scoring processes.
#[derive(Clone)]
pub struct ProcessRegistry {
    inner: Arc<RegistryInner>,
}

/// Builder for `ProcessRegistry`.
pub struct RegistryBuilder {
    collaborators: Collaborators,
    directory: Arc<dyn SubjectDirectory>,
    config: PipelineConfig,
    store: Option<Arc<dyn ProcessStore>>,
}

impl RegistryBuilder {
    pub fn new(collaborators: Collaborators, directory: Arc<dyn SubjectDirectory>) -> Self {
        Self {
            collaborators,
            directory,
            config: PipelineConfig::default(),
            store: None,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom process store instead of the in-memory default.
    pub fn with_store(mut self, store: Arc<dyn ProcessStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<ProcessRegistry, TrustflowError> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryProcessStore::new()));
        let (events, _) = broadcast::channel(self.config.event_buffer);
        let executor = StepExecutor::new(self.collaborators, self.config.clone());
        let runner = Arc::new(PipelineRunner::new(
            RetryController::new(executor),
            store.clone(),
            events.clone(),
        ));

        Ok(ProcessRegistry {
            inner: Arc::new(RegistryInner {
                config: self.config,
                store,
                directory: self.directory,
                runner,
                leases: SubjectLeases::new(),
                events,
            }),
        })
    }
}

impl ProcessRegistry {
    pub fn builder(
        collaborators: Collaborators,
        directory: Arc<dyn SubjectDirectory>,
    ) -> RegistryBuilder {
        RegistryBuilder::new(collaborators, directory)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Start a scoring run for `subject_id`.
    ///
    /// Returns the freshly created `InProgress` record; the steps run in a
    /// spawned task. Fails with `Validation` for a malformed or unknown
    /// subject and with `AlreadyRunning` if the subject has a run in flight.
    pub async fn initiate(
        &self,
        subject_id: &str,
        flags: PipelineFlags,
    ) -> Result<ScoringProcess, TrustflowError> {
        validate_subject_id(subject_id)?;
        let profile = self.inner.directory.lookup(subject_id).ok_or_else(|| {
            TrustflowError::Validation(format!("unknown subject {}", subject_id))
        })?;

        let steps = StepCatalogBuilder::new(flags).build();
        let mut process = ScoringProcess::new(subject_id, flags, steps);
        let lease = self.inner.leases.acquire(subject_id, &process.id)?;

        process.transition(ProcessStatus::InProgress)?;
        self.inner.store.put(&process).await?;

        tracing::info!(
            "Process {} created for subject {} ({} steps, flags {:?})",
            process.id,
            subject_id,
            process.steps.len(),
            flags
        );
        let _ = self.inner.events.send(ProcessEvent::Started {
            process_id: process.id.clone(),
            subject_id: subject_id.to_string(),
        });

        let runner = self.inner.runner.clone();
        tokio::spawn(runner.supervise(process.clone(), profile, lease));

        Ok(process)
    }

    /// Look up a process by id.
    pub async fn get(&self, id: &ProcessId) -> Result<Option<ScoringProcess>, TrustflowError> {
        self.inner.store.get(id).await
    }

    /// Alias of [`ProcessRegistry::get`] for status polling.
    pub async fn get_status(
        &self,
        id: &ProcessId,
    ) -> Result<Option<ScoringProcess>, TrustflowError> {
        self.get(id).await
    }

    /// Process currently running for `subject_id`, if any.
    pub fn running_process(&self, subject_id: &str) -> Option<ProcessId> {
        self.inner.leases.holder(subject_id)
    }

    /// Remove terminal records whose `completed_at` is older than the
    /// retention window. Non-terminal records are never removed.
    ///
    /// Returns the number of records removed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, TrustflowError> {
        let retention = self.inner.config.retention();
        let mut removed = 0;

        for process in self.inner.store.list().await? {
            if !process.is_terminal() {
                continue;
            }
            let Some(completed_at) = process.completed_at else {
                continue;
            };
            if now - completed_at > retention {
                self.inner.store.delete(&process.id).await?;
                removed += 1;
                tracing::trace!("Swept process {} ({})", process.id, process.status);
            }
        }

        if removed > 0 {
            tracing::info!("Sweep removed {} terminal processes", removed);
        }
        Ok(removed)
    }

    pub async fn get_statistics(&self) -> Result<PipelineStatistics, TrustflowError> {
        let processes = self.inner.store.list().await?;
        Ok(PipelineStatistics::from_processes(&processes))
    }

    /// Subscribe to process lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until the process is terminal or `timeout` elapses.
    pub async fn await_terminal(
        &self,
        id: &ProcessId,
        timeout: Duration,
    ) -> Result<ScoringProcess, TrustflowError> {
        let mut events = self.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.get(id).await? {
                None => return Err(TrustflowError::NotFound(format!("process {}", id))),
                Some(process) if process.is_terminal() => return Ok(process),
                Some(_) => {}
            }

            match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) => {
                    return Err(TrustflowError::InvalidState(format!(
                        "process {} not terminal after {:?}",
                        id, timeout
                    )))
                }
                Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => {}
                Ok(Err(RecvError::Closed)) => {
                    return Err(TrustflowError::InvalidState(
                        "process event channel closed".to_string(),
                    ))
                }
            }
        }
    }
}
