// crates/trustflow-pipeline/src/events.rs
//
// Process lifecycle events broadcast by the registry.
//
// Callers subscribe through `ProcessRegistry::subscribe` to learn about
// completion without polling.

use trustflow_core::{ProcessId, ResultOrigin, StepId};

/// Events emitted while a scoring process runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    /// A process was created and its driver spawned.
    Started {
        process_id: ProcessId,
        subject_id: String,
    },
    /// A step produced a result.
    StepCompleted {
        process_id: ProcessId,
        step_id: StepId,
        origin: ResultOrigin,
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// A step exhausted its retries and fell back to a simulated result.
    StepDegraded {
        process_id: ProcessId,
        step_id: StepId,
        reason: String,
    },
    /// The process reached `Completed`.
    Completed {
        process_id: ProcessId,
        final_score: u32,
    },
    /// The process reached `Failed`.
    Failed {
        process_id: ProcessId,
        error: String,
    },
}

impl ProcessEvent {
    pub fn process_id(&self) -> &ProcessId {
        match self {
            ProcessEvent::Started { process_id, .. }
            | ProcessEvent::StepCompleted { process_id, .. }
            | ProcessEvent::StepDegraded { process_id, .. }
            | ProcessEvent::Completed { process_id, .. }
            | ProcessEvent::Failed { process_id, .. } => process_id,
        }
    }

    /// Whether this event marks the end of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessEvent::Completed { .. } | ProcessEvent::Failed { .. })
    }
}
