// crates/trustflow-pipeline/src/stats.rs
//
// Aggregate statistics over the processes currently held by the registry.

use serde::Serialize;
use trustflow_core::{ProcessStatus, ScoringProcess};

/// Snapshot returned by `ProcessRegistry::get_statistics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatistics {
    /// Processes not yet terminal.
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    /// Mean final score of completed processes (0.0 when none).
    pub avg_score: f64,
    /// Mean run time of terminal processes in milliseconds (0.0 when none).
    pub avg_duration_ms: f64,
}

impl PipelineStatistics {
    pub fn from_processes(processes: &[ScoringProcess]) -> Self {
        let mut stats = PipelineStatistics::default();
        let mut score_sum = 0.0;
        let mut scored = 0usize;
        let mut duration_sum = 0.0;
        let mut timed = 0usize;

        for p in processes {
            match p.status {
                ProcessStatus::Pending | ProcessStatus::InProgress => stats.active += 1,
                ProcessStatus::Completed => {
                    stats.completed += 1;
                    if let Some(score) = p.final_score {
                        score_sum += score as f64;
                        scored += 1;
                    }
                }
                ProcessStatus::Failed => stats.failed += 1,
            }
            if let Some(ms) = p.duration_ms() {
                duration_sum += ms as f64;
                timed += 1;
            }
        }

        if scored > 0 {
            stats.avg_score = score_sum / scored as f64;
        }
        if timed > 0 {
            stats.avg_duration_ms = duration_sum / timed as f64;
        }
        stats
    }
}
