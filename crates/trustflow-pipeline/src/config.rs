// crates/trustflow-pipeline/src/config.rs
//
// Runtime configuration for the scoring pipeline.
// Deserialized from the `[pipeline]` table of the daemon config, or
// populated with sensible defaults.

use std::time::Duration;

use serde::Deserialize;
use trustflow_core::TrustflowError;

/// Tunables for step execution, retry, aggregation, and retention.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Per-step timeout in milliseconds (default 5 minutes).
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// Attempts per step before giving up (default 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit: retry n waits n * retry_backoff_ms.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// How long terminal processes are kept before the sweep removes them.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Interval of the periodic sweep loop.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Fraction of oracle submissions that must agree with the consensus value.
    #[serde(default = "default_oracle_quorum")]
    pub oracle_quorum: f64,

    /// Maximum distance (score points) for a submission to count as agreeing.
    #[serde(default = "default_oracle_tolerance")]
    pub oracle_tolerance: f64,

    /// Score the threshold proof attests to.
    #[serde(default = "default_proof_threshold")]
    pub proof_threshold: u32,

    /// Ledger network passed to the anchoring service.
    #[serde(default = "default_anchor_network")]
    pub anchor_network: String,

    /// Capacity of the process event broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_step_timeout_ms() -> u64 {
    300_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_oracle_quorum() -> f64 {
    0.67
}

fn default_oracle_tolerance() -> f64 {
    5.0
}

fn default_proof_threshold() -> u32 {
    70
}

fn default_anchor_network() -> String {
    "local-ledger".to_string()
}

fn default_event_buffer() -> usize {
    256
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: default_step_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            oracle_quorum: default_oracle_quorum(),
            oracle_tolerance: default_oracle_tolerance(),
            proof_threshold: default_proof_threshold(),
            anchor_network: default_anchor_network(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl PipelineConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// Delay before the given retry (1-based): linear in the attempt number.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(retry as u64))
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs.min(i64::MAX as u64) as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), TrustflowError> {
        if self.max_attempts == 0 {
            return Err(TrustflowError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.oracle_quorum > 0.0 && self.oracle_quorum <= 1.0) {
            return Err(TrustflowError::Validation(format!(
                "oracle_quorum must be in (0, 1], got {}",
                self.oracle_quorum
            )));
        }
        if self.oracle_tolerance < 0.0 {
            return Err(TrustflowError::Validation(
                "oracle_tolerance must not be negative".to_string(),
            ));
        }
        if self.proof_threshold > 100 {
            return Err(TrustflowError::Validation(format!(
                "proof_threshold must be at most 100, got {}",
                self.proof_threshold
            )));
        }
        if self.event_buffer == 0 {
            return Err(TrustflowError::Validation(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
