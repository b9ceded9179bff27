// crates/trustflow-daemon/src/config.rs
//
// Runtime configuration for the Trustflow daemon.
// Loaded from a TOML file or populated with sensible defaults.

use std::fs;

use serde::Deserialize;
use thiserror::Error;
use trustflow_core::TrustflowError;
use trustflow_pipeline::PipelineConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid pipeline config: {0}")]
    Invalid(#[from] TrustflowError),
}

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Log level used when RUST_LOG is unset: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// JSON file holding an array of subject profiles.
    #[serde(default = "default_subjects_file")]
    pub subjects_file: String,

    /// Number of oracles in the local oracle network.
    #[serde(default = "default_oracle_count")]
    pub oracle_count: usize,

    /// Maximum per-oracle deviation from the observed reputation.
    #[serde(default = "default_oracle_jitter")]
    pub oracle_jitter: f64,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_subjects_file() -> String {
    "~/.trustflow/subjects.json".to_string()
}

fn default_oracle_count() -> usize {
    5
}

fn default_oracle_jitter() -> f64 {
    3.0
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            subjects_file: default_subjects_file(),
            oracle_count: default_oracle_count(),
            oracle_jitter: default_oracle_jitter(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse and validate TOML configuration text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: DaemonConfig = toml::from_str(contents)?;
        config.pipeline.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = DaemonConfig::parse("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.oracle_count, 5);
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.pipeline.retention_secs, 3600);
    }

    #[test]
    fn test_pipeline_table_overrides() {
        let toml = r#"
            log_level = "debug"
            subjects_file = "/tmp/subjects.json"
            oracle_count = 7

            [pipeline]
            step_timeout_ms = 1000
            max_attempts = 5
            proof_threshold = 80
        "#;
        let config = DaemonConfig::parse(toml).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.subjects_file, "/tmp/subjects.json");
        assert_eq!(config.oracle_count, 7);
        assert_eq!(config.pipeline.step_timeout_ms, 1000);
        assert_eq!(config.pipeline.max_attempts, 5);
        assert_eq!(config.pipeline.proof_threshold, 80);
        // untouched fields keep their defaults
        assert_eq!(config.pipeline.retry_backoff_ms, 500);
    }

    #[test]
    fn test_invalid_pipeline_is_rejected() {
        let err = DaemonConfig::parse("[pipeline]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DaemonConfig::load("/nonexistent/trustflow.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = DaemonConfig::parse("oracle_count = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
