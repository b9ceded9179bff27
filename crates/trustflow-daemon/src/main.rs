// crates/trustflow-daemon/src/main.rs
//
// Binary entrypoint for the Trustflow daemon.
//
// Parses CLI arguments, loads configuration, initializes tracing, builds a
// process registry over the local collaborator adapters, runs the requested
// scoring pipelines, and keeps the retention sweep running until Ctrl-C.

mod config;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use config::DaemonConfig;
use trustflow_adapters::{
    GroupRateFairnessScorer, HashCommitmentProver, HistoricalBiasAnalyzer, LocalLedger,
    LocalOracleNetwork, StaticSubjectDirectory,
};
use trustflow_core::{PipelineFlags, SubjectDirectory};
use trustflow_pipeline::{
    run_sweep_loop, Collaborators, PipelineConfig, ProcessEvent, ProcessRegistry,
};

/// Trustflow daemon: runs staged trust-scoring pipelines.
#[derive(Parser, Debug)]
#[command(name = "trustflow-daemon", version = "0.1.0", about = "Trustflow scoring daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.trustflow/config.toml")]
    config: String,

    /// Subject to score; repeat for several subjects.
    #[arg(long = "subject")]
    subjects: Vec<String>,

    /// Overrides the subjects file from the config.
    #[arg(long)]
    subjects_file: Option<String>,

    /// Enable blockchain anchoring (step 7).
    #[arg(long)]
    blockchain: bool,

    /// Enable oracle consensus (step 8).
    #[arg(long)]
    oracle: bool,

    /// Enable cryptographic verification (step 9).
    #[arg(long)]
    crypto: bool,

    /// Exit after the requested subjects finish instead of waiting for Ctrl-C.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration before tracing so the configured level applies.
    let loaded = DaemonConfig::load(&expand_tilde(&args.config));
    let mut daemon_config = loaded.as_ref().cloned().unwrap_or_default();
    if let Some(path) = &args.subjects_file {
        daemon_config.subjects_file = path.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&daemon_config.log_level)),
        )
        .init();

    match &loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", args.config),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            args.config,
            e
        ),
    }

    tracing::info!("Trustflow Daemon v0.1.0");
    tracing::info!("Subjects file: {}", daemon_config.subjects_file);
    tracing::info!("Oracle network size: {}", daemon_config.oracle_count);
    tracing::info!(
        "Retention: {}s, sweep every {}s",
        daemon_config.pipeline.retention_secs,
        daemon_config.pipeline.sweep_interval_secs
    );

    let subjects_path = expand_tilde(&daemon_config.subjects_file);
    let directory: Arc<dyn SubjectDirectory> =
        match StaticSubjectDirectory::load(Path::new(&subjects_path)) {
            Ok(directory) => Arc::new(directory),
            Err(e) => {
                tracing::warn!("No subject profiles loaded: {}", e);
                Arc::new(StaticSubjectDirectory::new())
            }
        };

    let registry = build_registry(&daemon_config, directory)?;

    let sweep_registry = registry.clone();
    let sweep_interval = daemon_config.pipeline.sweep_interval();
    tokio::spawn(async move {
        run_sweep_loop(sweep_registry, sweep_interval).await;
    });

    let mut events = registry.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            log_event(&event);
        }
    });

    let flags = PipelineFlags {
        use_blockchain: args.blockchain,
        use_oracle_consensus: args.oracle,
        use_crypto_verification: args.crypto,
    };
    run_subjects(&registry, &args.subjects, flags, &daemon_config.pipeline).await;

    let stats = registry.get_statistics().await?;
    tracing::info!("Pipeline statistics: {}", serde_json::to_string(&stats)?);

    if args.once {
        return Ok(());
    }

    tracing::info!("Waiting for Ctrl-C");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}

fn build_registry(
    config: &DaemonConfig,
    directory: Arc<dyn SubjectDirectory>,
) -> Result<ProcessRegistry, trustflow_core::TrustflowError> {
    let oracle = LocalOracleNetwork::new(directory.clone(), config.oracle_count)
        .with_jitter(config.oracle_jitter)
        .with_agreement(config.pipeline.oracle_tolerance, config.pipeline.oracle_quorum);

    let collaborators = Collaborators {
        bias: Arc::new(HistoricalBiasAnalyzer::new()),
        fairness: Arc::new(GroupRateFairnessScorer::new()),
        anchor: Arc::new(LocalLedger::new()),
        oracle: Arc::new(oracle),
        prover: Arc::new(HashCommitmentProver::new()),
    };

    ProcessRegistry::builder(collaborators, directory)
        .with_config(config.pipeline.clone())
        .build()
}

/// Initiate every subject, then wait for each run and print it.
async fn run_subjects(
    registry: &ProcessRegistry,
    subjects: &[String],
    flags: PipelineFlags,
    pipeline: &PipelineConfig,
) {
    let mut started = Vec::new();
    for subject in subjects {
        match registry.initiate(subject, flags).await {
            Ok(process) => {
                tracing::info!("Started process {} for {}", process.id, subject);
                started.push(process.id);
            }
            Err(e) => tracing::error!("Could not score {}: {}", subject, e),
        }
    }

    let deadline = run_deadline(pipeline);
    for id in started {
        match registry.await_terminal(&id, deadline).await {
            Ok(process) => match serde_json::to_string_pretty(&process) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!("Could not render process {}: {}", id, e),
            },
            Err(e) => tracing::error!("Process {} did not finish: {}", id, e),
        }
    }
}

/// Upper bound on a full run: every step timing out on every attempt.
fn run_deadline(pipeline: &PipelineConfig) -> Duration {
    let attempts = pipeline.max_attempts.max(1);
    let per_step = pipeline
        .step_timeout()
        .saturating_mul(attempts)
        .saturating_add(pipeline.backoff_for(attempts).saturating_mul(attempts));
    per_step.saturating_mul(9)
}

fn log_event(event: &ProcessEvent) {
    match event {
        ProcessEvent::StepDegraded {
            process_id,
            step_id,
            reason,
        } => tracing::warn!(
            "Process {}: step {} degraded: {}",
            process_id,
            step_id,
            reason
        ),
        ProcessEvent::Failed { process_id, error } => {
            tracing::error!("Process {} failed: {}", process_id, error)
        }
        other => tracing::debug!("Event: {:?}", other),
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_deadline_covers_every_attempt() {
        let pipeline = PipelineConfig {
            step_timeout_ms: 100,
            max_attempts: 2,
            retry_backoff_ms: 10,
            ..Default::default()
        };
        // (100 * 2 + 20 * 2) ms per step, nine steps.
        assert_eq!(run_deadline(&pipeline), Duration::from_millis(2160));
    }

    #[test]
    fn test_run_deadline_saturates_on_huge_timeouts() {
        let pipeline = PipelineConfig {
            step_timeout_ms: u64::MAX,
            max_attempts: u32::MAX,
            retry_backoff_ms: u64::MAX,
            ..Default::default()
        };
        assert_eq!(run_deadline(&pipeline), Duration::MAX);
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/etc/trustflow.toml"), "/etc/trustflow.toml");
    }
}
