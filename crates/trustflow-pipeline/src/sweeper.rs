// crates/trustflow-pipeline/src/sweeper.rs
//
// Background retention sweep: periodically evicts terminal processes that
// have outlived the retention window.

use std::time::Duration;

use chrono::Utc;

use crate::registry::ProcessRegistry;

/// Run the sweep loop forever, once per `interval`.
pub async fn run_sweep_loop(registry: ProcessRegistry, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    tracing::info!("Retention sweep started (interval {:?})", interval);

    loop {
        ticker.tick().await;

        match registry.sweep(Utc::now()).await {
            Ok(removed) => tracing::debug!("Sweep pass removed {} processes", removed),
            Err(e) => tracing::warn!("Sweep pass failed: {}", e),
        }
    }
}
