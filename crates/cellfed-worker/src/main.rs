//! Training worker binary.
//!
//! Reads its configuration from the environment (`COORDINATOR_URL` is
//! required), generates a local corpus, and trains against the coordinator
//! until the configured round is reached or the process is stopped.

use cellfed_worker::{CoordinatorLink, HttpLink, Worker, WorkerConfig, WorkerError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("cellfed-worker starting");

    // Load configuration from environment
    let config = WorkerConfig::from_env()?;
    info!(
        worker_id = %config.worker_id,
        coordinator_url = %config.coordinator_url,
        ue_count = config.corpus.ue_count,
        event_count = config.corpus.event_count,
        epochs_per_round = config.epochs_per_round,
        max_rounds = ?config.max_rounds,
        "configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| WorkerError::Config(format!("failed to build HTTP client: {e}")))?;
    let link = CoordinatorLink::Http(HttpLink::with_client(client, &config.coordinator_url));

    let mut worker = Worker::new(config, link)?;
    let summary = worker.run().await;

    info!(
        final_round = summary.final_round,
        submissions = summary.submissions,
        aggregations_triggered = summary.aggregations_triggered,
        stale_replies = summary.stale_replies,
        diagnostics_written = summary.diagnostics_written,
        "cellfed-worker finished"
    );
    Ok(())
}
