//! Coordinator binary.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `cellfed-config.yaml` and the environment
//! 3. Initialise the round-0 global model
//! 4. Create the aggregation coordinator
//! 5. Start the staleness watchdog
//! 6. Serve the HTTP API until `Ctrl-C`

use std::sync::Arc;

use cellfed_coordinator::{
    AppState, Coordinator, CoordinatorConfig, spawn_staleness_watchdog, start_server,
};
use cellfed_model::BigramModel;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("cellfed-coordinator starting");

    // 2. Load configuration.
    let config = CoordinatorConfig::load()?;
    info!(
        host = config.server.host,
        port = config.server.port,
        quorum = config.aggregation.quorum,
        stale_submissions = ?config.aggregation.stale_submissions,
        "Configuration loaded"
    );

    // 3. Initial global model.
    let initial = BigramModel::initial_parameters(config.model.init_seed, config.model.init_scale);
    info!(
        init_seed = config.model.init_seed,
        parameters = initial.len(),
        "Global model initialised"
    );

    // 4. Coordinator.
    let coordinator = Arc::new(Coordinator::new(initial, config.aggregation_settings())?);

    // 5. Staleness watchdog.
    if let Some(warn_after) = config.aggregation.staleness_warn_after() {
        let _watchdog = spawn_staleness_watchdog(Arc::clone(&coordinator), warn_after);
        info!(warn_after_secs = warn_after.as_secs(), "Staleness watchdog started");
    }

    // 6. Serve.
    let state = Arc::new(AppState::new(coordinator));
    start_server(&config.server_config(), state).await?;

    info!("cellfed-coordinator shutdown complete");
    Ok(())
}
