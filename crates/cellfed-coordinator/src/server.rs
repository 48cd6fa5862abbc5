//! Coordinator HTTP server lifecycle management.
//!
//! [`start_server`] binds and serves until `Ctrl-C`. [`spawn_server`]
//! binds eagerly and serves on a background task, which is how tests and
//! embedding callers run it. [`spawn_staleness_watchdog`] logs a warning
//! while no round has closed for too long.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cellfed_model::ModelParameters;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::aggregator::Coordinator;
use crate::router::build_router;
use crate::state::AppState;

/// Listen address for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on. `0` picks a free port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8000,
        }
    }
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

async fn bind(config: &ServerConfig) -> Result<(TcpListener, SocketAddr), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;
    Ok((listener, local))
}

/// Serve the coordinator API until `Ctrl-C`.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let (listener, addr) = bind(config).await?;
    info!(%addr, "Coordinator listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    Ok(())
}

/// Bind now and serve on a background task.
///
/// Returns the bound address (useful with port `0`) and the task handle.
/// The server runs until the task is aborted or the runtime shuts down.
pub async fn spawn_server(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    let (listener, addr) = bind(config).await?;
    let router = build_router(state);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Coordinator server exited with error");
        }
    });

    info!(%addr, "Coordinator spawned on background task");
    Ok((addr, handle))
}

/// Warn periodically while no aggregation has happened for `warn_after`.
///
/// A round that never reaches quorum is not an error; this makes it
/// visible in the logs. Checks run every half `warn_after`, at least once
/// per second.
pub fn spawn_staleness_watchdog<P: ModelParameters>(
    coordinator: Arc<Coordinator<P>>,
    warn_after: Duration,
) -> JoinHandle<()> {
    let period = (warn_after / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let status = coordinator.status().await;
            if status.seconds_since_last_aggregation >= warn_after.as_secs() {
                warn!(
                    round = status.round,
                    pending = status.pending,
                    quorum = status.quorum,
                    seconds_since_last_aggregation = status.seconds_since_last_aggregation,
                    "no aggregation within the staleness window; quorum may be unreachable"
                );
            }
        }
    })
}
