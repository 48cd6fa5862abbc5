//! Axum router construction for the coordinator API.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Largest accepted request body. Parameter blobs travel as base64 JSON,
/// which is far larger than the raw tensors.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Build the complete Axum router for the coordinator.
///
/// The router includes:
/// - `GET /health` -- liveness probe
/// - `GET /api/global` -- current global parameters
/// - `POST /api/updates` -- submit an update
/// - `GET /api/status` -- round progress
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/global", get(handlers::get_global))
        .route("/api/updates", post(handlers::post_update))
        .route("/api/status", get(handlers::get_status))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
