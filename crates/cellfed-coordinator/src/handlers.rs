//! REST API endpoint handlers for the coordinator.
//!
//! Handlers decode and encode parameter payloads themselves so that the
//! coordinator's lock is only held for the in-memory work.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness probe |
//! | `GET` | `/api/global` | Current global parameters and round |
//! | `POST` | `/api/updates` | Submit a locally trained update |
//! | `GET` | `/api/status` | Round progress and staleness |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use cellfed_model::{decode_wire, encode_wire};
use cellfed_types::{CoordinatorStatus, GlobalParameters, SubmitReply, UpdateSubmission};
use tracing::warn;

use crate::aggregator::Submission;
use crate::error::CoordinatorError;
use crate::state::AppState;

/// `GET /health`.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// `GET /api/global`: a copy of the global model.
pub async fn get_global(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GlobalParameters>, CoordinatorError> {
    let snapshot = state.coordinator.fetch().await;
    let parameters = encode_wire(&snapshot.parameters)
        .map_err(|source| CoordinatorError::Encoding { source })?;
    Ok(Json(GlobalParameters {
        round: snapshot.round,
        parameters,
    }))
}

/// `POST /api/updates`: queue an update, aggregating on quorum.
pub async fn post_update(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdateSubmission>, JsonRejection>,
) -> Result<Json<SubmitReply>, CoordinatorError> {
    let Json(body) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejecting malformed submission");
        CoordinatorError::MalformedBody {
            reason: rejection.body_text(),
        }
    })?;
    let parameters = decode_wire(&body.parameters).map_err(|source| {
        warn!(worker_id = %body.worker_id, error = %source, "rejecting undecodable update");
        CoordinatorError::InvalidParameters { source }
    })?;

    let reply = state
        .coordinator
        .submit(Submission {
            worker_id: body.worker_id,
            parameters,
            sample_count: body.sample_count,
            based_on_round: body.round,
        })
        .await?;
    Ok(Json(reply))
}

/// `GET /api/status`.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<CoordinatorStatus> {
    Json(state.coordinator.status().await)
}
