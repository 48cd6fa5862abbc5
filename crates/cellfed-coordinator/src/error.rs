//! Error types for the coordinator.
//!
//! [`CoordinatorError`] covers every way a fetch or submission can fail.
//! It converts into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation, so
//! handlers can return it directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cellfed_model::ModelError;
use cellfed_types::WorkerId;

/// Errors that can occur while serving the aggregation protocol.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// A submission claimed no training samples; it would contribute a
    /// zero weight and could make the weighted mean undefined.
    #[error("update from {worker_id} has zero samples")]
    ZeroSamples {
        /// The submitting worker.
        worker_id: WorkerId,
    },

    /// Accepting the update would push the round's sample total past
    /// `u64::MAX`.
    #[error("update from {worker_id} overflows the round's sample total")]
    SampleOverflow {
        /// The submitting worker.
        worker_id: WorkerId,
    },

    /// The request body was not a valid submission.
    #[error("malformed request body: {reason}")]
    MalformedBody {
        /// What the JSON extractor rejected.
        reason: String,
    },

    /// The submitted parameters do not match the global model's layout.
    #[error("update from {worker_id} is incompatible with the global model: {reason}")]
    Incompatible {
        /// The submitting worker.
        worker_id: WorkerId,
        /// Which tensor differs and how.
        reason: String,
    },

    /// The parameter payload could not be decoded.
    #[error("invalid parameter payload: {source}")]
    InvalidParameters {
        /// The underlying decode error.
        source: ModelError,
    },

    /// The global model could not be encoded for a reply.
    #[error("failed to encode global parameters: {source}")]
    Encoding {
        /// The underlying encode error.
        source: ModelError,
    },

    /// Averaging the pending updates failed.
    #[error("aggregation failed: {source}")]
    Aggregation {
        /// The underlying combine error.
        source: ModelError,
    },

    /// The coordinator was configured with a quorum of zero.
    #[error("quorum must be at least 1")]
    InvalidQuorum,
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ZeroSamples { .. }
            | Self::SampleOverflow { .. }
            | Self::MalformedBody { .. }
            | Self::Incompatible { .. }
            | Self::InvalidParameters { .. } => StatusCode::BAD_REQUEST,
            Self::Encoding { .. } | Self::Aggregation { .. } | Self::InvalidQuorum => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
