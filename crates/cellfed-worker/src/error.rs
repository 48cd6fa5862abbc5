//! Error types for the training worker.
//!
//! The worker distinguishes transient failures, which it retries forever
//! with a fixed delay, from rejections, which it logs before starting the
//! round over from a fresh fetch. See [`WorkerError::is_transient`].

use cellfed_coordinator::CoordinatorError;
use cellfed_model::ModelError;
use cellfed_sim::SimError;

/// Errors that can occur during worker operation.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The coordinator could not be reached, or the connection failed
    /// mid-request.
    #[error("transport error: {0}")]
    Transport(String),

    /// The coordinator failed with a server-side error (5xx).
    #[error("coordinator error {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or error description.
        message: String,
    },

    /// The coordinator refused the request (4xx).
    #[error("coordinator rejected request with {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or error description.
        message: String,
    },

    /// Parameters could not be encoded, decoded, or loaded.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// The local corpus or a diagnostic sample could not be written.
    #[error("trace error: {0}")]
    Trace(#[from] SimError),
}

impl WorkerError {
    /// Whether retrying the same step unchanged can succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Server { .. })
    }

    /// Map an in-process coordinator error onto the HTTP classification.
    pub fn from_coordinator(err: &CoordinatorError) -> Self {
        let message = err.to_string();
        match err {
            CoordinatorError::ZeroSamples { .. }
            | CoordinatorError::SampleOverflow { .. }
            | CoordinatorError::MalformedBody { .. }
            | CoordinatorError::Incompatible { .. }
            | CoordinatorError::InvalidParameters { .. } => Self::Rejected {
                status: 400,
                message,
            },
            CoordinatorError::Encoding { .. }
            | CoordinatorError::Aggregation { .. }
            | CoordinatorError::InvalidQuorum => Self::Server {
                status: 500,
                message,
            },
        }
    }
}
