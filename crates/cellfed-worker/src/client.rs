//! Link to the aggregation coordinator.
//!
//! Uses enum dispatch rather than a trait object, since async methods are
//! not dyn-compatible. [`CoordinatorLink::Http`] talks to a remote
//! coordinator over its JSON API; [`CoordinatorLink::Local`] calls an
//! in-process coordinator directly, which is how whole federations are
//! simulated in one process.

use std::sync::Arc;

use cellfed_coordinator::{BlobCoordinator, GlobalSnapshot, Submission};
use cellfed_model::{ParameterBlob, decode_wire, encode_wire};
use cellfed_types::{GlobalParameters, SubmitReply, UpdateSubmission};

use crate::error::WorkerError;

/// Where a worker fetches from and submits to.
#[derive(Debug, Clone)]
pub enum CoordinatorLink {
    /// A coordinator reached over HTTP.
    Http(HttpLink),
    /// A coordinator in the same process.
    Local(Arc<BlobCoordinator>),
}

impl CoordinatorLink {
    /// Fetch the current global model.
    pub async fn fetch(&self) -> Result<GlobalSnapshot<ParameterBlob>, WorkerError> {
        match self {
            Self::Http(link) => link.fetch().await,
            Self::Local(coordinator) => Ok(coordinator.fetch().await),
        }
    }

    /// Submit a locally trained update.
    pub async fn submit(
        &self,
        submission: Submission<ParameterBlob>,
    ) -> Result<SubmitReply, WorkerError> {
        match self {
            Self::Http(link) => link.submit(submission).await,
            Self::Local(coordinator) => coordinator
                .submit(submission)
                .await
                .map_err(|e| WorkerError::from_coordinator(&e)),
        }
    }

    /// Human-readable description for logging.
    pub fn describe(&self) -> &str {
        match self {
            Self::Http(link) => link.base_url(),
            Self::Local(_) => "in-process",
        }
    }
}

/// HTTP client for the coordinator's JSON API.
#[derive(Debug, Clone)]
pub struct HttpLink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLink {
    /// Create a client for the coordinator at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Use a preconfigured client (timeouts, proxies).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// The coordinator's base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self) -> Result<GlobalSnapshot<ParameterBlob>, WorkerError> {
        let url = format!("{}/api/global", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkerError::Transport(format!("GET {url} failed: {e}")))?;

        let body: GlobalParameters = read_json(response).await?;
        let parameters = decode_wire(&body.parameters)?;
        Ok(GlobalSnapshot {
            parameters,
            round: body.round,
        })
    }

    async fn submit(
        &self,
        submission: Submission<ParameterBlob>,
    ) -> Result<SubmitReply, WorkerError> {
        let url = format!("{}/api/updates", self.base_url);
        let body = UpdateSubmission {
            worker_id: submission.worker_id,
            parameters: encode_wire(&submission.parameters)?,
            sample_count: submission.sample_count,
            round: submission.based_on_round,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkerError::Transport(format!("POST {url} failed: {e}")))?;

        read_json(response).await
    }
}

/// Check the status, then decode the body.
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, WorkerError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        let code = status.as_u16();
        return Err(if status.is_client_error() {
            WorkerError::Rejected {
                status: code,
                message,
            }
        } else {
            WorkerError::Server {
                status: code,
                message,
            }
        });
    }

    response
        .json()
        .await
        .map_err(|e| WorkerError::Transport(format!("unreadable coordinator reply: {e}")))
}
