//! Shared application state for the coordinator HTTP server.

use std::sync::Arc;

use cellfed_model::ParameterBlob;

use crate::aggregator::Coordinator;

/// The coordinator specialised to the workspace's parameter format.
pub type BlobCoordinator = Coordinator<ParameterBlob>;

/// State shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The aggregation coordinator. Shared with the staleness watchdog.
    pub coordinator: Arc<BlobCoordinator>,
}

impl AppState {
    /// Wrap a coordinator for serving.
    pub const fn new(coordinator: Arc<BlobCoordinator>) -> Self {
        Self { coordinator }
    }
}
