//! Federated-averaging coordinator for the cellfed workspace.
//!
//! Workers pull the global model, train locally, and push updates back.
//! Once a quorum of updates has arrived the coordinator replaces the
//! global model with their sample-weighted mean and starts the next round.
//!
//! # Modules
//!
//! - [`aggregator`] -- The [`Coordinator`] and its round state.
//! - [`config`] -- YAML and environment configuration.
//! - [`handlers`], [`router`], [`server`] -- The HTTP/JSON surface.
//! - [`state`] -- State shared by the handlers.
//! - [`error`] -- [`CoordinatorError`] and its HTTP mapping.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use aggregator::{AggregationSettings, Coordinator, GlobalSnapshot, StalePolicy, Submission};
pub use config::{ConfigError, CoordinatorConfig};
pub use error::CoordinatorError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, spawn_server, spawn_staleness_watchdog, start_server};
pub use state::{AppState, BlobCoordinator};
