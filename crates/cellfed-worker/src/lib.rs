//! Federated training worker for the cellfed workspace.
//!
//! A worker holds a locally generated corpus that never leaves the
//! process. Each round it pulls the global model from the coordinator,
//! trains it on the corpus, and pushes the result back with its sample
//! count. Every few rounds it samples from the local model and scores the
//! samples for protocol validity.
//!
//! # Modules
//!
//! - [`worker`] -- The training loop with retry and liveness handling.
//! - [`client`] -- HTTP and in-process links to the coordinator.
//! - [`diagnostics`] -- Sampling, scoring, and sample export.
//! - [`config`] -- Environment configuration.
//! - [`error`] -- Error types and retry classification.

pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod worker;

pub use client::{CoordinatorLink, HttpLink};
pub use config::WorkerConfig;
pub use error::WorkerError;
pub use worker::{Worker, WorkerSummary};
