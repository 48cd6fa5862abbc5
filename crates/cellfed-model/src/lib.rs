//! Model parameters for the cellfed workspace.
//!
//! # Modules
//!
//! - [`params`] -- The [`ModelParameters`] abstraction, the
//!   [`ParameterBlob`] tensor map, and FedAvg.
//! - [`wire`] -- Base64 transport encoding.
//! - [`tokenizer`] -- Token ids for the message vocabulary.
//! - [`bigram`] -- The local next-message model trained by workers.
//! - [`error`] -- Error types.

pub mod bigram;
pub mod error;
pub mod params;
pub mod tokenizer;
pub mod wire;

pub use bigram::{BigramModel, EpochStats, TrainingConfig};
pub use error::ModelError;
pub use params::{ModelParameters, ParameterBlob, federated_average};
pub use wire::{decode_wire, encode_wire};
