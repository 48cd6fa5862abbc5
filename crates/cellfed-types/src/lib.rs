//! Shared type definitions for the cellfed workspace.
//!
//! This crate is the single source of truth for the control-plane message
//! vocabulary, the UE protocol states, identifiers, and the JSON payloads
//! exchanged between training workers and the aggregation coordinator.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed identifiers for UEs and workers
//! - [`enums`] -- Event tags, UE states, and submission statuses
//! - [`structs`] -- Trace events and coordinator wire payloads

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{EventTag, SubmitStatus, UeState, UnknownEventTag};
pub use ids::{UeId, WorkerId};
pub use structs::{CoordinatorStatus, Event, GlobalParameters, SubmitReply, UpdateSubmission};
