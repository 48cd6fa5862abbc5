//! UE control-plane simulation for the cellfed workspace.
//!
//! # Modules
//!
//! - [`ue`] -- Per-UE protocol state machine with one probabilistic branch
//!   in the connected state.
//! - [`trace`] -- Drives a pool of UEs to produce a timestamped event log.
//! - [`csv`] -- Reads and writes traces in the `Timestamp,UE_ID,Message`
//!   tabular format.
//! - [`error`] -- Error types for trace I/O.
//!
//! Every function that draws random numbers takes the generator as an
//! argument, so callers choose between a seeded generator (tests,
//! reproducible datasets) and the thread-local one.

pub mod csv;
pub mod error;
pub mod trace;
pub mod ue;

pub use error::SimError;
pub use trace::{TraceConfig, TraceGenerator, group_by_ue};
pub use ue::UeStateMachine;
