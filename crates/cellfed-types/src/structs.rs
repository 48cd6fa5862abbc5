//! Core data structs: trace events and coordinator wire payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{EventTag, SubmitStatus};
use crate::ids::{UeId, WorkerId};

// ---------------------------------------------------------------------------
// Trace events
// ---------------------------------------------------------------------------

/// One control-plane message in a generated trace.
///
/// Timestamps are decimal seconds. Within a generated log they strictly
/// increase in emission order; a single UE's sub-sequence is only ordered
/// once grouped and sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Emission time in seconds.
    pub timestamp: f64,
    /// The UE that emitted the message.
    pub ue_id: UeId,
    /// The message itself.
    pub message: EventTag,
}

// ---------------------------------------------------------------------------
// Coordinator wire payloads
// ---------------------------------------------------------------------------

/// Reply to `GET /api/global`: a copy of the current global model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalParameters {
    /// Number of aggregation passes completed so far.
    pub round: u64,
    /// Base64-encoded parameter blob.
    pub parameters: String,
}

/// Body of `POST /api/updates`: a locally trained model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSubmission {
    /// The submitting worker.
    pub worker_id: WorkerId,
    /// Base64-encoded parameter blob.
    pub parameters: String,
    /// Size of the local corpus the update was trained on. Must be positive.
    pub sample_count: u64,
    /// The global round the local training started from, if known.
    #[serde(default)]
    pub round: Option<u64>,
}

/// Reply to `POST /api/updates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReply {
    /// Whether the update is pending, aggregated, or was discarded as stale.
    pub status: SubmitStatus,
    /// The global round after the submission was processed.
    pub round: u64,
}

/// Reply to `GET /api/status`: aggregation progress and liveness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    /// Number of aggregation passes completed so far.
    pub round: u64,
    /// Updates accumulated since the last aggregation.
    pub pending: usize,
    /// Updates required to trigger an aggregation.
    pub quorum: usize,
    /// Workers with a pending update, in arrival order. A worker appears
    /// once per pending update.
    pub pending_workers: Vec<WorkerId>,
    /// Accepted submissions since startup.
    pub total_submissions: u64,
    /// Wall-clock time of the last aggregation (or of startup).
    pub last_aggregation_at: DateTime<Utc>,
    /// Seconds since [`Self::last_aggregation_at`]. Grows without bound
    /// while quorum is never reached.
    pub seconds_since_last_aggregation: u64,
}
