//! Synthetic trace generation over a pool of UEs.
//!
//! Each step picks one UE uniformly at random and advances it. Timestamps
//! start at a fixed baseline and grow by a uniform inter-arrival time drawn
//! from `[0.01, 0.5)` seconds, so the log is strictly increasing in
//! emission order. There is no fairness guarantee: in a short run some UEs
//! may never be picked.

use std::collections::BTreeMap;

use cellfed_types::{Event, EventTag, UeId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ue::UeStateMachine;

/// Lower bound (inclusive) of the inter-arrival time in seconds.
pub const MIN_INTER_ARRIVAL: f64 = 0.01;

/// Upper bound (exclusive) of the inter-arrival time in seconds.
pub const MAX_INTER_ARRIVAL: f64 = 0.5;

/// Parameters of a generated trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Number of UEs in the pool.
    #[serde(default = "default_ue_count")]
    pub ue_count: usize,

    /// Number of steps to run; each step emits exactly one event.
    #[serde(default = "default_event_count")]
    pub event_count: usize,

    /// Timestamp the first inter-arrival time is added to.
    #[serde(default = "default_baseline_timestamp")]
    pub baseline_timestamp: f64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            ue_count: default_ue_count(),
            event_count: default_event_count(),
            baseline_timestamp: default_baseline_timestamp(),
        }
    }
}

const fn default_ue_count() -> usize {
    100
}

const fn default_event_count() -> usize {
    5000
}

const fn default_baseline_timestamp() -> f64 {
    1000.0
}

/// Drives a pool of [`UeStateMachine`]s to produce an event log.
#[derive(Debug, Clone)]
pub struct TraceGenerator {
    config: TraceConfig,
}

impl TraceGenerator {
    /// Create a generator for the given configuration.
    pub const fn new(config: TraceConfig) -> Self {
        Self { config }
    }

    /// The configuration this generator runs with.
    pub const fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Generate a trace, returning events in emission order.
    ///
    /// A fresh pool of idle UEs (`UE_0` .. `UE_{n-1}`) is created for each
    /// call. An empty pool yields an empty trace.
    pub fn generate(&self, rng: &mut impl Rng) -> Vec<Event> {
        let TraceConfig {
            ue_count,
            event_count,
            baseline_timestamp,
        } = self.config;

        info!(ue_count, event_count, "generating control-plane trace");

        let mut ues: Vec<UeStateMachine> = (0..ue_count)
            .map(|i| UeStateMachine::new(UeId::simulated(i)))
            .collect();
        if ues.is_empty() {
            return Vec::new();
        }

        let mut events = Vec::with_capacity(event_count);
        let mut timestamp = baseline_timestamp;

        for _ in 0..event_count {
            let pick = rng.random_range(0..ues.len());
            let Some(ue) = ues.get_mut(pick) else {
                continue;
            };
            let message = ue.advance(rng);
            timestamp += rng.random_range(MIN_INTER_ARRIVAL..MAX_INTER_ARRIVAL);
            events.push(Event {
                timestamp,
                ue_id: ue.id().clone(),
                message,
            });
        }

        debug!(
            events = events.len(),
            last_timestamp = timestamp,
            "trace generation finished"
        );
        events
    }
}

/// Group a trace into per-UE message sequences.
///
/// Within each UE, events are ordered by timestamp; ties keep their input
/// order.
pub fn group_by_ue(events: &[Event]) -> BTreeMap<UeId, Vec<EventTag>> {
    let mut grouped: BTreeMap<UeId, Vec<&Event>> = BTreeMap::new();
    for event in events {
        grouped.entry(event.ue_id.clone()).or_default().push(event);
    }

    grouped
        .into_iter()
        .map(|(ue_id, mut ue_events)| {
            ue_events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
            let messages = ue_events.into_iter().map(|e| e.message).collect();
            (ue_id, messages)
        })
        .collect()
}
