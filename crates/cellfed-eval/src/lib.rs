//! Scoring of control-plane traces for the cellfed workspace.
//!
//! # Modules
//!
//! - [`validity`] -- Bigram validity oracle bootstrapped from the simulator.
//! - [`replay`] -- Exact validity by replaying the UE state machine.
//! - [`fidelity`] -- Inter-arrival times and the two-sample KS statistic.
//!
//! [`evaluate`] combines all three over a pair of traces.

pub mod fidelity;
pub mod replay;
pub mod validity;

use cellfed_sim::group_by_ue;
use cellfed_types::{Event, EventTag};
use serde::Serialize;
use tracing::info;

pub use fidelity::{inter_arrival_times, ks_statistic, temporal_fidelity};
pub use replay::{replay_score, replay_violation, replays_cleanly};
pub use validity::{
    DEFAULT_BOOTSTRAP_ITERATIONS, Predecessor, TransitionTable, ValidityOracle, Violation,
};

/// Summary of a generated trace, compared against a real one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Per-UE sequences found in the generated trace.
    pub sequences: usize,
    /// Fraction accepted by the bigram oracle.
    pub bigram_validity: f64,
    /// Fraction that replay cleanly through the state machine.
    pub replay_validity: f64,
    /// KS distance between inter-arrival time distributions. Lower is
    /// better; `1.0` when either trace has no inter-arrival times.
    pub ks_distance: f64,
}

/// Score `generated` for semantic validity and for timing against `real`.
pub fn evaluate(real: &[Event], generated: &[Event], oracle: &ValidityOracle) -> EvaluationReport {
    let sequences: Vec<Vec<EventTag>> = group_by_ue(generated).into_values().collect();

    let report = EvaluationReport {
        sequences: sequences.len(),
        bigram_validity: oracle.score(&sequences),
        replay_validity: replay_score(&sequences),
        ks_distance: temporal_fidelity(real, generated),
    };

    info!(
        sequences = report.sequences,
        bigram_validity = report.bigram_validity,
        replay_validity = report.replay_validity,
        ks_distance = report.ks_distance,
        "trace evaluated"
    );
    report
}

/// Fraction of `items` satisfying `pred`, or `0.0` for no items.
pub(crate) fn fraction_where<I, S, F>(items: I, mut pred: F) -> f64
where
    I: IntoIterator<Item = S>,
    S: AsRef<[EventTag]>,
    F: FnMut(&[EventTag]) -> bool,
{
    let (mut total, mut hits) = (0_usize, 0_usize);
    for item in items {
        total = total.saturating_add(1);
        if pred(item.as_ref()) {
            hits = hits.saturating_add(1);
        }
    }
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let fraction = hits as f64 / total as f64;
    fraction
}
