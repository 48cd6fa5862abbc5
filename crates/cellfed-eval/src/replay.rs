//! Exact validity by state replay.
//!
//! Unlike the bigram oracle, replay drives the UE protocol state through
//! the whole sequence, starting from `IDLE`. A sequence is valid when every
//! message is one the current state can emit. Consecutive cycles are
//! accepted (`DETACH_ACCEPT` returns the UE to `IDLE`), and there is no
//! data-transfer relaxation beyond what the state machine itself allows.

use cellfed_sim::ue::step_with;
use cellfed_types::{EventTag, UeState};

/// Index of the first message the replayed state cannot emit, if any.
pub fn replay_violation(sequence: &[EventTag]) -> Option<usize> {
    let mut state = UeState::Idle;
    for (index, &tag) in sequence.iter().enumerate() {
        match step_with(state, tag) {
            Some(next) => state = next,
            None => return Some(index),
        }
    }
    None
}

/// Whether the whole sequence replays from `IDLE`.
pub fn replays_cleanly(sequence: &[EventTag]) -> bool {
    replay_violation(sequence).is_none()
}

/// Fraction of sequences that replay cleanly, or `0.0` when there are none.
pub fn replay_score<I, S>(sequences: I) -> f64
where
    I: IntoIterator<Item = S>,
    S: AsRef<[EventTag]>,
{
    crate::fraction_where(sequences, replays_cleanly)
}
