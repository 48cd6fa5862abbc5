//! Bigram validity oracle.
//!
//! The oracle decides whether a message sequence is a plausible output of
//! the UE state machine without replaying state. It is bootstrapped by
//! simulating many full `IDLE -> ... -> IDLE` cycles and recording every
//! consecutive `(previous, current)` pair, with [`Predecessor::Start`]
//! standing in for the message before the first one.
//!
//! This is a sampling-based approximation of language membership and is
//! lossy in both directions:
//!
//! - it can under-reject: a pair never seen during bootstrap is rejected
//!   even if reachable (unlikely with the default sample size);
//! - it over-accepts: any two data-transfer messages in a row are accepted
//!   unconditionally, and pairs are checked without context, so a sequence
//!   can be accepted although no single walk produces it.
//!
//! Each bootstrap cycle starts from `Start`, so the wrap-around pair
//! `DETACH_ACCEPT -> RRC_CONNECTION_REQUEST` is never recorded and a
//! sequence spanning two cycles is rejected. For exact checking use
//! [`crate::replay`].

use std::collections::{BTreeMap, BTreeSet};

use cellfed_sim::UeStateMachine;
use cellfed_types::{EventTag, UeId, UeState};
use rand::Rng;
use serde::Serialize;
use tracing::debug;

/// Number of bootstrap cycles used when the caller has no preference.
pub const DEFAULT_BOOTSTRAP_ITERATIONS: usize = 1000;

/// The message preceding another in a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Predecessor {
    /// Sentinel for the first message of a sequence.
    Start,
    /// A real message.
    Tag(EventTag),
}

/// Set of observed `(predecessor, successor)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionTable {
    successors: BTreeMap<Predecessor, BTreeSet<EventTag>>,
}

impl TransitionTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            successors: BTreeMap::new(),
        }
    }

    /// Record a pair.
    pub fn insert(&mut self, prev: Predecessor, curr: EventTag) {
        self.successors.entry(prev).or_default().insert(curr);
    }

    /// Whether the pair was recorded.
    pub fn contains(&self, prev: Predecessor, curr: EventTag) -> bool {
        self.successors
            .get(&prev)
            .is_some_and(|set| set.contains(&curr))
    }

    /// Recorded successors of `prev`, if any.
    pub fn successors(&self, prev: Predecessor) -> Option<&BTreeSet<EventTag>> {
        self.successors.get(&prev)
    }

    /// Total number of distinct pairs.
    pub fn pair_count(&self) -> usize {
        self.successors.values().map(BTreeSet::len).sum()
    }

    /// Predecessors with at least one recorded successor.
    pub fn predecessors(&self) -> impl Iterator<Item = Predecessor> + '_ {
        self.successors.keys().copied()
    }
}

/// A rejected pair within a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Index of the offending message in the sequence.
    pub index: usize,
    /// The message before it (or `Start`).
    pub prev: Predecessor,
    /// The offending message.
    pub curr: EventTag,
}

/// Scores message sequences against a bootstrapped [`TransitionTable`].
#[derive(Debug, Clone)]
pub struct ValidityOracle {
    table: TransitionTable,
}

impl ValidityOracle {
    /// Build the transition table by simulating `iterations` full cycles.
    pub fn bootstrap(iterations: usize, rng: &mut impl Rng) -> Self {
        let mut table = TransitionTable::new();

        for _ in 0..iterations {
            let mut ue = UeStateMachine::new(UeId::simulated(0));
            let mut prev = Predecessor::Start;
            loop {
                let curr = ue.advance(rng);
                table.insert(prev, curr);
                prev = Predecessor::Tag(curr);
                if ue.state() == UeState::Idle {
                    break;
                }
            }
        }

        debug!(
            iterations,
            pairs = table.pair_count(),
            "validity oracle bootstrapped"
        );
        Self { table }
    }

    /// Use an existing table.
    pub const fn from_table(table: TransitionTable) -> Self {
        Self { table }
    }

    /// The bootstrapped table.
    pub const fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Whether a single pair is acceptable, including the data-transfer
    /// relaxation.
    pub fn accepts_pair(&self, prev: Predecessor, curr: EventTag) -> bool {
        if self.table.contains(prev, curr) {
            return true;
        }
        matches!(prev, Predecessor::Tag(p) if p.is_data_transfer()) && curr.is_data_transfer()
    }

    /// The first rejected pair in `sequence`, if any.
    pub fn first_violation(&self, sequence: &[EventTag]) -> Option<Violation> {
        let mut prev = Predecessor::Start;
        for (index, &curr) in sequence.iter().enumerate() {
            if !self.accepts_pair(prev, curr) {
                return Some(Violation { index, prev, curr });
            }
            prev = Predecessor::Tag(curr);
        }
        None
    }

    /// Whether every pair in `sequence` is acceptable. The empty sequence
    /// is vacuously valid.
    pub fn is_valid(&self, sequence: &[EventTag]) -> bool {
        self.first_violation(sequence).is_none()
    }

    /// Fraction of valid sequences, or `0.0` when there are none.
    pub fn score<I, S>(&self, sequences: I) -> f64
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[EventTag]>,
    {
        crate::fraction_where(sequences, |seq| self.is_valid(seq))
    }
}
