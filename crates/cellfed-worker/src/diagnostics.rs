//! Periodic diagnostics: sample from the local model and score the result.
//!
//! This path only observes. Its output never feeds back into training, and
//! its failures are logged by the caller rather than propagated.

use std::path::{Path, PathBuf};

use cellfed_eval::ValidityOracle;
use cellfed_model::BigramModel;
use cellfed_sim::csv::save_trace;
use cellfed_types::{Event, EventTag, UeId, WorkerId};
use rand::Rng;
use tracing::info;

use crate::error::WorkerError;

/// Timestamp step between sampled messages. The model does not predict
/// timing, so sampled traces carry evenly spaced mock timestamps.
pub const MOCK_TIME_STEP: f64 = 0.1;

/// Result of one diagnostic pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticReport {
    /// Global round the pass was triggered by.
    pub round: u64,
    /// Sequences sampled.
    pub sequences: usize,
    /// Fraction accepted by the validity oracle.
    pub validity: f64,
    /// Where the sampled trace was written.
    pub path: PathBuf,
}

/// Sample `count` sequences of at most `len` messages each.
pub fn sample_sequences(
    model: &BigramModel,
    rng: &mut impl Rng,
    count: usize,
    len: usize,
) -> Vec<Vec<EventTag>> {
    (0..count).map(|_| model.sample(rng, len)).collect()
}

/// Lay sampled sequences out as a trace: sequence `i` belongs to
/// `UE_GEN_i`, and each sequence's timestamps start at zero.
pub fn sequences_to_events(sequences: &[Vec<EventTag>]) -> Vec<Event> {
    sequences
        .iter()
        .enumerate()
        .flat_map(|(i, seq)| {
            let ue_id = UeId::generated(i);
            let mut t = 0.0;
            seq.iter()
                .map(|message| {
                    let event = Event {
                        timestamp: t,
                        ue_id: ue_id.clone(),
                        message: *message,
                    };
                    t += MOCK_TIME_STEP;
                    event
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// `gen_data_{worker}_round{round}.csv` under `dir`.
pub fn diagnostic_path(dir: &Path, worker_id: &WorkerId, round: u64) -> PathBuf {
    dir.join(format!("gen_data_{worker_id}_round{round}.csv"))
}

/// Sample, score, and save one diagnostic trace.
pub fn run_diagnostics(
    model: &BigramModel,
    oracle: &ValidityOracle,
    rng: &mut impl Rng,
    settings: &DiagnosticSettings<'_>,
    round: u64,
) -> Result<DiagnosticReport, WorkerError> {
    let sequences = sample_sequences(model, rng, settings.sequences, settings.sequence_len);
    let validity = oracle.score(&sequences);
    let path = diagnostic_path(settings.output_dir, settings.worker_id, round);
    save_trace(&path, &sequences_to_events(&sequences))?;

    info!(
        worker_id = %settings.worker_id,
        round,
        sequences = sequences.len(),
        validity,
        path = %path.display(),
        "diagnostic sample written"
    );
    Ok(DiagnosticReport {
        round,
        sequences: sequences.len(),
        validity,
        path,
    })
}

/// What to sample and where to put it.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticSettings<'a> {
    /// Owner of the output file name.
    pub worker_id: &'a WorkerId,
    /// Output directory.
    pub output_dir: &'a Path,
    /// Sequences per pass.
    pub sequences: usize,
    /// Messages per sequence, at most.
    pub sequence_len: usize,
}
