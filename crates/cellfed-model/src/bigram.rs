//! Local next-message model.
//!
//! A bigram language model over the token vocabulary: one row of logits
//! per previous token, softmax over the next. Training flattens the local
//! corpus into one token stream (prefixed with [`BOS`]) and runs minibatch
//! SGD on cross-entropy over sliding blocks, the same windowing a
//! transformer would use. The model is deliberately small; the workspace
//! treats its parameters as an opaque [`ParameterBlob`].

use cellfed_types::EventTag;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModelError;
use crate::params::{ModelParameters, ParameterBlob};
use crate::tokenizer::{BOS, VOCAB_SIZE, decode_token, encode};

/// Name of the logit matrix inside a [`ParameterBlob`].
pub const WEIGHT_TENSOR: &str = "bigram.weight";

/// Tokens per training block.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Blocks per optimizer step.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// SGD step size.
pub const DEFAULT_LEARNING_RATE: f64 = 0.5;

type Row = [f32; VOCAB_SIZE];

/// Windowing and optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Tokens per block. A corpus no longer than this trains nothing.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Blocks per step; consecutive blocks start one token apart.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// SGD step size.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
        }
    }
}

const fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

const fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

/// Outcome of one pass over the corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochStats {
    /// Optimizer steps taken. Zero when the corpus is too short.
    pub batches: usize,
    /// Sum of the per-batch mean cross-entropy losses.
    pub loss: f64,
}

/// Bigram next-token model.
#[derive(Debug, Clone)]
pub struct BigramModel {
    weights: Vec<Row>,
    training: TrainingConfig,
}

impl BigramModel {
    /// A model with all-zero logits (uniform predictions).
    pub fn new(training: TrainingConfig) -> Self {
        Self {
            weights: vec![[0.0; VOCAB_SIZE]; VOCAB_SIZE],
            training,
        }
    }

    /// A model with logits drawn uniformly from `[-scale, scale)` by a
    /// generator seeded with `seed`.
    pub fn initialized(seed: u64, scale: f32, training: TrainingConfig) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut model = Self::new(training);
        let scale = scale.abs();
        if scale > 0.0 {
            for row in &mut model.weights {
                for w in row.iter_mut() {
                    *w = rng.random_range(-scale..scale);
                }
            }
        }
        model
    }

    /// Parameters of a freshly initialised model, for seeding a
    /// coordinator.
    pub fn initial_parameters(seed: u64, scale: f32) -> ParameterBlob {
        Self::initialized(seed, scale, TrainingConfig::default()).parameters()
    }

    /// Training settings in use.
    pub const fn training(&self) -> &TrainingConfig {
        &self.training
    }

    /// Export the logit matrix, row-major.
    pub fn parameters(&self) -> ParameterBlob {
        let flat = self.weights.iter().flatten().copied().collect();
        let mut blob = ParameterBlob::new();
        blob.insert(WEIGHT_TENSOR, flat);
        blob
    }

    /// Replace the logit matrix with `params`.
    pub fn load(&mut self, params: &ParameterBlob) -> Result<(), ModelError> {
        let template = self.parameters();
        if !template.is_compatible(params) {
            return Err(ModelError::Incompatible {
                reason: format!(
                    "expected a single `{WEIGHT_TENSOR}` tensor of {} values",
                    template.len()
                ),
            });
        }
        let flat = params.get(WEIGHT_TENSOR).unwrap_or_default();
        for (row, chunk) in self.weights.iter_mut().zip(flat.chunks_exact(VOCAB_SIZE)) {
            row.copy_from_slice(chunk);
        }
        Ok(())
    }

    /// Next-token distribution after `prev`. Unknown ids get a uniform
    /// distribution.
    pub fn probabilities(&self, prev: usize) -> Vec<f64> {
        self.weights.get(prev).map_or_else(
            || {
                #[allow(clippy::cast_precision_loss)]
                let p = 1.0 / VOCAB_SIZE as f64;
                vec![p; VOCAB_SIZE]
            },
            softmax,
        )
    }

    /// One epoch of minibatch SGD over `corpus`.
    ///
    /// Batch starts advance by `batch_size` tokens, and each batch holds up
    /// to `batch_size` blocks starting one token apart. A corpus that does
    /// not exceed one block is a no-op.
    pub fn train_epoch(&mut self, corpus: &[EventTag]) -> EpochStats {
        let mut tokens = Vec::with_capacity(corpus.len().saturating_add(1));
        tokens.push(BOS);
        tokens.extend(encode(corpus));

        let block = self.training.block_size.max(1);
        let batch = self.training.batch_size.max(1);
        let Some(span) = tokens.len().checked_sub(block).filter(|s| *s > 0) else {
            debug!(
                tokens = tokens.len(),
                block_size = block,
                "corpus shorter than one block, skipping epoch"
            );
            return EpochStats::default();
        };

        let mut stats = EpochStats::default();
        for batch_start in (0..span).step_by(batch) {
            let starts = (batch_start..batch_start.saturating_add(batch)).take_while(|s| *s < span);
            let Some(loss) = self.sgd_step(&tokens, starts, block) else {
                break;
            };
            stats.loss += loss;
            stats.batches = stats.batches.saturating_add(1);
        }

        debug!(batches = stats.batches, loss = stats.loss, "epoch finished");
        stats
    }

    /// One optimizer step over the blocks beginning at `starts`. Returns the
    /// mean loss, or `None` if no position was covered.
    fn sgd_step(
        &mut self,
        tokens: &[usize],
        starts: impl Iterator<Item = usize>,
        block: usize,
    ) -> Option<f64> {
        let probs: Vec<Vec<f64>> = self.weights.iter().map(softmax).collect();
        let mut grad = vec![[0.0_f64; VOCAB_SIZE]; VOCAB_SIZE];
        let mut loss = 0.0;
        let mut positions = 0_u32;

        for start in starts {
            let end = start.saturating_add(block).saturating_add(1);
            let Some(window) = tokens.get(start..end) else {
                break;
            };
            for pair in window.windows(2) {
                let [x, y] = pair else { continue };
                let (Some(p), Some(g)) = (probs.get(*x), grad.get_mut(*x)) else {
                    continue;
                };
                loss -= p.get(*y).copied().unwrap_or_default().max(1e-12).ln();
                for (k, (gk, pk)) in g.iter_mut().zip(p).enumerate() {
                    *gk += if k == *y { pk - 1.0 } else { *pk };
                }
                positions = positions.saturating_add(1);
            }
        }

        if positions == 0 {
            return None;
        }
        let n = f64::from(positions);
        let lr = self.training.learning_rate;
        for (row, g) in self.weights.iter_mut().zip(&grad) {
            for (w, gk) in row.iter_mut().zip(g) {
                #[allow(clippy::cast_possible_truncation)]
                let step = (lr * gk / n) as f32;
                *w -= step;
            }
        }
        Some(loss / n)
    }

    /// Sample up to `max_tokens` messages, starting from [`BOS`].
    ///
    /// Drawing [`BOS`] itself emits nothing, so the result can be shorter
    /// than `max_tokens`.
    pub fn sample(&self, rng: &mut impl Rng, max_tokens: usize) -> Vec<EventTag> {
        let mut out = Vec::with_capacity(max_tokens);
        let mut prev = BOS;
        for _ in 0..max_tokens {
            let next = draw(&self.probabilities(prev), rng.random());
            if let Some(tag) = decode_token(next) {
                out.push(tag);
            }
            prev = next;
        }
        out
    }
}

impl Default for BigramModel {
    fn default() -> Self {
        Self::new(TrainingConfig::default())
    }
}

fn softmax(row: &Row) -> Vec<f64> {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = row.iter().map(|w| f64::from(w - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Inverse-CDF draw for a uniform `u` in `[0, 1)`.
fn draw(probs: &[f64], u: f64) -> usize {
    let mut acc = 0.0;
    for (i, p) in probs.iter().enumerate() {
        acc += p;
        if u < acc {
            return i;
        }
    }
    probs.len().saturating_sub(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use cellfed_types::UeId;

    use super::*;

    /// A single UE walked through `cycles` complete attach/detach cycles.
    fn cycles(cycles: usize, seed: u64) -> Vec<EventTag> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut ue = cellfed_sim::UeStateMachine::new(UeId::simulated(0));
        let mut done = 0;
        while done < cycles {
            ue.advance(&mut rng);
            if ue.state() == cellfed_types::UeState::Idle {
                done += 1;
            }
        }
        ue.history().to_vec()
    }

    #[test]
    fn undersized_corpus_is_a_no_op() {
        let mut model = BigramModel::initialized(1, 0.1, TrainingConfig::default());
        let before = model.parameters();
        let corpus = vec![EventTag::RrcConnectionRequest; DEFAULT_BLOCK_SIZE - 1];
        assert_eq!(model.train_epoch(&corpus), EpochStats::default());
        assert_eq!(model.parameters(), before);
    }

    #[test]
    fn training_reduces_loss_and_learns_deterministic_steps() {
        let corpus = cycles(40, 3);
        let mut model = BigramModel::default();
        let first = model.train_epoch(&corpus);
        assert!(first.batches > 0);
        let mut last = first;
        for _ in 0..20 {
            last = model.train_epoch(&corpus);
        }
        assert!(last.loss < first.loss, "{} !< {}", last.loss, first.loss);

        let after_auth = model.probabilities(crate::tokenizer::encode_tag(EventTag::AuthRequest));
        let best = after_auth
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(decode_token(best), Some(EventTag::AuthResponse));
    }

    #[test]
    fn parameters_round_trip_through_load() {
        let source = BigramModel::initialized(9, 0.5, TrainingConfig::default());
        let mut target = BigramModel::default();
        target.load(&source.parameters()).unwrap();
        assert_eq!(target.parameters(), source.parameters());
        assert_eq!(
            source.parameters().get(WEIGHT_TENSOR).unwrap().len(),
            VOCAB_SIZE * VOCAB_SIZE
        );
    }

    #[test]
    fn load_rejects_wrong_shape() {
        let mut blob = ParameterBlob::new();
        blob.insert(WEIGHT_TENSOR, vec![0.0; 4]);
        let err = BigramModel::default().load(&blob).unwrap_err();
        assert!(matches!(err, ModelError::Incompatible { .. }));
    }

    #[test]
    fn seeded_initialisation_is_reproducible() {
        assert_eq!(
            BigramModel::initial_parameters(7, 0.02),
            BigramModel::initial_parameters(7, 0.02)
        );
        assert_ne!(
            BigramModel::initial_parameters(7, 0.02),
            BigramModel::initial_parameters(8, 0.02)
        );
    }

    #[test]
    fn sampling_respects_the_length_cap() {
        let model = BigramModel::initialized(2, 1.0, TrainingConfig::default());
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..20 {
            assert!(model.sample(&mut rng, 20).len() <= 20);
        }
        assert!(model.sample(&mut rng, 0).is_empty());
    }

    #[test]
    fn inverse_cdf_draw() {
        let probs = [0.25, 0.5, 0.25];
        assert_eq!(draw(&probs, 0.0), 0);
        assert_eq!(draw(&probs, 0.3), 1);
        assert_eq!(draw(&probs, 0.99), 2);
    }
}
