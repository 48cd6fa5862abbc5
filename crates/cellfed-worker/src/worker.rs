//! The training loop.
//!
//! A worker generates its local corpus once, then repeats
//! fetch -> train -> submit -> pause until the configured global round is
//! observed:
//!
//! ```text
//! fetch (retry) --> load --> train N epochs --> submit (retry) --> pause
//!      ^                                                             |
//!      +------------------------ diagnostics? <----------------------+
//! ```
//!
//! Transient failures (unreachable coordinator, 5xx) retry the same step
//! after a fixed delay, forever; past a threshold each further failure is
//! logged as a liveness fault. Rejections and unloadable parameters are
//! logged and the round starts over from a fresh fetch.

use cellfed_coordinator::{GlobalSnapshot, Submission};
use cellfed_eval::ValidityOracle;
use cellfed_model::{BigramModel, ParameterBlob, TrainingConfig};
use cellfed_sim::TraceGenerator;
use cellfed_sim::csv::save_trace;
use cellfed_types::{EventTag, SubmitReply, SubmitStatus};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, error, info, warn};

use crate::client::CoordinatorLink;
use crate::config::WorkerConfig;
use crate::diagnostics::{DiagnosticSettings, run_diagnostics};
use crate::error::WorkerError;

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Last global round observed.
    pub final_round: u64,
    /// Submissions the coordinator accepted.
    pub submissions: u64,
    /// Submissions that completed a round.
    pub aggregations_triggered: u64,
    /// Submissions discarded as stale.
    pub stale_replies: u64,
    /// Diagnostic traces written.
    pub diagnostics_written: u64,
}

/// A federated training worker.
#[derive(Debug)]
pub struct Worker {
    config: WorkerConfig,
    link: CoordinatorLink,
    corpus: Vec<EventTag>,
    model: BigramModel,
    oracle: ValidityOracle,
    rng: SmallRng,
    consecutive_failures: u32,
    last_evaluated_round: u64,
    summary: WorkerSummary,
}

impl Worker {
    /// Generate the local corpus and prepare the local model.
    ///
    /// The corpus is written to `local_data_{worker}.csv` when
    /// [`WorkerConfig::save_corpus`] is set.
    pub fn new(config: WorkerConfig, link: CoordinatorLink) -> Result<Self, WorkerError> {
        let mut rng = config
            .seed
            .map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);

        let events = TraceGenerator::new(config.corpus.clone()).generate(&mut rng);
        if config.save_corpus {
            let path = config
                .output_dir
                .join(format!("local_data_{}.csv", config.worker_id));
            save_trace(&path, &events)?;
        }
        let corpus: Vec<EventTag> = events.into_iter().map(|e| e.message).collect();
        info!(
            worker_id = %config.worker_id,
            samples = corpus.len(),
            coordinator = link.describe(),
            "local corpus generated"
        );

        let oracle = ValidityOracle::bootstrap(config.oracle_iterations, &mut rng);

        Ok(Self {
            config,
            link,
            corpus,
            model: BigramModel::new(TrainingConfig::default()),
            oracle,
            rng,
            consecutive_failures: 0,
            last_evaluated_round: 0,
            summary: WorkerSummary::default(),
        })
    }

    /// The local corpus, in trace order.
    pub fn corpus(&self) -> &[EventTag] {
        &self.corpus
    }

    /// Transport failures since the last successful call.
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Counters so far.
    pub const fn summary(&self) -> WorkerSummary {
        self.summary
    }

    /// Run rounds until [`WorkerConfig::max_rounds`] is observed.
    ///
    /// Without a round limit this only returns if the process is stopped.
    pub async fn run(&mut self) -> WorkerSummary {
        info!(
            worker_id = %self.config.worker_id,
            max_rounds = ?self.config.max_rounds,
            "entering training loop"
        );

        loop {
            let snapshot = match self.fetch().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    self.restart_round("fetch", &e).await;
                    continue;
                }
            };
            self.summary.final_round = snapshot.round;

            if self.config.max_rounds.is_some_and(|max| snapshot.round >= max) {
                info!(
                    worker_id = %self.config.worker_id,
                    round = snapshot.round,
                    "target round reached, stopping"
                );
                return self.summary;
            }

            if let Err(e) = self.model.load(&snapshot.parameters) {
                self.restart_round("load", &WorkerError::from(e)).await;
                continue;
            }
            self.train_local();

            let submission = Submission {
                worker_id: self.config.worker_id.clone(),
                parameters: self.model.parameters(),
                sample_count: u64::try_from(self.corpus.len()).unwrap_or(u64::MAX),
                based_on_round: Some(snapshot.round),
            };
            let reply = match self.submit(submission).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.restart_round("submit", &e).await;
                    continue;
                }
            };
            self.record_reply(reply);

            tokio::time::sleep(self.config.round_pause).await;
            self.maybe_run_diagnostics(reply.round);
        }
    }

    fn train_local(&mut self) {
        for epoch in 0..self.config.epochs_per_round {
            let stats = self.model.train_epoch(&self.corpus);
            info!(
                worker_id = %self.config.worker_id,
                epoch,
                batches = stats.batches,
                loss = stats.loss,
                "local epoch finished"
            );
        }
    }

    fn record_reply(&mut self, reply: SubmitReply) {
        info!(
            worker_id = %self.config.worker_id,
            status = %reply.status,
            round = reply.round,
            "update submitted"
        );
        self.summary.final_round = reply.round;
        match reply.status {
            SubmitStatus::Waiting => {
                self.summary.submissions = self.summary.submissions.saturating_add(1);
            }
            SubmitStatus::Aggregated => {
                self.summary.submissions = self.summary.submissions.saturating_add(1);
                self.summary.aggregations_triggered =
                    self.summary.aggregations_triggered.saturating_add(1);
            }
            SubmitStatus::Stale => {
                self.summary.stale_replies = self.summary.stale_replies.saturating_add(1);
            }
        }
    }

    /// Sample and score the local model once per newly completed round
    /// that is a multiple of the diagnostic interval.
    fn maybe_run_diagnostics(&mut self, round: u64) {
        let every = self.config.eval_every_rounds;
        if every == 0 || round == 0 || round <= self.last_evaluated_round {
            return;
        }
        if round.checked_rem(every) != Some(0) {
            return;
        }
        self.last_evaluated_round = round;

        let settings = DiagnosticSettings {
            worker_id: &self.config.worker_id,
            output_dir: &self.config.output_dir,
            sequences: self.config.eval_sequences,
            sequence_len: self.config.eval_sequence_len,
        };
        match run_diagnostics(&self.model, &self.oracle, &mut self.rng, &settings, round) {
            Ok(_) => {
                self.summary.diagnostics_written = self.summary.diagnostics_written.saturating_add(1);
            }
            Err(e) => warn!(
                worker_id = %self.config.worker_id,
                round,
                error = %e,
                "diagnostics failed"
            ),
        }
    }

    async fn fetch(&mut self) -> Result<GlobalSnapshot<ParameterBlob>, WorkerError> {
        loop {
            match self.link.fetch().await {
                Ok(snapshot) => {
                    self.consecutive_failures = 0;
                    debug!(round = snapshot.round, "global model fetched");
                    return Ok(snapshot);
                }
                Err(e) if e.is_transient() => self.back_off("fetch", &e).await,
                Err(e) => return Err(e),
            }
        }
    }

    async fn submit(
        &mut self,
        submission: Submission<ParameterBlob>,
    ) -> Result<SubmitReply, WorkerError> {
        loop {
            match self.link.submit(submission.clone()).await {
                Ok(reply) => {
                    self.consecutive_failures = 0;
                    return Ok(reply);
                }
                Err(e) if e.is_transient() => self.back_off("submit", &e).await,
                Err(e) => return Err(e),
            }
        }
    }

    async fn back_off(&mut self, step: &'static str, err: &WorkerError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let failures = self.consecutive_failures;
        let threshold = self.config.liveness_fault_after;

        if threshold > 0 && failures >= threshold {
            error!(
                worker_id = %self.config.worker_id,
                step,
                consecutive_failures = failures,
                error = %err,
                "liveness fault: coordinator unreachable, still retrying"
            );
        } else {
            warn!(
                worker_id = %self.config.worker_id,
                step,
                consecutive_failures = failures,
                retry_in_ms = self.config.retry_delay.as_millis(),
                error = %err,
                "transient failure, retrying"
            );
        }
        tokio::time::sleep(self.config.retry_delay).await;
    }

    async fn restart_round(&self, step: &'static str, err: &WorkerError) {
        warn!(
            worker_id = %self.config.worker_id,
            step,
            error = %err,
            "request not retryable, restarting round"
        );
        tokio::time::sleep(self.config.retry_delay).await;
    }
}
