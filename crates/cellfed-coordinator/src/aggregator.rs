//! Round-based federated averaging.
//!
//! The [`Coordinator`] owns the global model and the set of updates
//! pending for the current round. A single [`tokio::sync::Mutex`] guards
//! both, plus the bookkeeping counters, so a submission that completes the
//! quorum aggregates under the same guard that appended it. No reader can
//! observe the pending set drained while the global model is still the old
//! one, and exactly one submission per round sees `AGGREGATED`.
//!
//! The lock is never held across I/O. Callers decode parameters before
//! [`Coordinator::submit`] and encode the clone returned by
//! [`Coordinator::fetch`] after it.
//!
//! There is no straggler timeout and no per-round de-duplication of
//! workers: a worker that submits twice in a round is counted twice, and a
//! round that never reaches quorum simply stays open. The second condition
//! is observable through [`CoordinatorStatus::seconds_since_last_aggregation`].

use cellfed_model::{ModelParameters, federated_average};
use cellfed_types::{CoordinatorStatus, SubmitReply, SubmitStatus, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::CoordinatorError;

/// What to do with an update trained from an older global round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Average it in like any other update.
    #[default]
    Accept,
    /// Discard it and reply `STALE`.
    Reject,
}

/// Aggregation parameters fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationSettings {
    /// Number of pending updates that triggers an aggregation. At least 1.
    pub quorum: usize,
    /// Handling of updates tagged with an older round.
    pub stale_policy: StalePolicy,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            quorum: 2,
            stale_policy: StalePolicy::Accept,
        }
    }
}

/// A decoded update, ready to be queued.
#[derive(Debug, Clone)]
pub struct Submission<P> {
    /// The submitting worker.
    pub worker_id: WorkerId,
    /// Locally trained parameters.
    pub parameters: P,
    /// Size of the corpus the update was trained on.
    pub sample_count: u64,
    /// The global round training started from, if the worker said.
    pub based_on_round: Option<u64>,
}

/// A copy of the global model at some round.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSnapshot<P> {
    /// The global parameters.
    pub parameters: P,
    /// Aggregations completed when the copy was taken.
    pub round: u64,
}

#[derive(Debug)]
struct RoundState<P> {
    global: P,
    round: u64,
    pending: Vec<Submission<P>>,
    pending_samples: u64,
    last_aggregation_at: DateTime<Utc>,
    total_submissions: u64,
}

/// Owns the global model and runs FedAvg whenever a quorum of updates has
/// arrived.
#[derive(Debug)]
pub struct Coordinator<P> {
    settings: AggregationSettings,
    state: Mutex<RoundState<P>>,
}

impl<P: ModelParameters> Coordinator<P> {
    /// Create a coordinator at round 0 holding `initial`.
    pub fn new(initial: P, settings: AggregationSettings) -> Result<Self, CoordinatorError> {
        if settings.quorum == 0 {
            return Err(CoordinatorError::InvalidQuorum);
        }
        Ok(Self {
            settings,
            state: Mutex::new(RoundState {
                global: initial,
                round: 0,
                pending: Vec::with_capacity(settings.quorum),
                pending_samples: 0,
                last_aggregation_at: Utc::now(),
                total_submissions: 0,
            }),
        })
    }

    /// Settings this coordinator was built with.
    pub const fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    /// A clone of the current global model and its round.
    pub async fn fetch(&self) -> GlobalSnapshot<P> {
        let state = self.state.lock().await;
        GlobalSnapshot {
            parameters: state.global.clone(),
            round: state.round,
        }
    }

    /// Queue an update, aggregating if it completes the quorum.
    ///
    /// Zero-sample, incompatible, and sample-total-overflowing updates are
    /// rejected before any state changes. A failed aggregation leaves the
    /// round exactly as it was before the call. Under [`StalePolicy::Reject`], an update tagged with a
    /// round other than the current one is discarded with `STALE`.
    pub async fn submit(&self, submission: Submission<P>) -> Result<SubmitReply, CoordinatorError> {
        if submission.sample_count == 0 {
            return Err(CoordinatorError::ZeroSamples {
                worker_id: submission.worker_id,
            });
        }

        let mut state = self.state.lock().await;

        if !state.global.is_compatible(&submission.parameters) {
            return Err(CoordinatorError::Incompatible {
                worker_id: submission.worker_id,
                reason: "parameter layout differs from the global model".to_owned(),
            });
        }

        if let Some(based_on) = submission.based_on_round.filter(|r| *r != state.round) {
            if self.settings.stale_policy == StalePolicy::Reject {
                info!(
                    worker_id = %submission.worker_id,
                    based_on,
                    round = state.round,
                    "discarding stale update"
                );
                return Ok(SubmitReply {
                    status: SubmitStatus::Stale,
                    round: state.round,
                });
            }
            debug!(
                worker_id = %submission.worker_id,
                based_on,
                round = state.round,
                "accepting update trained on an older round"
            );
        }

        let sample_count = submission.sample_count;
        let Some(pending_samples) = state.pending_samples.checked_add(sample_count) else {
            warn!(
                worker_id = %submission.worker_id,
                sample_count,
                pending_samples = state.pending_samples,
                "rejecting update whose sample count overflows the round total"
            );
            return Err(CoordinatorError::SampleOverflow {
                worker_id: submission.worker_id,
            });
        };

        info!(
            worker_id = %submission.worker_id,
            sample_count,
            round = state.round,
            "update received"
        );
        state.pending.push(submission);
        state.pending_samples = pending_samples;
        state.total_submissions = state.total_submissions.saturating_add(1);

        if state.pending.len() < self.settings.quorum {
            return Ok(SubmitReply {
                status: SubmitStatus::Waiting,
                round: state.round,
            });
        }

        if let Err(e) = aggregate(&mut *state) {
            state.pending.pop();
            state.pending_samples = state.pending_samples.saturating_sub(sample_count);
            state.total_submissions = state.total_submissions.saturating_sub(1);
            error!(round = state.round, error = %e, "aggregation failed, update withdrawn");
            return Err(e);
        }
        Ok(SubmitReply {
            status: SubmitStatus::Aggregated,
            round: state.round,
        })
    }

    /// Aggregation progress and round staleness.
    pub async fn status(&self) -> CoordinatorStatus {
        let state = self.state.lock().await;
        let now = Utc::now();
        let since = now.signed_duration_since(state.last_aggregation_at);
        CoordinatorStatus {
            round: state.round,
            pending: state.pending.len(),
            quorum: self.settings.quorum,
            pending_workers: state.pending.iter().map(|s| s.worker_id.clone()).collect(),
            total_submissions: state.total_submissions,
            last_aggregation_at: state.last_aggregation_at,
            seconds_since_last_aggregation: u64::try_from(since.num_seconds()).unwrap_or(0),
        }
    }
}

/// FedAvg over the pending set, then advance the round.
///
/// On failure the pending set and global model are left untouched.
fn aggregate<P: ModelParameters>(state: &mut RoundState<P>) -> Result<(), CoordinatorError> {
    let updates: Vec<(&P, u64)> = state
        .pending
        .iter()
        .map(|s| (&s.parameters, s.sample_count))
        .collect();
    let averaged =
        federated_average(&updates).map_err(|source| CoordinatorError::Aggregation { source })?;
    let total_samples = state.pending_samples;
    let contributors = state.pending.len();

    state.global = averaged;
    state.round = state.round.saturating_add(1);
    state.pending.clear();
    state.pending_samples = 0;
    state.last_aggregation_at = Utc::now();

    info!(
        round = state.round,
        contributors,
        total_samples,
        "aggregation complete, global model updated"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use cellfed_model::{ModelError, ParameterBlob};

    use super::*;

    fn scalar(value: f32) -> ParameterBlob {
        let mut blob = ParameterBlob::new();
        blob.insert("w", vec![value]);
        blob
    }

    fn submission(worker: &str, value: f32, samples: u64) -> Submission<ParameterBlob> {
        Submission {
            worker_id: WorkerId::new(worker),
            parameters: scalar(value),
            sample_count: samples,
            based_on_round: None,
        }
    }

    fn coordinator(quorum: usize, stale_policy: StalePolicy) -> Coordinator<ParameterBlob> {
        Coordinator::new(
            scalar(0.0),
            AggregationSettings {
                quorum,
                stale_policy,
            },
        )
        .unwrap()
    }

    fn w(snapshot: &GlobalSnapshot<ParameterBlob>) -> f32 {
        snapshot.parameters.get("w").unwrap()[0]
    }

    #[tokio::test]
    async fn fetch_before_any_submit_returns_initial_parameters() {
        let coord = coordinator(2, StalePolicy::Accept);
        let snapshot = coord.fetch().await;
        assert_eq!(snapshot.round, 0);
        assert_eq!(snapshot.parameters, scalar(0.0));
    }

    #[tokio::test]
    async fn quorum_triggers_weighted_average() {
        let coord = coordinator(2, StalePolicy::Accept);
        let first = coord.submit(submission("a", 2.0, 30)).await.unwrap();
        assert_eq!(first.status, SubmitStatus::Waiting);
        assert_eq!(first.round, 0);
        assert_eq!(coord.status().await.pending, 1);

        let second = coord.submit(submission("b", 10.0, 70)).await.unwrap();
        assert_eq!(second.status, SubmitStatus::Aggregated);
        assert_eq!(second.round, 1);

        let snapshot = coord.fetch().await;
        assert_eq!(snapshot.round, 1);
        assert!((f64::from(w(&snapshot)) - 7.6).abs() < 1e-5);
        assert_eq!(coord.status().await.pending, 0);
    }

    #[tokio::test]
    async fn zero_samples_are_rejected_without_side_effects() {
        let coord = coordinator(1, StalePolicy::Accept);
        let err = coord.submit(submission("a", 1.0, 0)).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::ZeroSamples { .. }));
        let status = coord.status().await;
        assert_eq!(status.round, 0);
        assert_eq!(status.total_submissions, 0);
    }

    #[tokio::test]
    async fn incompatible_layout_is_rejected() {
        let coord = coordinator(1, StalePolicy::Accept);
        let mut params = ParameterBlob::new();
        params.insert("w", vec![1.0, 2.0]);
        let err = coord
            .submit(Submission {
                worker_id: WorkerId::new("a"),
                parameters: params,
                sample_count: 5,
                based_on_round: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Incompatible { .. }));
        assert_eq!(coord.status().await.pending, 0);
    }

    #[tokio::test]
    async fn stale_updates_follow_policy() {
        let reject = coordinator(1, StalePolicy::Reject);
        reject.submit(submission("a", 1.0, 1)).await.unwrap();
        let mut late = submission("b", 5.0, 1);
        late.based_on_round = Some(0);
        let reply = reject.submit(late.clone()).await.unwrap();
        assert_eq!(reply.status, SubmitStatus::Stale);
        assert_eq!(reply.round, 1);
        assert!((w(&reject.fetch().await) - 1.0).abs() < f32::EPSILON);

        let accept = coordinator(1, StalePolicy::Accept);
        accept.submit(submission("a", 1.0, 1)).await.unwrap();
        let reply = accept.submit(late).await.unwrap();
        assert_eq!(reply.status, SubmitStatus::Aggregated);
        assert_eq!(reply.round, 2);
    }

    #[tokio::test]
    async fn duplicate_workers_count_twice() {
        let coord = coordinator(2, StalePolicy::Accept);
        coord.submit(submission("a", 1.0, 1)).await.unwrap();
        let status = coord.status().await;
        assert_eq!(status.pending_workers, vec![WorkerId::new("a")]);
        let reply = coord.submit(submission("a", 3.0, 1)).await.unwrap();
        assert_eq!(reply.status, SubmitStatus::Aggregated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_quorum_aggregates_exactly_once() {
        const QUORUM: usize = 8;
        let coord = Arc::new(coordinator(QUORUM, StalePolicy::Accept));

        let tasks = (0..QUORUM).map(|i| {
            let coord = Arc::clone(&coord);
            tokio::spawn(async move {
                let sub = submission(&format!("worker-{i}"), 1.0, 10);
                coord.submit(sub).await.unwrap()
            })
        });
        let replies: Vec<SubmitReply> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        let aggregated = replies
            .iter()
            .filter(|r| r.status == SubmitStatus::Aggregated)
            .count();
        assert_eq!(aggregated, 1);
        assert_eq!(
            replies
                .iter()
                .filter(|r| r.status == SubmitStatus::Waiting)
                .count(),
            QUORUM - 1
        );

        let status = coord.status().await;
        assert_eq!(status.round, 1);
        assert_eq!(status.pending, 0);
        assert_eq!(status.total_submissions, 8);
        assert!((w(&coord.fetch().await) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn overflowing_sample_total_is_rejected_and_round_survives() {
        let huge = 9_223_372_036_854_775_808_u64;
        let coord = coordinator(2, StalePolicy::Accept);

        let first = coord.submit(submission("a", 1.0, huge)).await.unwrap();
        assert_eq!(first.status, SubmitStatus::Waiting);

        let err = coord.submit(submission("b", 5.0, huge)).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::SampleOverflow { .. }));
        let status = coord.status().await;
        assert_eq!(status.pending, 1);
        assert_eq!(status.total_submissions, 1);

        let reply = coord.submit(submission("c", 3.0, 10)).await.unwrap();
        assert_eq!(reply.status, SubmitStatus::Aggregated);
        let w = w(&coord.fetch().await);
        assert!((0.99..=3.0).contains(&w), "weights must stay in [0, 1], got {w}");
    }

    /// Parameters that load fine but can never be averaged.
    #[derive(Debug, Clone, PartialEq)]
    struct Unmergeable;

    impl ModelParameters for Unmergeable {
        fn store(&self) -> Result<Vec<u8>, ModelError> {
            Ok(Vec::new())
        }

        fn load(_bytes: &[u8]) -> Result<Self, ModelError> {
            Ok(Self)
        }

        fn is_compatible(&self, _other: &Self) -> bool {
            true
        }

        fn weighted_combine(_parts: &[(&Self, f64)]) -> Result<Self, ModelError> {
            Err(ModelError::EmptyCombination {
                reason: "cannot be combined",
            })
        }
    }

    #[tokio::test]
    async fn failed_aggregation_leaves_round_untouched() {
        let coord = Coordinator::new(
            Unmergeable,
            AggregationSettings {
                quorum: 2,
                stale_policy: StalePolicy::Accept,
            },
        )
        .unwrap();
        let update = |worker: &str| Submission {
            worker_id: WorkerId::new(worker),
            parameters: Unmergeable,
            sample_count: 4,
            based_on_round: None,
        };

        coord.submit(update("a")).await.unwrap();
        let err = coord.submit(update("b")).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Aggregation { .. }));

        let status = coord.status().await;
        assert_eq!(status.round, 0);
        assert_eq!(status.pending, 1);
        assert_eq!(status.total_submissions, 1);
        assert_eq!(status.pending_workers, vec![WorkerId::new("a")]);

        // Retrying the same update does not pile up copies.
        assert!(coord.submit(update("b")).await.is_err());
        assert_eq!(coord.status().await.pending, 1);
    }

    #[test]
    fn zero_quorum_is_refused() {
        let result = Coordinator::new(
            scalar(0.0),
            AggregationSettings {
                quorum: 0,
                stale_policy: StalePolicy::Accept,
            },
        );
        assert!(matches!(result, Err(CoordinatorError::InvalidQuorum)));
    }

    #[test]
    fn stale_policy_parses_lowercase() {
        let policy: StalePolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(policy, StalePolicy::Reject);
    }
}
