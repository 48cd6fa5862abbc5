//! Configuration types for the training worker.
//!
//! All configuration is loaded from environment variables. Only the
//! coordinator URL is required; everything else has a default matching a
//! small local deployment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cellfed_eval::DEFAULT_BOOTSTRAP_ITERATIONS;
use cellfed_sim::TraceConfig;
use cellfed_types::WorkerId;

use crate::error::WorkerError;

/// Complete worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL of the coordinator (e.g. `http://10.0.0.1:8000`).
    pub coordinator_url: String,
    /// Identity reported with every submission.
    pub worker_id: WorkerId,
    /// Shape of the local corpus generated at startup.
    pub corpus: TraceConfig,
    /// Write the local corpus to `local_data_{worker}.csv` in
    /// [`Self::output_dir`].
    pub save_corpus: bool,
    /// Local epochs per round.
    pub epochs_per_round: usize,
    /// Pause after each submission.
    pub round_pause: Duration,
    /// Delay before retrying a failed fetch or submit.
    pub retry_delay: Duration,
    /// Upper bound on a single HTTP request. A request that times out
    /// counts as a transport failure.
    pub request_timeout: Duration,
    /// Consecutive transport failures before a liveness fault is logged.
    pub liveness_fault_after: u32,
    /// Stop once a fetched global round reaches this value. `None` runs
    /// until the process is stopped.
    pub max_rounds: Option<u64>,
    /// Sample and score the local model whenever a completed global round
    /// is a multiple of this. `0` disables diagnostics.
    pub eval_every_rounds: u64,
    /// Sequences sampled per diagnostic.
    pub eval_sequences: usize,
    /// Maximum messages per sampled sequence.
    pub eval_sequence_len: usize,
    /// Bootstrap cycles for the validity oracle.
    pub oracle_iterations: usize,
    /// Directory for corpus and diagnostic CSV files.
    pub output_dir: PathBuf,
    /// Seed for the worker's generator. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl WorkerConfig {
    /// Defaults for everything except the coordinator URL.
    pub fn with_defaults(coordinator_url: impl Into<String>) -> Self {
        Self {
            coordinator_url: coordinator_url.into(),
            worker_id: WorkerId::generate(),
            corpus: TraceConfig {
                ue_count: 50,
                event_count: 2000,
                ..TraceConfig::default()
            },
            save_corpus: true,
            epochs_per_round: 2,
            round_pause: Duration::from_secs(2),
            retry_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            liveness_fault_after: 12,
            max_rounds: None,
            eval_every_rounds: 5,
            eval_sequences: 50,
            eval_sequence_len: 20,
            oracle_iterations: DEFAULT_BOOTSTRAP_ITERATIONS,
            output_dir: PathBuf::from("."),
            seed: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `COORDINATOR_URL` -- coordinator base URL
    ///
    /// Optional variables:
    /// - `WORKER_ID` -- submission identity (default `worker-{uuid}`)
    /// - `LOCAL_UE_COUNT` -- UEs in the local corpus (default 50)
    /// - `LOCAL_EVENT_COUNT` -- events in the local corpus (default 2000)
    /// - `SAVE_CORPUS` -- write the corpus as CSV (default `true`)
    /// - `EPOCHS_PER_ROUND` -- local epochs per round (default 2)
    /// - `ROUND_PAUSE_MS` -- pause after each submission (default 2000)
    /// - `RETRY_DELAY_MS` -- delay before a retry (default 5000)
    /// - `REQUEST_TIMEOUT_MS` -- per-request timeout (default 30000)
    /// - `LIVENESS_FAULT_AFTER` -- failures before a liveness fault (default 12)
    /// - `MAX_ROUNDS` -- stop at this global round (default: never)
    /// - `EVAL_EVERY_ROUNDS` -- diagnostic interval, 0 disables (default 5)
    /// - `EVAL_SEQUENCES` -- sequences per diagnostic (default 50)
    /// - `EVAL_SEQUENCE_LEN` -- messages per sequence (default 20)
    /// - `ORACLE_ITERATIONS` -- validity oracle bootstrap cycles (default 1000)
    /// - `OUTPUT_DIR` -- directory for CSV output (default `.`)
    /// - `WORKER_SEED` -- seed for the worker's generator (default: OS entropy)
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WorkerError> {
        let coordinator_url = lookup("COORDINATOR_URL").ok_or_else(|| {
            WorkerError::Config("missing required env var COORDINATOR_URL".to_owned())
        })?;
        let mut config = Self::with_defaults(coordinator_url.trim_end_matches('/'));

        if let Some(id) = lookup("WORKER_ID") {
            config.worker_id = WorkerId::new(id);
        }
        config.corpus.ue_count = parsed(&lookup, "LOCAL_UE_COUNT", config.corpus.ue_count)?;
        config.corpus.event_count =
            parsed(&lookup, "LOCAL_EVENT_COUNT", config.corpus.event_count)?;
        config.save_corpus = parsed(&lookup, "SAVE_CORPUS", config.save_corpus)?;
        config.epochs_per_round = parsed(&lookup, "EPOCHS_PER_ROUND", config.epochs_per_round)?;
        config.round_pause = millis(&lookup, "ROUND_PAUSE_MS", config.round_pause)?;
        config.retry_delay = millis(&lookup, "RETRY_DELAY_MS", config.retry_delay)?;
        config.request_timeout = millis(&lookup, "REQUEST_TIMEOUT_MS", config.request_timeout)?;
        config.liveness_fault_after =
            parsed(&lookup, "LIVENESS_FAULT_AFTER", config.liveness_fault_after)?;
        config.max_rounds = lookup("MAX_ROUNDS")
            .map(|v| parse_value("MAX_ROUNDS", &v))
            .transpose()?;
        config.eval_every_rounds =
            parsed(&lookup, "EVAL_EVERY_ROUNDS", config.eval_every_rounds)?;
        config.eval_sequences = parsed(&lookup, "EVAL_SEQUENCES", config.eval_sequences)?;
        config.eval_sequence_len = parsed(&lookup, "EVAL_SEQUENCE_LEN", config.eval_sequence_len)?;
        config.oracle_iterations = parsed(&lookup, "ORACLE_ITERATIONS", config.oracle_iterations)?;
        if let Some(dir) = lookup("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        config.seed = lookup("WORKER_SEED")
            .map(|v| parse_value("WORKER_SEED", &v))
            .transpose()?;

        Ok(config)
    }
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, WorkerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| WorkerError::Config(format!("invalid {name}: {e}")))
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, WorkerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name).map_or(Ok(default), |v| parse_value(name, &v))
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration, WorkerError> {
    lookup(name).map_or(Ok(default), |v| {
        parse_value(name, &v).map(Duration::from_millis)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup_from(pairs: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<&str, &str> = pairs.iter().copied().collect();
        move |k| vars.get(k).map(|v| (*v).to_owned())
    }

    #[test]
    fn coordinator_url_is_required() {
        let err = WorkerConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, WorkerError::Config(_)));
    }

    #[test]
    fn defaults_apply() {
        let config =
            WorkerConfig::from_lookup(lookup_from(&[("COORDINATOR_URL", "http://c:8000/")]))
                .unwrap();
        assert_eq!(config.coordinator_url, "http://c:8000");
        assert_eq!(config.corpus.ue_count, 50);
        assert_eq!(config.corpus.event_count, 2000);
        assert_eq!(config.epochs_per_round, 2);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.max_rounds, None);
        assert!(config.worker_id.as_str().starts_with("worker-"));
    }

    #[test]
    fn overrides_apply() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("COORDINATOR_URL", "http://c:8000"),
            ("WORKER_ID", "client_1"),
            ("MAX_ROUNDS", "5"),
            ("RETRY_DELAY_MS", "250"),
            ("SAVE_CORPUS", "false"),
            ("WORKER_SEED", "9"),
        ]))
        .unwrap();
        assert_eq!(config.worker_id.as_str(), "client_1");
        assert_eq!(config.max_rounds, Some(5));
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert!(!config.save_corpus);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn invalid_number_names_the_variable() {
        let err = WorkerConfig::from_lookup(lookup_from(&[
            ("COORDINATOR_URL", "http://c:8000"),
            ("EPOCHS_PER_ROUND", "two"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("EPOCHS_PER_ROUND"));
    }
}
