//! `cellfed`: offline tooling for the cellfed workspace.
//!
//! - `cellfed generate` writes a synthetic control-plane trace as CSV.
//! - `cellfed evaluate` scores a generated trace against a real one.
//! - `cellfed simulate` runs a coordinator and several workers in one
//!   process, without any network.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use cellfed_coordinator::{AggregationSettings, Coordinator, StalePolicy};
use cellfed_eval::{ValidityOracle, evaluate};
use cellfed_model::BigramModel;
use cellfed_sim::csv::{load_trace, save_trace};
use cellfed_sim::{TraceConfig, TraceGenerator};
use cellfed_types::WorkerId;
use cellfed_worker::{CoordinatorLink, Worker, WorkerConfig};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cellfed")]
#[command(about = "Synthetic control-plane traces and federated next-message models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a synthetic trace.
    Generate {
        /// Number of simulated UEs.
        #[arg(long, default_value_t = 100)]
        ues: usize,

        /// Number of events to emit.
        #[arg(long, default_value_t = 5000)]
        events: usize,

        /// Timestamp the trace starts from, in seconds.
        #[arg(long, default_value_t = 1000.0)]
        baseline: f64,

        /// Seed for reproducible traces.
        #[arg(long, env = "CELLFED_SEED")]
        seed: Option<u64>,

        /// Output CSV path.
        #[arg(short, long, default_value = "cellular_data.csv")]
        output: PathBuf,
    },

    /// Score a generated trace against a real one.
    Evaluate {
        /// Reference trace (CSV).
        #[arg(long, default_value = "cellular_data.csv")]
        real: PathBuf,

        /// Trace to score (CSV).
        #[arg(long)]
        generated: PathBuf,

        /// Cycles simulated to bootstrap the validity oracle.
        #[arg(long, default_value_t = cellfed_eval::DEFAULT_BOOTSTRAP_ITERATIONS)]
        oracle_iterations: usize,

        /// Seed for the oracle bootstrap.
        #[arg(long, env = "CELLFED_SEED")]
        seed: Option<u64>,
    },

    /// Run a coordinator and several workers in one process.
    Simulate {
        /// Number of workers.
        #[arg(long, default_value_t = 3)]
        workers: usize,

        /// Updates per round. Defaults to the number of workers.
        #[arg(long)]
        quorum: Option<usize>,

        /// Global rounds to run.
        #[arg(long, default_value_t = 5)]
        rounds: u64,

        /// Local epochs per round.
        #[arg(long, default_value_t = 2)]
        epochs: usize,

        /// Directory for diagnostic samples.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Base seed; worker `i` uses `seed + i`.
        #[arg(long, env = "CELLFED_SEED")]
        seed: Option<u64>,
    },
}

fn rng_from(seed: Option<u64>) -> SmallRng {
    seed.map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    match Cli::parse().command {
        Command::Generate {
            ues,
            events,
            baseline,
            seed,
            output,
        } => {
            let config = TraceConfig {
                ue_count: ues,
                event_count: events,
                baseline_timestamp: baseline,
            };
            let trace = TraceGenerator::new(config).generate(&mut rng_from(seed));
            save_trace(&output, &trace)
                .with_context(|| format!("writing {}", output.display()))?;
        }

        Command::Evaluate {
            real,
            generated,
            oracle_iterations,
            seed,
        } => {
            let real_trace =
                load_trace(&real).with_context(|| format!("reading {}", real.display()))?;
            let generated_trace = load_trace(&generated)
                .with_context(|| format!("reading {}", generated.display()))?;
            let oracle = ValidityOracle::bootstrap(oracle_iterations, &mut rng_from(seed));
            let report = evaluate(&real_trace, &generated_trace, &oracle);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Simulate {
            workers,
            quorum,
            rounds,
            epochs,
            output_dir,
            seed,
        } => {
            simulate(
                workers,
                quorum.unwrap_or(workers),
                rounds,
                epochs,
                &output_dir,
                seed,
            )
            .await?;
        }
    }

    Ok(())
}

async fn simulate(
    workers: usize,
    quorum: usize,
    rounds: u64,
    epochs: usize,
    output_dir: &Path,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    anyhow::ensure!(workers > 0, "at least one worker is required");
    anyhow::ensure!(
        quorum <= workers,
        "quorum {quorum} can never be reached by {workers} workers"
    );

    let init_seed = seed.unwrap_or(42);
    let coordinator = Arc::new(Coordinator::new(
        BigramModel::initial_parameters(init_seed, 0.02),
        AggregationSettings {
            quorum,
            stale_policy: StalePolicy::Accept,
        },
    )?);
    info!(workers, quorum, rounds, "in-process federation starting");

    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        let config = WorkerConfig {
            worker_id: WorkerId::new(format!("client_{}", i.saturating_add(1))),
            epochs_per_round: epochs,
            round_pause: Duration::ZERO,
            retry_delay: Duration::from_millis(100),
            max_rounds: Some(rounds),
            save_corpus: false,
            output_dir: output_dir.to_path_buf(),
            seed: seed.map(|s| s.wrapping_add(u64::try_from(i).unwrap_or_default())),
            ..WorkerConfig::with_defaults("in-process")
        };
        let mut worker = Worker::new(config, CoordinatorLink::Local(Arc::clone(&coordinator)))?;
        handles.push(tokio::spawn(async move { worker.run().await }));
    }

    for (i, result) in futures::future::join_all(handles).await.into_iter().enumerate() {
        let summary = result.context("worker task panicked")?;
        info!(
            worker = i,
            final_round = summary.final_round,
            submissions = summary.submissions,
            diagnostics_written = summary.diagnostics_written,
            "worker finished"
        );
    }

    let status = coordinator.status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
