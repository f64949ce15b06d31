//! bench: schedule and execute distributed benchmarks.
//!
//! # Usage
//!
//! ```text
//! bench --config bench.toml verify
//! bench matching --output table
//! bench run --schedules matchings.json --select 0 --select 3
//! ```

use std::path::PathBuf;

use anyhow::Context;
use bench_core::BenchConfig;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

mod commands;
mod sinks;

use commands::Backend;
use sinks::SinkRegistry;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,bench=info,benchgrid=info";

#[derive(Parser)]
#[command(
    name = "bench",
    about = "benchgrid: schedule benchmark workloads across heterogeneous fleets",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "bench.toml", global = true)]
    config: PathBuf,

    /// Execution backend
    #[arg(long, value_enum, default_value_t = Backend::Ssh, global = true)]
    backend: Backend,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Check that every node is reachable and can run containers
    Verify,
    /// Enumerate every feasible schedule
    Matching {
        /// Output sink: json or table
        #[arg(short, long, default_value = "json")]
        output: String,
        /// Target file for file-based sinks
        #[arg(short, long, default_value = "matchings.json")]
        file: PathBuf,
    },
    /// Run the benchmark and report results
    Run {
        /// Schedules produced by `bench matching` (default: generate all)
        #[arg(long)]
        schedules: Option<PathBuf>,
        /// Run only the schedule at this index; repeatable
        #[arg(long)]
        select: Vec<usize>,
        /// Skip the fleet check before starting
        #[arg(long)]
        skip_verify: bool,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = BenchConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    debug!(
        config = %cli.config.display(),
        workloads = config.workloads.len(),
        node_groups = config.node_groups.len(),
        "configuration loaded"
    );

    let sinks = SinkRegistry::with_defaults();

    match cli.command {
        Commands::Verify => commands::verify::verify(&config, cli.backend).await,
        Commands::Matching { output, file } => {
            commands::matching::matching(&config, &sinks, &output, &file)
        }
        Commands::Run {
            schedules,
            select,
            skip_verify,
        } => {
            commands::run::run(&config, cli.backend, schedules.as_deref(), &select, skip_verify)
                .await
        }
    }
}
