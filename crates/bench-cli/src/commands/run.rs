use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use bench_core::BenchConfig;
use benchgrid_executor::{Executor, HttpMeasurementClient, SshExecutor, run_benchmark};
use benchgrid_matching::{Schedule, check_schedule, generate_schedules};
use tracing::{info, warn};

use super::{Backend, ssh_connector};

pub async fn run(
    config: &BenchConfig,
    backend: Backend,
    schedules_file: Option<&Path>,
    select: &[usize],
    skip_verify: bool,
) -> anyhow::Result<()> {
    let schedules = match schedules_file {
        Some(path) => {
            let loaded = load_schedules(path)?;
            check_schedules(&loaded, config)
                .with_context(|| format!("checking {}", path.display()))?;
            loaded
        }
        None => generate_schedules(&config.workloads, &config.node_groups),
    };
    let schedules = select_schedules(schedules, select)?;
    if schedules.is_empty() {
        warn!("no schedules to run");
        return Ok(());
    }
    info!(count = schedules.len(), "schedules selected");

    let measurement = Arc::new(HttpMeasurementClient::new(config.measurement_address()?)?);
    let executor = match backend {
        Backend::Ssh => {
            let connector = Arc::new(ssh_connector(config)?);
            SshExecutor::new(config, connector, measurement.clone())?
        }
    };

    if !skip_verify {
        let errors = executor.verify_environment().await;
        if !errors.is_empty() {
            for err in &errors {
                eprintln!("✗ {err}");
            }
            anyhow::bail!("{} node(s) failed verification; not starting", errors.len());
        }
    }

    let reports = run_benchmark(&executor, measurement.as_ref(), &schedules).await?;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

/// Read schedules written by `bench matching`.
fn load_schedules(path: &Path) -> anyhow::Result<Vec<Schedule>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Reject schedules the matching engine would not produce for `config`.
fn check_schedules(schedules: &[Schedule], config: &BenchConfig) -> anyhow::Result<()> {
    for (index, schedule) in schedules.iter().enumerate() {
        check_schedule(schedule, &config.workloads, &config.node_groups)
            .with_context(|| format!("schedule {index} ({schedule}) is not feasible"))?;
    }
    Ok(())
}

/// Keep the schedules at `select`, in the order given; all of them if empty.
fn select_schedules(schedules: Vec<Schedule>, select: &[usize]) -> anyhow::Result<Vec<Schedule>> {
    if select.is_empty() {
        return Ok(schedules);
    }
    select
        .iter()
        .map(|&i| {
            schedules.get(i).cloned().with_context(|| {
                format!("schedule {i} does not exist ({} available)", schedules.len())
            })
        })
        .collect()
}
