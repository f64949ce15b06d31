use std::path::Path;

use bench_core::BenchConfig;
use benchgrid_matching::generate_schedules;
use tracing::info;

use crate::sinks::{SinkOptions, SinkRegistry};

pub fn matching(
    config: &BenchConfig,
    sinks: &SinkRegistry,
    output: &str,
    file: &Path,
) -> anyhow::Result<()> {
    let mut sink = sinks.create(
        output,
        &SinkOptions {
            file: file.to_path_buf(),
        },
    )?;

    let schedules = generate_schedules(&config.workloads, &config.node_groups);
    info!(count = schedules.len(), "generated schedules");

    sink.write(&schedules)
}
