use std::sync::Arc;

use bench_core::BenchConfig;
use benchgrid_executor::verify_fleet;

use super::{Backend, ssh_connector};

pub async fn verify(config: &BenchConfig, backend: Backend) -> anyhow::Result<()> {
    let nodes = config.all_nodes().len();
    let errors = match backend {
        Backend::Ssh => {
            let connector = Arc::new(ssh_connector(config)?);
            verify_fleet(connector, &config.node_groups, &config.executor.runtime).await
        }
    };

    if errors.is_empty() {
        println!("✓ {nodes} node(s) ready");
        return Ok(());
    }
    for err in &errors {
        eprintln!("✗ {err}");
    }
    anyhow::bail!("{} of {nodes} node(s) failed verification", errors.len())
}
