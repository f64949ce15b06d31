//! Fleet verification.
//!
//! One task per physical node connects and runs the container runtime's
//! `hello-world` image. Tasks share nothing but a result channel sized to
//! the node count, so no task ever waits on a full channel; the channel is
//! drained only after every task has joined.

use std::sync::Arc;

use bench_core::NodeGroup;
use benchgrid_remote::{Connector, RemoteSession};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::error::{VerifyError, VerifyFailure};

/// Check every node of every group; returns one error per unhealthy node.
pub async fn verify_fleet<C: Connector>(
    connector: Arc<C>,
    groups: &[NodeGroup],
    runtime: &str,
) -> Vec<VerifyError> {
    let nodes: Vec<String> = groups.iter().flat_map(|g| g.nodes.iter().cloned()).collect();
    if nodes.is_empty() {
        return Vec::new();
    }

    let (tx, mut rx) = mpsc::channel(nodes.len());
    let health_check = format!("{runtime} run --rm hello-world");

    let mut handles = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let connector = connector.clone();
        let tx = tx.clone();
        let node = node.clone();
        let health_check = health_check.clone();

        handles.push(tokio::spawn(async move {
            let failure = match connector.connect(&node).await {
                Err(e) => Some(VerifyFailure::Connection(e)),
                Ok(session) => {
                    let outcome = session.execute(&health_check).await;
                    session.close().await;
                    outcome.err().map(VerifyFailure::HealthCheck)
                }
            };
            if let Some(failure) = failure {
                let _ = tx.send(VerifyError { node, failure }).await;
            }
        }));
    }
    drop(tx);

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "verification task panicked");
        }
    }

    let mut errors = Vec::new();
    while let Some(err) = rx.recv().await {
        error!(node = %err.node, error = %err.failure, "node failed verification");
        errors.push(err);
    }

    info!(nodes = nodes.len(), unhealthy = errors.len(), "fleet verified");
    errors
}
