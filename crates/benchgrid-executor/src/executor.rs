//! Executor backends.

use std::sync::Arc;

use async_trait::async_trait;
use bench_core::{BenchConfig, NodeGroup, WorkloadConfig};
use benchgrid_matching::{RunPlan, Schedule};
use benchgrid_remote::{Connector, SshConnector};
use tracing::{info, warn};

use crate::coordinator::RunCoordinator;
use crate::error::{ExecutorResult, VerifyError};
use crate::measurement::{HttpMeasurementClient, MeasurementService, RunResults};
use crate::verifier::verify_fleet;

/// A way of running schedules on a fleet.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Check that every node is reachable and can run containers.
    async fn verify_environment(&self) -> Vec<VerifyError>;

    /// Execute every run of `schedule`, in order, stopping at the first
    /// failed run. Returns the measurement results of each run.
    async fn run_schedule(&self, schedule: &Schedule) -> ExecutorResult<Vec<RunResults>>;
}

/// Executor over any remote backend.
pub struct FleetExecutor<C: Connector, M: MeasurementService> {
    workloads: Vec<WorkloadConfig>,
    groups: Vec<NodeGroup>,
    connector: Arc<C>,
    coordinator: RunCoordinator<C, M>,
}

/// The production executor: SSH sessions and the HTTP measurement client.
pub type SshExecutor = FleetExecutor<SshConnector, HttpMeasurementClient>;

impl<C: Connector, M: MeasurementService> FleetExecutor<C, M> {
    pub fn new(
        config: &BenchConfig,
        connector: Arc<C>,
        measurement: Arc<M>,
    ) -> ExecutorResult<Self> {
        let coordinator = RunCoordinator::new(config, connector.clone(), measurement)?;
        Ok(Self {
            workloads: config.workloads.clone(),
            groups: config.node_groups.clone(),
            connector,
            coordinator,
        })
    }
}

#[async_trait]
impl<C: Connector, M: MeasurementService> Executor for FleetExecutor<C, M> {
    async fn verify_environment(&self) -> Vec<VerifyError> {
        verify_fleet(
            self.connector.clone(),
            &self.groups,
            &self.coordinator.settings().runtime,
        )
        .await
    }

    async fn run_schedule(&self, schedule: &Schedule) -> ExecutorResult<Vec<RunResults>> {
        let plan = RunPlan::new(schedule, &self.workloads, &self.groups)?;
        if plan.runs() == 0 {
            warn!(%schedule, "schedule has no runs; nothing to execute");
            return Ok(Vec::new());
        }
        info!(%schedule, runs = plan.runs(), "executing schedule");

        let mut results = Vec::with_capacity(plan.runs());
        for run in plan.iter_runs() {
            info!(run = run.index, correlation = ?run.correlation(), "starting run");
            results.push(self.coordinator.execute(&run).await?);
        }
        Ok(results)
    }
}
