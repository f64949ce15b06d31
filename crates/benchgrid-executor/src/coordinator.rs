//! Run coordinator.
//!
//! Drives one concrete run end to end:
//!
//! ```text
//!   start-run(correlation)
//!   for each workload, in configuration order:
//!       address book += workload → node
//!       render command (bind, then resolve addresses)
//!       connect ─── cleanup registered from here on
//!       <runtime> pull image:tag, stage local_data
//!       launch command; a log task streams its stdout
//!       settle delay
//!   wait for completion (first-exit | driver | all)
//!   end-run → results
//!   cleanup, newest first: <runtime> rm -f <name>, stop log task, close
//! ```
//!
//! Any error before completion aborts the run; cleanup still runs for every
//! workload that got a session. Remote commands are not bounded by a
//! timeout: a workload that never exits keeps its run open.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bench_core::{
    BenchConfig, CompletionPolicy, ConfigResult, ExecutorConfig, MEASUREMENT_KEY, WorkloadConfig,
};
use benchgrid_matching::PlannedRun;
use benchgrid_remote::{Connector, RemoteError, RemoteSession};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ExecutorError, ExecutorResult};
use crate::measurement::{MeasurementService, RunResults};
use crate::template::{AddressBook, CommandTemplates};

/// Buffered output lines per launched workload.
const LOG_BUFFER: usize = 256;

/// Execution knobs taken from `[executor]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub runtime: String,
    pub staging_dir: String,
    pub settle_delay: Duration,
    pub completion: CompletionPolicy,
}

impl CoordinatorSettings {
    pub fn from_config(config: &ExecutorConfig) -> ConfigResult<Self> {
        Ok(Self {
            runtime: config.runtime.clone(),
            staging_dir: config.staging_dir.clone(),
            settle_delay: config.settle_delay()?,
            completion: config.completion.clone(),
        })
    }
}

/// Exit notification from a launch task.
struct Exit {
    workload: String,
    node: String,
}

/// A workload holding a session; torn down when the run ends.
struct Active<S> {
    workload: String,
    node: String,
    session: Arc<S>,
    cancel: watch::Sender<bool>,
    launch: Option<JoinHandle<()>>,
}

pub struct RunCoordinator<C: Connector, M: MeasurementService> {
    workloads: Vec<WorkloadConfig>,
    templates: CommandTemplates,
    settings: CoordinatorSettings,
    connector: Arc<C>,
    measurement: Arc<M>,
}

impl<C: Connector, M: MeasurementService> RunCoordinator<C, M> {
    /// Build a coordinator from the loaded configuration.
    ///
    /// Every command template is compiled here, so template mistakes
    /// surface before any run starts.
    pub fn new(
        config: &BenchConfig,
        connector: Arc<C>,
        measurement: Arc<M>,
    ) -> ExecutorResult<Self> {
        let settings = CoordinatorSettings::from_config(&config.executor)
            .map_err(|e| ExecutorError::Configuration(e.to_string()))?;
        Self::with_settings(
            config.workloads.clone(),
            &config.ssh.commands,
            settings,
            connector,
            measurement,
        )
    }

    pub fn with_settings(
        workloads: Vec<WorkloadConfig>,
        commands: &BTreeMap<String, String>,
        settings: CoordinatorSettings,
        connector: Arc<C>,
        measurement: Arc<M>,
    ) -> ExecutorResult<Self> {
        let known = workloads
            .iter()
            .map(|w| w.name.as_str())
            .chain(std::iter::once(MEASUREMENT_KEY));
        let templates = CommandTemplates::compile(commands, known)
            .map_err(|(tag, source)| ExecutorError::Template { tag, source })?;

        if let CompletionPolicy::Driver { workload } = &settings.completion {
            if !workloads.iter().any(|w| w.name == *workload) {
                return Err(ExecutorError::Configuration(format!(
                    "completion driver `{workload}` is not a configured workload"
                )));
            }
        }

        info!(
            templates = templates.len(),
            workloads = workloads.len(),
            completion = ?settings.completion,
            "run coordinator ready"
        );

        Ok(Self {
            workloads,
            templates,
            settings,
            connector,
            measurement,
        })
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Execute one planned run.
    pub async fn execute(&self, run: &PlannedRun) -> ExecutorResult<RunResults> {
        let mut workloads = Vec::with_capacity(run.assignments.len());
        let mut nodes = Vec::with_capacity(run.assignments.len());
        let mut tags = Vec::with_capacity(run.assignments.len());

        for assignment in &run.assignments {
            let workload = self
                .workloads
                .iter()
                .find(|w| w.name == assignment.workload)
                .ok_or_else(|| {
                    ExecutorError::Precondition(format!(
                        "run {} references unknown workload `{}`",
                        run.index, assignment.workload
                    ))
                })?;
            workloads.push(workload.clone());
            nodes.push(assignment.node.clone());
            tags.push(assignment.tag.clone());
        }

        self.single_run(&workloads, &nodes, &tags, &run.correlation()).await
    }

    /// Execute one run given parallel workload, node and tag lists.
    ///
    /// The lists must have equal length; nothing is contacted otherwise.
    pub async fn single_run(
        &self,
        workloads: &[WorkloadConfig],
        nodes: &[String],
        tags: &[String],
        correlation: &BTreeMap<String, String>,
    ) -> ExecutorResult<RunResults> {
        if workloads.len() != nodes.len() || workloads.len() != tags.len() {
            return Err(ExecutorError::Precondition(format!(
                "{} workloads, {} nodes and {} tags must have equal length",
                workloads.len(),
                nodes.len(),
                tags.len()
            )));
        }
        if workloads.is_empty() {
            return Err(ExecutorError::Precondition("run has no workloads".to_string()));
        }
        if let CompletionPolicy::Driver { workload } = &self.settings.completion {
            if !workloads.iter().any(|w| w.name == *workload) {
                return Err(ExecutorError::Precondition(format!(
                    "completion driver `{workload}` takes no part in this run"
                )));
            }
        }

        self.measurement.start_run(correlation).await?;
        info!(?correlation, "run started");

        let mut active = Vec::with_capacity(workloads.len());
        let outcome = self.drive(workloads, nodes, tags, &mut active).await;
        self.cleanup(active).await;

        if let Err(e) = &outcome {
            error!(kind = e.kind(), error = %e, "run aborted");
        }
        outcome
    }

    async fn drive(
        &self,
        workloads: &[WorkloadConfig],
        nodes: &[String],
        tags: &[String],
        active: &mut Vec<Active<C::Session>>,
    ) -> ExecutorResult<RunResults> {
        let (done_tx, mut done_rx) = mpsc::channel(workloads.len());
        let mut book = AddressBook::new(self.measurement.address());

        for ((workload, node), tag) in workloads.iter().zip(nodes).zip(tags) {
            book.insert(workload.name.as_str(), node.as_str());
            let command = self
                .templates
                .bind(workload, tag)
                .and_then(|bound| bound.resolve(&book))
                .map_err(|source| ExecutorError::Render {
                    workload: workload.name.clone(),
                    source,
                })?;
            debug!(workload = %workload.name, %node, %command, "command rendered");

            let session = self
                .connector
                .connect(node)
                .await
                .map_err(|source| ExecutorError::Connectivity {
                    node: node.clone(),
                    source,
                })?;
            let session = Arc::new(session);
            let (cancel, cancelled) = watch::channel(false);
            let slot = active.len();
            active.push(Active {
                workload: workload.name.clone(),
                node: node.clone(),
                session: session.clone(),
                cancel,
                launch: None,
            });

            self.provision(session.as_ref(), workload, node, tag).await?;
            info!(workload = %workload.name, %node, %tag, "workload scheduled");

            active[slot].launch = Some(launch(
                session,
                workload.name.clone(),
                command,
                cancelled,
                done_tx.clone(),
            ));

            tokio::time::sleep(self.settings.settle_delay).await;
        }
        drop(done_tx);

        self.wait_for_completion(&mut done_rx, workloads.len()).await;

        let results = self.measurement.end_run().await?;
        info!(results = %serde_json::Value::Object(results.clone()), "run finished");
        Ok(results)
    }

    async fn provision(
        &self,
        session: &C::Session,
        workload: &WorkloadConfig,
        node: &str,
        tag: &str,
    ) -> ExecutorResult<()> {
        let provisioning = |source: RemoteError| ExecutorError::Provisioning {
            workload: workload.name.clone(),
            node: node.to_string(),
            source,
        };
        let local_data = |path: &str, source: std::io::Error| ExecutorError::LocalData {
            workload: workload.name.clone(),
            path: path.to_string(),
            source,
        };

        let pull = format!("{} pull {}:{}", self.settings.runtime, workload.image, tag);
        session.execute(&pull).await.map_err(provisioning)?;
        debug!(workload = %workload.name, %node, image = %workload.image, %tag, "image pulled");

        for path in &workload.local_data {
            let name = Path::new(path).file_name().ok_or_else(|| {
                local_data(
                    path,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
                )
            })?;
            let contents = tokio::fs::read(path)
                .await
                .map_err(|source| local_data(path, source))?;
            let remote = format!(
                "{}/{}",
                self.settings.staging_dir.trim_end_matches('/'),
                name.to_string_lossy()
            );
            session
                .upload(contents, &remote)
                .await
                .map_err(provisioning)?;
            debug!(workload = %workload.name, %node, local = %path, %remote, "local data staged");
        }

        Ok(())
    }

    async fn wait_for_completion(&self, done: &mut mpsc::Receiver<Exit>, launched: usize) {
        let mut exited = 0;
        while let Some(exit) = done.recv().await {
            exited += 1;
            let complete = match &self.settings.completion {
                CompletionPolicy::FirstExit => true,
                CompletionPolicy::Driver { workload } => exit.workload == *workload,
                CompletionPolicy::All => exited == launched,
            };
            if complete {
                debug!(workload = %exit.workload, node = %exit.node, exited, "run complete");
                return;
            }
        }
        warn!(exited, launched, "launches ended before the completion condition was met");
    }

    async fn cleanup(&self, active: Vec<Active<C::Session>>) {
        for entry in active.into_iter().rev() {
            let remove = format!("{} rm -f {}", self.settings.runtime, entry.workload);
            if let Err(e) = entry.session.execute(&remove).await {
                warn!(
                    workload = %entry.workload,
                    node = %entry.node,
                    error = %e,
                    "container removal failed"
                );
            }
            let _ = entry.cancel.send(true);
            entry.session.close().await;
            if let Some(launch) = entry.launch {
                launch.abort();
            }
            debug!(workload = %entry.workload, node = %entry.node, "workload cleaned up");
        }
    }
}

/// Start `command` on `session` and pump its output into the log.
///
/// The launch task reports on `done` once the command ends, however it
/// ends. The log task stops when the output ends or `cancelled` fires.
fn launch<S: RemoteSession>(
    session: Arc<S>,
    workload: String,
    command: String,
    cancelled: watch::Receiver<bool>,
    done: mpsc::Sender<Exit>,
) -> JoinHandle<()> {
    let node = session.node().to_string();
    let (line_tx, line_rx) = mpsc::channel::<String>(LOG_BUFFER);

    tokio::spawn(pump_output(node.clone(), workload.clone(), line_rx, cancelled));

    tokio::spawn(async move {
        match session.stream(&command, line_tx).await {
            Ok(0) => info!(%node, %workload, "workload exited"),
            Ok(status) => warn!(%node, %workload, status, "workload exited with non-zero status"),
            Err(e) => error!(%node, %workload, error = %e, "workload failed"),
        }
        let _ = done.send(Exit { workload, node }).await;
    })
}

/// Log each output line until the stream ends or `cancelled` fires.
///
/// Returns the number of lines logged.
async fn pump_output(
    node: String,
    workload: String,
    mut lines: mpsc::Receiver<String>,
    mut cancelled: watch::Receiver<bool>,
) -> usize {
    let mut logged = 0;
    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => {
                    debug!(%node, %workload, "{line}");
                    logged += 1;
                }
                None => break,
            },
            _ = cancelled.changed() => break,
        }
    }
    logged
}
