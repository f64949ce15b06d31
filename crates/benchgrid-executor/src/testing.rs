//! In-process fakes for the remote and measurement seams.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use benchgrid_remote::{Connector, RemoteError, RemoteResult, RemoteSession, ensure_port};
use http::StatusCode;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::measurement::{MeasurementError, MeasurementResult, MeasurementService, RunResults};

/// Shared, ordered record of everything the fakes were asked to do.
pub(crate) type Events = Arc<Mutex<Vec<String>>>;

pub(crate) fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

type Uploads = Arc<Mutex<Vec<(String, String, Vec<u8>)>>>;
type Launches = Arc<Mutex<Vec<(String, String)>>>;
type Connects = Arc<Mutex<Vec<(String, Instant)>>>;

/// Fake fleet.
///
/// Streamed commands containing `--forever` block until their session is
/// closed; `--slow` ones take 50ms; anything else exits at once.
#[derive(Default)]
pub(crate) struct MockConnector {
    events: Events,
    unreachable: Vec<String>,
    failing: Vec<String>,
    uploads: Uploads,
    launches: Launches,
    connects: Connects,
}

impl MockConnector {
    pub(crate) fn new(events: Events) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    /// Refuse connections to `node`.
    pub(crate) fn unreachable(mut self, node: &str) -> Self {
        self.unreachable.push(node.to_string());
        self
    }

    /// Fail every executed command containing `fragment`.
    pub(crate) fn failing(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    pub(crate) fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }

    pub(crate) fn launched(&self) -> Vec<(String, String)> {
        self.launches.lock().unwrap().clone()
    }

    /// When each connection attempt was made, on the tokio clock.
    pub(crate) fn connect_times(&self) -> Vec<(String, Instant)> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self, node: &str) -> RemoteResult<MockSession> {
        self.events.lock().unwrap().push(format!("connect {node}"));
        self.connects
            .lock()
            .unwrap()
            .push((node.to_string(), Instant::now()));
        if self.unreachable.iter().any(|n| n == node) {
            return Err(RemoteError::ConnectTimeout {
                address: ensure_port(node),
                timeout: Duration::from_secs(30),
            });
        }
        Ok(MockSession {
            node: node.to_string(),
            events: self.events.clone(),
            failing: self.failing.clone(),
            uploads: self.uploads.clone(),
            launches: self.launches.clone(),
            closed: watch::channel(false).0,
        })
    }
}

pub(crate) struct MockSession {
    node: String,
    events: Events,
    failing: Vec<String>,
    uploads: Uploads,
    launches: Launches,
    closed: watch::Sender<bool>,
}

impl MockSession {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    fn node(&self) -> &str {
        &self.node
    }

    async fn execute(&self, command: &str) -> RemoteResult<String> {
        self.record(format!("exec {}: {command}", self.node));
        if self.failing.iter().any(|f| command.contains(f.as_str())) {
            return Err(RemoteError::ExitStatus {
                command: command.to_string(),
                status: 1,
                output: "boom".to_string(),
            });
        }
        Ok(String::new())
    }

    async fn stream(&self, command: &str, lines: mpsc::Sender<String>) -> RemoteResult<u32> {
        self.record(format!("launch {}: {command}", self.node));
        self.launches
            .lock()
            .unwrap()
            .push((self.node.clone(), command.to_string()));
        let _ = lines.send(format!("hello from {}", self.node)).await;

        if command.contains("--forever") {
            let mut closed = self.closed.subscribe();
            let _ = closed.wait_for(|c| *c).await;
        } else if command.contains("--slow") {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        self.record(format!("exit {}", self.node));
        Ok(0)
    }

    async fn upload(&self, contents: Vec<u8>, remote_path: &str) -> RemoteResult<()> {
        self.record(format!("upload {}: {remote_path}", self.node));
        self.uploads
            .lock()
            .unwrap()
            .push((self.node.clone(), remote_path.to_string(), contents));
        Ok(())
    }

    async fn close(&self) {
        self.record(format!("close {}", self.node));
        self.closed.send_replace(true);
    }
}

/// Fake measurement service answering `{"ok": true}` to `end-run`.
pub(crate) struct MockMeasurement {
    events: Events,
    failing: Option<&'static str>,
    correlations: Mutex<Vec<BTreeMap<String, String>>>,
}

impl MockMeasurement {
    pub(crate) fn new(events: Events) -> Self {
        Self {
            events,
            failing: None,
            correlations: Mutex::new(Vec::new()),
        }
    }

    /// Answer 500 to `call`.
    pub(crate) fn failing(mut self, call: &'static str) -> Self {
        self.failing = Some(call);
        self
    }

    pub(crate) fn correlations(&self) -> Vec<BTreeMap<String, String>> {
        self.correlations.lock().unwrap().clone()
    }

    fn call(&self, call: &'static str) -> MeasurementResult<()> {
        self.events.lock().unwrap().push(call.to_string());
        if self.failing == Some(call) {
            return Err(MeasurementError::Status {
                call,
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MeasurementService for MockMeasurement {
    fn address(&self) -> &str {
        "http://measure:8080"
    }

    async fn start_benchmark(&self) -> MeasurementResult<()> {
        self.call("start-benchmark")
    }

    async fn start_run(&self, correlation: &BTreeMap<String, String>) -> MeasurementResult<()> {
        self.call("start-run")?;
        self.correlations.lock().unwrap().push(correlation.clone());
        Ok(())
    }

    async fn end_run(&self) -> MeasurementResult<RunResults> {
        self.call("end-run")?;
        let mut results = RunResults::new();
        results.insert("ok".to_string(), serde_json::Value::Bool(true));
        Ok(results)
    }

    async fn end_benchmark(&self) -> MeasurementResult<()> {
        self.call("end-benchmark")
    }
}
