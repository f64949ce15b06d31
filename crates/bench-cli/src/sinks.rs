//! Schedule output sinks.
//!
//! The registry maps an `--output` key to a factory. It is built once in
//! `main` and handed to the commands that need it.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use benchgrid_matching::Schedule;
use tracing::info;

/// Where a batch of schedules ends up.
pub trait ScheduleSink {
    fn write(&mut self, schedules: &[Schedule]) -> anyhow::Result<()>;
}

/// Parameters a sink may need.
#[derive(Debug, Clone)]
pub struct SinkOptions {
    pub file: PathBuf,
}

pub type SinkFactory = fn(&SinkOptions) -> Box<dyn ScheduleSink>;

#[derive(Default)]
pub struct SinkRegistry {
    factories: BTreeMap<&'static str, SinkFactory>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `json` (file) and `table` (stdout).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("json", |opts| Box::new(JsonFileSink::new(&opts.file)));
        registry.register("table", |_| Box::new(TableSink::new(std::io::stdout())));
        registry
    }

    pub fn register(&mut self, key: &'static str, factory: SinkFactory) {
        self.factories.insert(key, factory);
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn create(
        &self,
        key: &str,
        options: &SinkOptions,
    ) -> anyhow::Result<Box<dyn ScheduleSink>> {
        let factory = self.factories.get(key).with_context(|| {
            format!(
                "unknown output `{key}` (available: {})",
                self.keys().collect::<Vec<_>>().join(", ")
            )
        })?;
        Ok(factory(options))
    }
}

/// Writes the schedules as one JSON array, replacing the file.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ScheduleSink for JsonFileSink {
    fn write(&mut self, schedules: &[Schedule]) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(schedules)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        info!(path = %self.path.display(), schedules = schedules.len(), "schedules written");
        Ok(())
    }
}

/// One line per schedule, prefixed with its index.
pub struct TableSink<W: Write> {
    out: W,
}

impl<W: Write> TableSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ScheduleSink for TableSink<W> {
    fn write(&mut self, schedules: &[Schedule]) -> anyhow::Result<()> {
        if schedules.is_empty() {
            writeln!(self.out, "no feasible schedules")?;
            return Ok(());
        }
        for (index, schedule) in schedules.iter().enumerate() {
            writeln!(self.out, "{index:>4}  {schedule}")?;
        }
        self.out.flush()?;
        Ok(())
    }
}
