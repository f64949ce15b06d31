//! bench.toml configuration parser.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::types::{NodeGroup, WorkloadConfig};

/// Address-book key under which the measurement service address is published
/// to command templates (`{{ addr.measurement }}`).
pub const MEASUREMENT_KEY: &str = "measurement";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Base URL of the measurement service, e.g. `http://10.0.0.5:8080`.
    #[serde(default)]
    pub measurement: String,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub workloads: Vec<WorkloadConfig>,
    #[serde(default)]
    pub node_groups: Vec<NodeGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub key_file: String,
    /// Command templates keyed by tag.
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Container runtime CLI present on every node.
    pub runtime: String,
    /// Remote directory receiving `local_data` files.
    pub staging_dir: String,
    /// Pause after launching a workload before provisioning the next one.
    pub settle_delay: String,
    pub connect_timeout: String,
    pub completion: CompletionPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            staging_dir: "/tmp".to_string(),
            settle_delay: "10s".to_string(),
            connect_timeout: "30s".to_string(),
            completion: CompletionPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn settle_delay(&self) -> ConfigResult<Duration> {
        parse_duration(&self.settle_delay).ok_or_else(|| ConfigError::InvalidDuration {
            field: "executor.settle_delay",
            value: self.settle_delay.clone(),
        })
    }

    pub fn connect_timeout(&self) -> ConfigResult<Duration> {
        parse_duration(&self.connect_timeout).ok_or_else(|| ConfigError::InvalidDuration {
            field: "executor.connect_timeout",
            value: self.connect_timeout.clone(),
        })
    }
}

/// Decides which launched workload(s) end a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum CompletionPolicy {
    /// The first launched command to exit completes the run.
    #[default]
    FirstExit,
    /// Only the named workload's exit completes the run.
    Driver { workload: String },
    /// Every launched command must exit.
    All,
}

impl BenchConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: BenchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for workload in &self.workloads {
            if workload.name == MEASUREMENT_KEY {
                return Err(ConfigError::ReservedName(workload.name.clone()));
            }
            if !seen.insert(workload.name.as_str()) {
                return Err(ConfigError::DuplicateWorkload(workload.name.clone()));
            }
        }

        let mut groups = HashSet::new();
        for group in &self.node_groups {
            if !groups.insert(group.name.as_str()) {
                return Err(ConfigError::DuplicateNodeGroup(group.name.clone()));
            }
        }

        self.executor.settle_delay()?;
        self.executor.connect_timeout()?;

        if let CompletionPolicy::Driver { workload } = &self.executor.completion {
            if !seen.contains(workload.as_str()) {
                return Err(ConfigError::UnknownDriver(workload.clone()));
            }
        }

        Ok(())
    }

    /// The measurement service address; required by `run`.
    pub fn measurement_address(&self) -> ConfigResult<&str> {
        let address = self.measurement.trim();
        if address.is_empty() {
            return Err(ConfigError::MissingMeasurement);
        }
        Ok(address)
    }

    /// Every physical node across all groups, in configuration order.
    pub fn all_nodes(&self) -> Vec<String> {
        self.node_groups
            .iter()
            .flat_map(|g| g.nodes.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
measurement = "http://10.0.0.5:8080"

[ssh]
user = "bench"
key_file = "/home/bench/.ssh/id_ed25519"

[ssh.commands]
cpu = "docker run --name {{ workload.name }} {{ workload.image }}:{{ tag }}"

[executor]
settle_delay = "2s"
completion = { mode = "driver", workload = "client" }

[[workloads]]
name = "server"
image = "registry/server"
tags = ["cpu"]
arch = ["x86", "arm64"]

[[workloads]]
name = "client"
image = "registry/client"
tags = ["cpu"]
arch = ["x86"]
local_data = ["./data/video.mp4"]

[[node_groups]]
name = "NG1"
arch = "x86"
capabilities = ["cpu", "cuda"]
nodes = ["10.0.0.1", "10.0.0.2"]
node_capacity = 1
"#;

    #[test]
    fn parses_full_document() {
        let config = BenchConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.measurement_address().unwrap(), "http://10.0.0.5:8080");
        assert_eq!(config.ssh.user, "bench");
        assert_eq!(config.ssh.commands.len(), 1);
        assert_eq!(config.workloads.len(), 2);
        assert_eq!(config.workloads[1].local_data, vec!["./data/video.mp4"]);
        assert_eq!(config.node_groups[0].capacity(), 2);
        assert_eq!(
            config.executor.completion,
            CompletionPolicy::Driver {
                workload: "client".to_string()
            }
        );
        assert_eq!(config.executor.settle_delay().unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn executor_defaults_apply() {
        let config = BenchConfig::from_toml_str("").unwrap();
        assert_eq!(config.executor.runtime, "docker");
        assert_eq!(config.executor.staging_dir, "/tmp");
        assert_eq!(config.executor.settle_delay().unwrap(), Duration::from_secs(10));
        assert_eq!(config.executor.connect_timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(config.executor.completion, CompletionPolicy::FirstExit);
    }

    #[test]
    fn completion_modes_parse() {
        let config =
            BenchConfig::from_toml_str("[executor]\ncompletion = { mode = \"all\" }\n").unwrap();
        assert_eq!(config.executor.completion, CompletionPolicy::All);
    }

    #[test]
    fn rejects_duplicate_workloads() {
        let doc = r#"
[[workloads]]
name = "a"
image = "x"

[[workloads]]
name = "a"
image = "y"
"#;
        let err = BenchConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateWorkload(name) if name == "a"));
    }

    #[test]
    fn rejects_duplicate_groups() {
        let doc = r#"
[[node_groups]]
name = "NG1"
arch = "x86"

[[node_groups]]
name = "NG1"
arch = "arm64"
"#;
        let err = BenchConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateNodeGroup(_)));
    }

    #[test]
    fn rejects_reserved_workload_name() {
        let doc = "[[workloads]]\nname = \"measurement\"\nimage = \"x\"\n";
        let err = BenchConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, ConfigError::ReservedName(_)));
    }

    #[test]
    fn rejects_unknown_driver() {
        let doc = "[executor]\ncompletion = { mode = \"driver\", workload = \"ghost\" }\n";
        let err = BenchConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDriver(name) if name == "ghost"));
    }

    #[test]
    fn rejects_bad_duration() {
        let doc = "[executor]\nsettle_delay = \"a while\"\n";
        let err = BenchConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration { field: "executor.settle_delay", .. }
        ));

        let doc = "[executor]\nconnect_timeout = \"307445734561825861m\"\n";
        let err = BenchConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration { field: "executor.connect_timeout", .. }
        ));
    }

    #[test]
    fn missing_measurement_is_reported_on_demand() {
        let config = BenchConfig::from_toml_str("").unwrap();
        assert!(matches!(
            config.measurement_address(),
            Err(ConfigError::MissingMeasurement)
        ));
    }

    #[test]
    fn node_listing() {
        let config = BenchConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.all_nodes(), vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = BenchConfig::from_file(&path).unwrap();
        assert_eq!(config.workloads[0].name, "server");
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = BenchConfig::from_file(Path::new("/nonexistent/bench.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
