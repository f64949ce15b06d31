//! Workload and node-group descriptors.

use serde::{Deserialize, Serialize};

/// A unit of benchmark work: one container image with candidate tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub name: String,
    /// Container image without tag; the tag is chosen per run.
    pub image: String,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub mounts: Vec<String>,
    /// Local files staged onto the node before launch.
    #[serde(default)]
    pub local_data: Vec<String>,
    /// Candidate version tags, in preference order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Architectures this workload can run on.
    #[serde(default)]
    pub arch: Vec<String>,
    #[serde(default)]
    pub command: String,
}

/// A pool of machines sharing architecture, capabilities and a per-node limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub name: String,
    pub arch: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Physical node addresses (`host` or `host:port`).
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub node_capacity: u32,
}

impl NodeGroup {
    /// Total number of workloads this group can host at once.
    pub fn capacity(&self) -> usize {
        self.node_capacity as usize * self.nodes.len()
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }
}
