//! Bipartite workload ↔ node-group compatibility.

use bench_core::{NodeGroup, WorkloadConfig};

/// Whether `workload` may be placed on `group`.
///
/// Both checks are existential: one shared architecture and one shared
/// tag are enough. A workload is not required to find *all* of its tags
/// in the group's capabilities.
pub fn is_compatible(workload: &WorkloadConfig, group: &NodeGroup) -> bool {
    let architecture = workload.arch.iter().any(|a| *a == group.arch);
    let capability = workload.tags.iter().any(|t| group.has_capability(t));
    architecture && capability
}

/// Adjacency matrix with one row per workload and one column per node group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityGraph {
    rows: Vec<Vec<bool>>,
    groups: usize,
}

impl CompatibilityGraph {
    /// Build the graph for workloads and groups in configuration order.
    pub fn build(workloads: &[WorkloadConfig], groups: &[NodeGroup]) -> Self {
        let rows = workloads
            .iter()
            .map(|w| groups.iter().map(|g| is_compatible(w, g)).collect())
            .collect();
        Self {
            rows,
            groups: groups.len(),
        }
    }

    /// Build directly from a 0/1 matrix.
    pub fn from_matrix(matrix: &[Vec<u8>]) -> Self {
        let groups = matrix.first().map_or(0, Vec::len);
        let rows = matrix
            .iter()
            .map(|row| row.iter().map(|&v| v == 1).collect())
            .collect();
        Self { rows, groups }
    }

    pub fn workloads(&self) -> usize {
        self.rows.len()
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn edge(&self, workload: usize, group: usize) -> bool {
        self.rows
            .get(workload)
            .and_then(|row| row.get(group))
            .copied()
            .unwrap_or(false)
    }

    /// Compatible group indices for one workload, ascending.
    pub fn neighbors(&self, workload: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[workload]
            .iter()
            .enumerate()
            .filter_map(|(n, &on)| on.then_some(n))
    }

    pub fn out_degree(&self, workload: usize) -> usize {
        self.rows[workload].iter().filter(|&&on| on).count()
    }

    /// The matrix as 0/1 rows.
    pub fn to_matrix(&self) -> Vec<Vec<u8>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|&on| u8::from(on)).collect())
            .collect()
    }
}
