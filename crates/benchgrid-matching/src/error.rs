//! Run-planning error types.

use thiserror::Error;

pub type PlanResult<T> = Result<T, PlanError>;

/// Errors raised when a schedule cannot be expanded into runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("schedule assigns unknown workload: {0}")]
    UnknownWorkload(String),

    #[error("schedule references unknown node group: {0}")]
    UnknownNodeGroup(String),

    #[error("workload {0} has no node group in the schedule")]
    Unassigned(String),

    #[error("node group {group} has no nodes for workload {workload}")]
    NoNodes { workload: String, group: String },

    #[error("workload {workload} is not compatible with node group {group}")]
    Incompatible { workload: String, group: String },

    #[error("node group {group} is assigned {assigned} workloads but holds {capacity}")]
    OverCapacity {
        group: String,
        assigned: usize,
        capacity: usize,
    },
}
