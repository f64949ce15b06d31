//! Executor error types.

use benchgrid_matching::PlanError;
use benchgrid_remote::RemoteError;
use thiserror::Error;

use crate::measurement::MeasurementError;
use crate::template::TemplateError;

pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Errors that abort coordinator construction or a run.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("invalid command template for tag `{tag}`: {source}")]
    Template {
        tag: String,
        #[source]
        source: TemplateError,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("connection to {node} failed: {source}")]
    Connectivity {
        node: String,
        #[source]
        source: RemoteError,
    },

    #[error("provisioning {workload} on {node} failed: {source}")]
    Provisioning {
        workload: String,
        node: String,
        #[source]
        source: RemoteError,
    },

    #[error("failed to read local data {path} for {workload}: {source}")]
    LocalData {
        workload: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("measurement service: {0}")]
    Protocol(#[from] MeasurementError),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("rendering command for {workload}: {source}")]
    Render {
        workload: String,
        #[source]
        source: TemplateError,
    },

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl ExecutorError {
    /// Broad category, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Template { .. } | Self::Configuration(_) => "configuration",
            Self::Connectivity { .. } => "connectivity",
            Self::Provisioning { .. } | Self::LocalData { .. } => "provisioning",
            Self::Protocol(_) => "protocol",
            Self::Precondition(_) => "precondition",
            Self::Render { .. } => "render",
            Self::Plan(_) => "plan",
        }
    }
}

/// Why a node failed verification.
#[derive(Debug, Error)]
pub enum VerifyFailure {
    #[error("connection failed: {0}")]
    Connection(#[source] RemoteError),

    #[error("health check failed: {0}")]
    HealthCheck(#[source] RemoteError),
}

/// One unhealthy node.
#[derive(Debug, Error)]
#[error("{node}: {failure}")]
pub struct VerifyError {
    pub node: String,
    #[source]
    pub failure: VerifyFailure,
}
