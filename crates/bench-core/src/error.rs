//! Error types for configuration loading.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading or validating bench.toml.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate workload name: {0}")]
    DuplicateWorkload(String),

    #[error("duplicate node group name: {0}")]
    DuplicateNodeGroup(String),

    #[error("workload name {0:?} is reserved")]
    ReservedName(String),

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("completion driver {0:?} is not a configured workload")]
    UnknownDriver(String),

    #[error("measurement service address is empty")]
    MissingMeasurement,
}
