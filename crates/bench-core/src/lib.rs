//! bench-core: shared configuration types for benchgrid.
//!
//! Every other crate in the workspace consumes these structures already
//! parsed and validated. Nothing here performs I/O beyond reading the
//! configuration file itself.

pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::{BenchConfig, CompletionPolicy, ExecutorConfig, SshConfig, MEASUREMENT_KEY};
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
pub use types::{NodeGroup, WorkloadConfig};
