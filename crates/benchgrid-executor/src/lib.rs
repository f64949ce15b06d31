//! benchgrid-executor: runs schedules on a real fleet.
//!
//! # Architecture
//!
//! ```text
//! run_benchmark ── start-benchmark / end-benchmark
//!   └── Executor::run_schedule        (RunPlan → PlannedRun × runs)
//!         └── RunCoordinator::execute (one run)
//!               ├── CommandTemplates  (compiled once per tag)
//!               ├── Connector         (sessions, provisioning, launch)
//!               └── MeasurementService (start-run / end-run)
//!
//! Executor::verify_environment
//!   └── verify_fleet                  (one task per node, hello-world)
//! ```

pub mod benchmark;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod measurement;
pub mod template;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use benchmark::{ScheduleReport, run_benchmark};
pub use coordinator::{CoordinatorSettings, RunCoordinator};
pub use error::{ExecutorError, ExecutorResult, VerifyError, VerifyFailure};
pub use executor::{Executor, FleetExecutor, SshExecutor};
pub use measurement::{
    HttpMeasurementClient, MeasurementError, MeasurementResult, MeasurementService, RunResults,
};
pub use template::{AddressBook, BoundCommand, CommandTemplate, CommandTemplates, TemplateError};
pub use verifier::verify_fleet;
