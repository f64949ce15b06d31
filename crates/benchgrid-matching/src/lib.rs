//! benchgrid-matching: decides where workloads may run and how often.
//!
//! The engine enumerates *feasible* schedules; it never ranks them. The
//! caller picks which schedules to persist or execute.
//!
//! # Pipeline
//!
//! ```text
//! workloads + node groups
//!   └── CompatibilityGraph::build   (arch match ∧ any tag overlap)
//!       └── combinations            (depth-first, lexicographic)
//!           └── apply_capacity      (per-group occupancy filter)
//!               └── Schedule        (workload → node group)
//!                   └── RunPlan     (tag intersections, run count)
//!                       └── PlannedRun × runs (round-robin node/tag)
//! ```

pub mod enumerate;
pub mod error;
pub mod graph;
pub mod plan;
pub mod schedule;

pub use enumerate::{apply_capacity, combinations, generate_schedules};
pub use error::{PlanError, PlanResult};
pub use graph::{CompatibilityGraph, is_compatible};
pub use plan::{Assignment, PlannedRun, RunPlan, check_schedule};
pub use schedule::Schedule;
