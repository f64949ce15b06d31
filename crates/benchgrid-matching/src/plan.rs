//! Expansion of one schedule into concrete repeated runs.
//!
//! For every workload the usable tags are the workload's tags that the
//! assigned group advertises as capabilities, in the workload's order. The
//! number of runs is the longest such list. Run `i` picks
//! `tags[i % tags.len()]` and `nodes[i % nodes.len()]`, which spreads
//! repeated runs across both versions and physical machines.

use std::collections::BTreeMap;

use bench_core::{NodeGroup, WorkloadConfig};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::graph::is_compatible;
use crate::schedule::Schedule;

/// Check that `schedule` is one the matching engine could have produced.
///
/// Every configured workload must be assigned to a known, compatible group,
/// and no group may receive more workloads than its capacity.
pub fn check_schedule(
    schedule: &Schedule,
    workloads: &[WorkloadConfig],
    groups: &[NodeGroup],
) -> PlanResult<()> {
    if let Some((unknown, _)) = schedule
        .iter()
        .find(|(w, _)| !workloads.iter().any(|wl| wl.name == *w))
    {
        return Err(PlanError::UnknownWorkload(unknown.to_string()));
    }

    let mut load = vec![0usize; groups.len()];
    for workload in workloads {
        let group_name = schedule
            .group_of(&workload.name)
            .ok_or_else(|| PlanError::Unassigned(workload.name.clone()))?;
        let index = groups
            .iter()
            .position(|g| g.name == group_name)
            .ok_or_else(|| PlanError::UnknownNodeGroup(group_name.to_string()))?;
        if !is_compatible(workload, &groups[index]) {
            return Err(PlanError::Incompatible {
                workload: workload.name.clone(),
                group: group_name.to_string(),
            });
        }
        if groups[index].nodes.is_empty() {
            return Err(PlanError::NoNodes {
                workload: workload.name.clone(),
                group: group_name.to_string(),
            });
        }
        load[index] += 1;
    }

    for (group, assigned) in groups.iter().zip(load) {
        if assigned > group.capacity() {
            return Err(PlanError::OverCapacity {
                group: group.name.clone(),
                assigned,
                capacity: group.capacity(),
            });
        }
    }
    Ok(())
}

/// Usable tags and candidate nodes for one workload.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkloadPlan {
    workload: String,
    node_group: String,
    tags: Vec<String>,
    nodes: Vec<String>,
}

/// All runs derivable from a single schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    entries: Vec<WorkloadPlan>,
    runs: usize,
}

/// Where and at which tag one workload executes during one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub workload: String,
    pub node_group: String,
    pub node: String,
    pub tag: String,
}

impl Assignment {
    /// Correlation identifier reported to the measurement service.
    pub fn identifier(&self) -> String {
        format!("{}-{}-{}", self.node_group, self.node, self.tag)
    }
}

/// One concrete run: assignments in workload configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRun {
    pub index: usize,
    pub assignments: Vec<Assignment>,
}

impl PlannedRun {
    /// Workload name → identifier, the run's correlation key.
    pub fn correlation(&self) -> BTreeMap<String, String> {
        self.assignments
            .iter()
            .map(|a| (a.workload.clone(), a.identifier()))
            .collect()
    }
}

impl RunPlan {
    pub fn new(
        schedule: &Schedule,
        workloads: &[WorkloadConfig],
        groups: &[NodeGroup],
    ) -> PlanResult<Self> {
        check_schedule(schedule, workloads, groups)?;

        let mut entries = Vec::with_capacity(workloads.len());
        let mut runs = 0;

        for workload in workloads {
            let group_name = schedule
                .group_of(&workload.name)
                .ok_or_else(|| PlanError::Unassigned(workload.name.clone()))?;
            let group = groups
                .iter()
                .find(|g| g.name == group_name)
                .ok_or_else(|| PlanError::UnknownNodeGroup(group_name.to_string()))?;

            let tags: Vec<String> = workload
                .tags
                .iter()
                .filter(|t| group.has_capability(t))
                .cloned()
                .collect();

            runs = runs.max(tags.len());
            entries.push(WorkloadPlan {
                workload: workload.name.clone(),
                node_group: group.name.clone(),
                tags,
                nodes: group.nodes.clone(),
            });
        }

        Ok(Self { entries, runs })
    }

    /// Number of runs; zero only for a schedule without workloads.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Usable tags for one workload.
    pub fn tags_of(&self, workload: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.workload == workload)
            .map(|e| e.tags.as_slice())
    }

    /// Assignments for run `index`.
    ///
    /// Workloads with no usable tag have no run and are left out.
    pub fn run(&self, index: usize) -> PlannedRun {
        let assignments = self
            .entries
            .iter()
            .filter(|e| !e.tags.is_empty() && !e.nodes.is_empty())
            .map(|e| Assignment {
                workload: e.workload.clone(),
                node_group: e.node_group.clone(),
                node: e.nodes[index % e.nodes.len()].clone(),
                tag: e.tags[index % e.tags.len()].clone(),
            })
            .collect();
        PlannedRun { index, assignments }
    }

    pub fn iter_runs(&self) -> impl Iterator<Item = PlannedRun> + '_ {
        (0..self.runs).map(|i| self.run(i))
    }
}
