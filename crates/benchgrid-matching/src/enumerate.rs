//! Exhaustive schedule enumeration.
//!
//! Every workload picks one compatible node group; the raw combinations are
//! generated depth-first over the workload dimension with group indices in
//! ascending order, so the output order is lexicographic and stable across
//! invocations. The raw count is the product of every workload's
//! out-degree: exponential in the worst case. Only the compatibility filter
//! prunes the search; checking capacity while descending would cut dense
//! graphs down considerably but is not done here.

use bench_core::{NodeGroup, WorkloadConfig};
use tracing::debug;

use crate::graph::CompatibilityGraph;
use crate::schedule::Schedule;

/// Visit every raw combination in lexicographic order.
///
/// `combination[w]` is the group index chosen for workload `w`. A graph
/// without workloads has exactly one (empty) combination.
pub fn for_each_combination<F>(graph: &CompatibilityGraph, mut visit: F)
where
    F: FnMut(&[usize]),
{
    let mut path = Vec::with_capacity(graph.workloads());
    descend(graph, 0, &mut path, &mut visit);
}

fn descend<F>(graph: &CompatibilityGraph, workload: usize, path: &mut Vec<usize>, visit: &mut F)
where
    F: FnMut(&[usize]),
{
    if workload == graph.workloads() {
        visit(path);
        return;
    }
    for group in graph.neighbors(workload) {
        path.push(group);
        descend(graph, workload + 1, path, visit);
        path.pop();
    }
}

/// Collect every raw combination.
pub fn combinations(graph: &CompatibilityGraph) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    for_each_combination(graph, |c| out.push(c.to_vec()));
    out
}

/// Apply per-group capacity to one raw combination.
///
/// Workloads are walked in order; a workload whose group is already full is
/// dropped, not moved elsewhere. Returns `None` unless every workload was
/// placed.
pub fn apply_capacity(
    combination: &[usize],
    workloads: &[WorkloadConfig],
    groups: &[NodeGroup],
) -> Option<Schedule> {
    let mut occupancy = vec![0usize; groups.len()];
    let mut schedule = Schedule::new();

    for (workload, &g) in workloads.iter().zip(combination) {
        let group = &groups[g];
        if occupancy[g] < group.capacity() {
            schedule.assign(workload.name.as_str(), group.name.as_str());
            occupancy[g] += 1;
        }
    }

    (schedule.len() == workloads.len()).then_some(schedule)
}

/// Enumerate every feasible schedule, in enumeration order.
///
/// Returns nothing when either the workload or the node-group list is empty.
pub fn generate_schedules(workloads: &[WorkloadConfig], groups: &[NodeGroup]) -> Vec<Schedule> {
    if workloads.is_empty() || groups.is_empty() {
        return Vec::new();
    }

    let graph = CompatibilityGraph::build(workloads, groups);

    let mut raw = 0usize;
    let mut schedules = Vec::new();
    for_each_combination(&graph, |combination| {
        raw += 1;
        if let Some(schedule) = apply_capacity(combination, workloads, groups) {
            schedules.push(schedule);
        }
    });

    debug!(
        workloads = workloads.len(),
        groups = groups.len(),
        raw,
        feasible = schedules.len(),
        "enumerated schedules"
    );

    schedules
}
