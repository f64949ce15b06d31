//! A feasible workload → node-group assignment.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One node group per workload, keyed by workload name.
///
/// Serializes as a flat JSON object, e.g. `{"WL1":"NG1","WL2":"NG2"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule(BTreeMap<String, String>);

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, workload: impl Into<String>, group: impl Into<String>) {
        self.0.insert(workload.into(), group.into());
    }

    /// The node group assigned to `workload`.
    pub fn group_of(&self, workload: &str) -> Option<&str> {
        self.0.get(workload).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(w, g)| (w.as_str(), g.as_str()))
    }

    /// How many workloads are mapped to `group`.
    pub fn load(&self, group: &str) -> usize {
        self.0.values().filter(|g| *g == group).count()
    }
}

impl<W: Into<String>, G: Into<String>> FromIterator<(W, G)> for Schedule {
    fn from_iter<I: IntoIterator<Item = (W, G)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(w, g)| (w.into(), g.into())).collect())
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (workload, group) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{workload}→{group}")?;
            first = false;
        }
        Ok(())
    }
}
