//! Stage dependency graph.
//!
//! Nodes are stage orders; edges point from a dependency to its dependent.
//! Validation only admits backward references, so ascending order is
//! always a valid execution order.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::validator::{parse_dependency, DependencyRef};
use crate::models::Stage;

/// A directed acyclic graph over a pipeline's stages.
#[derive(Debug, Clone, Default)]
pub struct StageGraph {
    /// Stage order -> orders it depends on.
    upstream: BTreeMap<u32, Vec<u32>>,
}

impl StageGraph {
    /// Builds the graph for an already-validated stage list.
    ///
    /// Dependencies that do not resolve to a known order are ignored.
    #[must_use]
    pub fn from_stages(stages: &[Stage]) -> Self {
        let known: HashSet<u32> = stages.iter().map(|s| s.order).collect();
        let upstream = stages
            .iter()
            .map(|stage| {
                let deps = stage
                    .dependencies
                    .iter()
                    .filter_map(|d| match parse_dependency(d) {
                        Some(DependencyRef::Order(order)) if known.contains(&order) => Some(order),
                        _ => None,
                    })
                    .collect();
                (stage.order, deps)
            })
            .collect();

        Self { upstream }
    }

    /// Stage orders in the sequence they execute.
    pub fn execution_order(&self) -> impl Iterator<Item = u32> + '_ {
        self.upstream.keys().copied()
    }

    /// Every stage that transitively depends on `order`, ascending.
    #[must_use]
    pub fn downstream(&self, order: u32) -> Vec<u32> {
        let mut reached = BTreeSet::new();
        reached.insert(order);
        // Dependents always have larger orders, so one ascending pass suffices.
        for (node, deps) in self.upstream.range(order..) {
            if deps.iter().any(|d| reached.contains(d)) {
                reached.insert(*node);
            }
        }
        reached.remove(&order);
        reached.into_iter().collect()
    }
}
