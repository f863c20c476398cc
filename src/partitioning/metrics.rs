//! Partition quality metrics.
//!
//! These walk the whole edge list and are intended for logging, tests and
//! benchmarks, not for the hot path.

use hashbrown::HashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::edge_list::EdgeList;
use super::plan::{HostAssignment, PartitionPlan};

/// Size summary of one host's fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub host: usize,
    pub masters: u64,
    pub mirrors: u64,
    pub edges: u64,
}

impl PartitionStats {
    pub fn of(assignment: &HostAssignment) -> Self {
        Self {
            host: assignment.host,
            masters: assignment.masters.end - assignment.masters.start,
            mirrors: assignment.mirrors.len() as u64,
            edges: assignment.edges.len() as u64,
        }
    }

    /// Resident nodes: masters plus mirrors.
    pub fn resident(&self) -> u64 {
        self.masters + self.mirrors
    }
}

/// Edges whose endpoints have different masters.
pub fn cross_block_edges(plan: &PartitionPlan, graph: &EdgeList) -> usize {
    graph
        .edges()
        .par_iter()
        .filter(|&&(u, v)| plan.owner(u) != plan.owner(v))
        .count()
}

/// Average number of hosts on which a node is resident.
///
/// A node is resident on its master host and on every host holding one of
/// its edges. Isolated nodes count once.
pub fn replication_factor(plan: &PartitionPlan, graph: &EdgeList) -> f64 {
    let n = graph.num_nodes();
    if n == 0 {
        return 0.0;
    }
    let placements: HashSet<(u64, usize)> = graph
        .edges()
        .par_iter()
        .flat_map_iter(|&(u, v)| {
            let h = plan.edge_host(u, v);
            [(u, h), (v, h)]
        })
        .filter(|&(g, h)| plan.owner(g) != h)
        .collect::<Vec<_>>()
        .into_iter()
        .collect();
    (n as f64 + placements.len() as f64) / n as f64
}
