//! Graph partitioning: master assignment and edge placement across hosts.
//!
//! Every host reads the same edge list and applies the same deterministic
//! strategy, so each host can compute its own fragment (and which peers
//! mirror its masters) without any communication.

pub mod edge_list;
pub mod error;
pub mod metrics;
pub mod plan;

pub use self::edge_list::EdgeList;
pub use self::error::ConfigError;
pub use self::metrics::{PartitionStats, cross_block_edges, replication_factor};
pub use self::plan::{Grid, HostAssignment, MasterBlocks, PartitionPlan};

use serde::{Deserialize, Serialize};

/// Host identifier in `[0, num_hosts)`.
pub type HostId = usize;

/// How edges (and therefore mirrors) are placed on hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CutStrategy {
    /// Outgoing edge-cut: every edge lives with its source's master.
    #[default]
    EdgeCut,
    /// 2-D cartesian vertex-cut over a `rows × cols` host grid.
    CartesianCut,
    /// Per-destination choice: in-edges of nodes with in-degree above
    /// `threshold` are placed on the cartesian grid, so a hub is mirrored
    /// within one grid column. All other edges follow edge-cut.
    HybridCut { threshold: u64 },
}

impl CutStrategy {
    /// Degree threshold used by [`CutStrategy::hybrid`].
    pub const DEFAULT_HYBRID_THRESHOLD: u64 = 1000;

    pub fn hybrid() -> Self {
        CutStrategy::HybridCut {
            threshold: Self::DEFAULT_HYBRID_THRESHOLD,
        }
    }

    /// Short name used in logs and run identifiers.
    pub fn name(&self) -> &'static str {
        match self {
            CutStrategy::EdgeCut => "edge-cut",
            CutStrategy::CartesianCut => "cartesian-cut",
            CutStrategy::HybridCut { .. } => "hybrid-cut",
        }
    }

    /// Whether an edge's source may be a mirror on the host holding the edge.
    ///
    /// Depends only on the strategy, so every host answers identically.
    pub fn sources_may_be_mirrors(&self) -> bool {
        !matches!(self, CutStrategy::EdgeCut)
    }

    /// Whether an edge's destination may be a mirror on the host holding it.
    pub fn destinations_may_be_mirrors(&self) -> bool {
        true
    }
}

/// Partition construction settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub strategy: CutStrategy,
    /// Relative compute capacity per host. Empty means uniform.
    pub scale_factors: Vec<u32>,
}

impl PartitionConfig {
    pub fn new(strategy: CutStrategy) -> Self {
        Self {
            strategy,
            scale_factors: Vec::new(),
        }
    }

    pub fn with_scale_factors(mut self, scale_factors: Vec<u32>) -> Self {
        self.scale_factors = scale_factors;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_flags_by_strategy() {
        assert!(!CutStrategy::EdgeCut.sources_may_be_mirrors());
        assert!(CutStrategy::CartesianCut.sources_may_be_mirrors());
        assert!(CutStrategy::hybrid().sources_may_be_mirrors());
        assert!(CutStrategy::EdgeCut.destinations_may_be_mirrors());
    }

    #[test]
    fn default_config_is_uniform_edge_cut() {
        let cfg = PartitionConfig::default();
        assert_eq!(cfg.strategy, CutStrategy::EdgeCut);
        assert!(cfg.scale_factors.is_empty());
    }
}
