//! Deterministic partition plans.
//!
//! A [`PartitionPlan`] answers two questions for any host: who is the master
//! of a global id, and which host holds a given edge. [`PartitionPlan::assign`]
//! turns those answers into one host's fragment: its master block, its
//! mirrors, its local edges, and which peers mirror each of its masters.

use std::ops::Range;

use itertools::Itertools;
use rayon::prelude::*;

use super::edge_list::EdgeList;
use super::error::ConfigError;
use super::{CutStrategy, HostId, PartitionConfig};

/// Contiguous master blocks, sized in proportion to per-host scale factors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterBlocks {
    /// `bounds[h]..bounds[h + 1]` are host `h`'s masters.
    bounds: Vec<u64>,
}

impl MasterBlocks {
    pub fn new(num_nodes: u64, num_hosts: usize, scale_factors: &[u32]) -> Result<Self, ConfigError> {
        if num_hosts == 0 {
            return Err(ConfigError::InvalidHost { host: 0, num_hosts });
        }
        let weights: Vec<u64> = if scale_factors.is_empty() {
            vec![1; num_hosts]
        } else if scale_factors.len() != num_hosts {
            return Err(ConfigError::ScaleFactors(format!(
                "{} scale factors for {num_hosts} hosts",
                scale_factors.len()
            )));
        } else {
            scale_factors.iter().map(|&s| s as u64).collect()
        };
        let total: u64 = weights.iter().sum();
        if total == 0 {
            return Err(ConfigError::ScaleFactors("scale factors sum to zero".into()));
        }

        let mut bounds = Vec::with_capacity(num_hosts + 1);
        let mut prefix = 0u64;
        bounds.push(0);
        for w in weights {
            prefix += w;
            let b = (num_nodes as u128 * prefix as u128 / total as u128) as u64;
            bounds.push(b);
        }

        let blocks = Self { bounds };
        blocks.check_coverage(num_nodes)?;
        Ok(blocks)
    }

    fn check_coverage(&self, num_nodes: u64) -> Result<(), ConfigError> {
        if let Some(w) = self.bounds.windows(2).find(|w| w[0] > w[1]) {
            return Err(ConfigError::UnassignedNode(w[1]));
        }
        match self.bounds.last() {
            Some(&end) if end == num_nodes => Ok(()),
            Some(&end) => Err(ConfigError::UnassignedNode(end)),
            None => Err(ConfigError::UnassignedNode(0)),
        }
    }

    pub fn num_hosts(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Master host of `gid`.
    #[inline]
    pub fn owner(&self, gid: u64) -> HostId {
        // first bound strictly greater than gid, minus the leading zero
        self.bounds[1..].partition_point(|&b| b <= gid)
    }

    /// Global ids mastered by `host`.
    pub fn range(&self, host: HostId) -> Range<u64> {
        self.bounds[host]..self.bounds[host + 1]
    }
}

/// A `rows × cols` arrangement of hosts, as square as the host count allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
}

impl Grid {
    pub fn for_hosts(num_hosts: usize) -> Self {
        let mut rows = (num_hosts as f64).sqrt() as usize;
        while rows > 1 && num_hosts % rows != 0 {
            rows -= 1;
        }
        let rows = rows.max(1);
        Self {
            rows,
            cols: num_hosts / rows,
        }
    }

    #[inline]
    pub fn row_of(&self, host: HostId) -> usize {
        host / self.cols
    }

    #[inline]
    pub fn col_of(&self, host: HostId) -> usize {
        host % self.cols
    }

    #[inline]
    pub fn host_at(&self, row: usize, col: usize) -> HostId {
        row * self.cols + col
    }
}

/// One host's fragment of the partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAssignment {
    pub host: HostId,
    pub masters: Range<u64>,
    /// Non-owned resident global ids, ascending.
    pub mirrors: Vec<u64>,
    /// Edges held by this host, sorted by `(src, dst)`.
    pub edges: Vec<(u64, u64)>,
    /// For master `masters.start + i`, the peers that mirror it, ascending.
    pub mirror_hosts: Vec<Vec<HostId>>,
}

/// A strategy bound to a host count and a concrete graph.
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    strategy: CutStrategy,
    blocks: MasterBlocks,
    grid: Grid,
    in_degrees: Vec<u64>,
}

impl PartitionPlan {
    pub fn new(graph: &EdgeList, num_hosts: usize, cfg: &PartitionConfig) -> Result<Self, ConfigError> {
        graph.validate()?;
        let blocks = MasterBlocks::new(graph.num_nodes(), num_hosts, &cfg.scale_factors)?;
        let in_degrees = match cfg.strategy {
            CutStrategy::HybridCut { threshold } => {
                if threshold == 0 {
                    return Err(ConfigError::InvalidStrategy(
                        "hybrid-cut threshold must be positive".into(),
                    ));
                }
                graph.in_degrees()
            }
            _ => Vec::new(),
        };
        Ok(Self {
            strategy: cfg.strategy,
            blocks,
            grid: Grid::for_hosts(num_hosts),
            in_degrees,
        })
    }

    pub fn strategy(&self) -> CutStrategy {
        self.strategy
    }

    pub fn blocks(&self) -> &MasterBlocks {
        &self.blocks
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn num_hosts(&self) -> usize {
        self.blocks.num_hosts()
    }

    #[inline]
    pub fn owner(&self, gid: u64) -> HostId {
        self.blocks.owner(gid)
    }

    /// Host that stores edge `(src, dst)`.
    #[inline]
    pub fn edge_host(&self, src: u64, dst: u64) -> HostId {
        match self.strategy {
            CutStrategy::EdgeCut => self.owner(src),
            CutStrategy::CartesianCut => self.grid_host(src, dst),
            CutStrategy::HybridCut { threshold } => {
                if self.in_degrees[dst as usize] > threshold {
                    self.grid_host(src, dst)
                } else {
                    self.owner(src)
                }
            }
        }
    }

    /// Block at (row of `src`'s owner, column of `dst`'s owner).
    #[inline]
    fn grid_host(&self, src: u64, dst: u64) -> HostId {
        let g = self.grid;
        g.host_at(g.row_of(self.owner(src)), g.col_of(self.owner(dst)))
    }

    /// Compute `host`'s fragment.
    pub fn assign(&self, graph: &EdgeList, host: HostId) -> Result<HostAssignment, ConfigError> {
        let num_hosts = self.num_hosts();
        if host >= num_hosts {
            return Err(ConfigError::InvalidHost { host, num_hosts });
        }
        let masters = self.blocks.range(host);

        let mut edges: Vec<(u64, u64)> = graph
            .edges()
            .par_iter()
            .copied()
            .filter(|&(u, v)| self.edge_host(u, v) == host)
            .collect();
        edges.par_sort_unstable();

        let is_master = |g: u64| masters.contains(&g);
        let mut mirrors: Vec<u64> = edges
            .par_iter()
            .flat_map_iter(|&(u, v)| [u, v])
            .filter(|&g| !is_master(g))
            .collect();
        mirrors.par_sort_unstable();
        mirrors.dedup();

        // (master gid, peer) pairs for every remote edge touching one of our masters
        let mut remote: Vec<(u64, HostId)> = graph
            .edges()
            .par_iter()
            .flat_map_iter(|&(u, v)| {
                let h = self.edge_host(u, v);
                let mut hits = Vec::new();
                if h != host {
                    if is_master(u) {
                        hits.push((u, h));
                    }
                    if is_master(v) {
                        hits.push((v, h));
                    }
                }
                hits
            })
            .collect();
        remote.par_sort_unstable();

        let mut mirror_hosts = vec![Vec::new(); (masters.end - masters.start) as usize];
        for (gid, group) in &remote.into_iter().dedup().chunk_by(|&(g, _)| g) {
            mirror_hosts[(gid - masters.start) as usize] = group.map(|(_, h)| h).collect();
        }

        Ok(HostAssignment {
            host,
            masters,
            mirrors,
            edges,
            mirror_hosts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_blocks_cover_everything() {
        let b = MasterBlocks::new(10, 3, &[]).unwrap();
        assert_eq!(b.range(0), 0..3);
        assert_eq!(b.range(1), 3..6);
        assert_eq!(b.range(2), 6..10);
        for g in 0..10 {
            assert!(b.range(b.owner(g)).contains(&g));
        }
    }

    #[test]
    fn weighted_blocks_follow_scale() {
        let b = MasterBlocks::new(12, 2, &[1, 3]).unwrap();
        assert_eq!(b.range(0), 0..3);
        assert_eq!(b.range(1), 3..12);
    }

    #[test]
    fn zero_weight_host_gets_nothing() {
        let b = MasterBlocks::new(8, 3, &[1, 0, 1]).unwrap();
        assert!(b.range(1).is_empty());
        assert_eq!(b.owner(5), 2);
    }

    #[test]
    fn bad_scale_factors() {
        assert!(matches!(
            MasterBlocks::new(8, 2, &[1]),
            Err(ConfigError::ScaleFactors(_))
        ));
        assert!(matches!(
            MasterBlocks::new(8, 2, &[0, 0]),
            Err(ConfigError::ScaleFactors(_))
        ));
    }

    #[test]
    fn grid_shapes() {
        assert_eq!(Grid::for_hosts(4), Grid { rows: 2, cols: 2 });
        assert_eq!(Grid::for_hosts(6), Grid { rows: 2, cols: 3 });
        assert_eq!(Grid::for_hosts(7), Grid { rows: 1, cols: 7 });
        assert_eq!(Grid::for_hosts(1), Grid { rows: 1, cols: 1 });
        let g = Grid::for_hosts(6);
        assert_eq!(g.host_at(g.row_of(4), g.col_of(4)), 4);
    }

    #[test]
    fn edge_cut_keeps_edges_with_source() {
        let g = EdgeList::from_edges(vec![(0, 3), (3, 0), (1, 2)]);
        let plan = PartitionPlan::new(&g, 2, &PartitionConfig::default()).unwrap();
        let a0 = plan.assign(&g, 0).unwrap();
        assert_eq!(a0.masters, 0..2);
        assert_eq!(a0.edges, vec![(0, 3), (1, 2)]);
        assert_eq!(a0.mirrors, vec![2, 3]);
        // host 1 holds (3, 0), so it mirrors master 0
        assert_eq!(a0.mirror_hosts, vec![vec![1], vec![]]);
    }

    #[test]
    fn hybrid_puts_high_degree_on_grid() {
        // node 0 has in-degree 3 > threshold 2; node 3 has in-degree 1
        let g = EdgeList::new(4, vec![(1, 0), (2, 0), (3, 0), (0, 3)]);
        let cfg = PartitionConfig::new(CutStrategy::HybridCut { threshold: 2 });
        let plan = PartitionPlan::new(&g, 4, &cfg).unwrap();
        // 2x2 grid: column of host 0 is {0, 2}
        assert_eq!(plan.edge_host(1, 0), 0);
        assert_eq!(plan.edge_host(2, 0), 2);
        assert_eq!(plan.edge_host(3, 0), 2);
        // low degree stays with the source
        assert_eq!(plan.edge_host(0, 3), 0);
    }

    #[test]
    fn invalid_host_rejected() {
        let g = EdgeList::from_edges(vec![(0, 1)]);
        let plan = PartitionPlan::new(&g, 2, &PartitionConfig::default()).unwrap();
        assert_eq!(
            plan.assign(&g, 2),
            Err(ConfigError::InvalidHost { host: 2, num_hosts: 2 })
        );
    }
}
