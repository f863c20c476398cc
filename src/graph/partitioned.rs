//! One host's fragment of a partitioned graph, with its node data.
//!
//! Local ids are dense: masters first (ascending global id), then mirrors
//! (ascending global id). Masters translate arithmetically; mirrors through a
//! hash map. Adjacency is CSR over local ids.

use std::ops::Range;
use std::sync::Arc;

use ahash::RandomState;
use hashbrown::HashMap;
use log::info;
use rayon::prelude::*;

use super::marshal::MarshalGraph;
use super::range::NodeRange;
use super::{GlobalId, LocalId};
use crate::debug_invariants::DebugInvariants;
use crate::graph_error::GraphError;
use crate::partitioning::error::ConfigError;
use crate::partitioning::plan::{HostAssignment, MasterBlocks, PartitionPlan};
use crate::partitioning::{CutStrategy, EdgeList, HostId, PartitionConfig, PartitionStats};

pub struct PartitionedGraph<N> {
    host: HostId,
    num_hosts: usize,
    strategy: CutStrategy,
    blocks: MasterBlocks,
    masters: Range<GlobalId>,
    mirrors: Box<[GlobalId]>,
    mirror_lids: HashMap<GlobalId, LocalId, RandomState>,
    /// Mirror local ids grouped by owning host.
    mirror_ranges: Vec<Range<LocalId>>,
    /// Peers mirroring each master, indexed by master local id.
    mirror_hosts: Vec<Vec<HostId>>,
    row_start: Vec<u64>,
    edge_dst: Vec<LocalId>,
    with_edges: Arc<[LocalId]>,
    data: Box<[N]>,
    global_nodes: u64,
    global_edges: usize,
}

impl<N: Default + Send + Sync> PartitionedGraph<N> {
    /// Build `host`'s fragment of `graph` under `cfg`.
    ///
    /// Every host calls this with the same edge list and configuration; no
    /// communication is needed.
    pub fn construct(
        host: HostId,
        num_hosts: usize,
        graph: &EdgeList,
        cfg: &PartitionConfig,
    ) -> Result<Self, GraphError> {
        let plan = PartitionPlan::new(graph, num_hosts, cfg)?;
        let assignment = plan.assign(graph, host)?;
        let g = Self::from_assignment(&plan, assignment, graph)?;

        let stats = g.stats();
        info!(
            "[{host}] {} fragment: {} masters, {} mirrors, {} edges",
            g.strategy.name(),
            stats.masters,
            stats.mirrors,
            stats.edges
        );
        crate::debug_invariants!(g.validate_invariants(), "PartitionedGraph::construct");
        Ok(g)
    }

    fn from_assignment(
        plan: &PartitionPlan,
        a: HostAssignment,
        graph: &EdgeList,
    ) -> Result<Self, GraphError> {
        let num_masters = a.masters.end - a.masters.start;
        let resident = num_masters + a.mirrors.len() as u64;
        if resident > LocalId::MAX as u64 {
            return Err(ConfigError::TooManyNodes(resident).into());
        }
        let num_masters = num_masters as LocalId;
        let num_local = resident as usize;

        let mirror_lids: HashMap<GlobalId, LocalId, RandomState> = a
            .mirrors
            .iter()
            .enumerate()
            .map(|(i, &g)| (g, num_masters + i as LocalId))
            .collect();

        // mirrors are sorted by gid and master blocks are contiguous, so each
        // owner's mirrors form one run
        let blocks = plan.blocks().clone();
        let mirror_ranges = (0..plan.num_hosts())
            .map(|h| {
                let r = blocks.range(h);
                let lo = a.mirrors.partition_point(|&g| g < r.start) as LocalId;
                let hi = a.mirrors.partition_point(|&g| g < r.end) as LocalId;
                num_masters + lo..num_masters + hi
            })
            .collect();

        let masters = a.masters.clone();
        let lid_of = |g: GlobalId| -> LocalId {
            if masters.contains(&g) {
                (g - masters.start) as LocalId
            } else {
                mirror_lids[&g]
            }
        };

        let mut local_edges: Vec<(LocalId, LocalId)> =
            a.edges.iter().map(|&(u, v)| (lid_of(u), lid_of(v))).collect();
        local_edges.par_sort_unstable();

        let mut row_start = vec![0u64; num_local + 1];
        for &(u, _) in &local_edges {
            row_start[u as usize + 1] += 1;
        }
        for i in 0..num_local {
            row_start[i + 1] += row_start[i];
        }
        let edge_dst: Vec<LocalId> = local_edges.iter().map(|&(_, v)| v).collect();
        let with_edges: Arc<[LocalId]> = (0..num_local as LocalId)
            .filter(|&l| row_start[l as usize + 1] > row_start[l as usize])
            .collect();

        let data = (0..num_local).map(|_| N::default()).collect();

        Ok(Self {
            host: a.host,
            num_hosts: plan.num_hosts(),
            strategy: plan.strategy(),
            blocks,
            masters: a.masters,
            mirrors: a.mirrors.into_boxed_slice(),
            mirror_lids,
            mirror_ranges,
            mirror_hosts: a.mirror_hosts,
            row_start,
            edge_dst,
            with_edges,
            data,
            global_nodes: graph.num_nodes(),
            global_edges: graph.num_edges(),
        })
    }
}

impl<N> PartitionedGraph<N> {
    pub fn host(&self) -> HostId {
        self.host
    }

    pub fn num_hosts(&self) -> usize {
        self.num_hosts
    }

    pub fn strategy(&self) -> CutStrategy {
        self.strategy
    }

    pub fn global_num_nodes(&self) -> u64 {
        self.global_nodes
    }

    pub fn global_num_edges(&self) -> usize {
        self.global_edges
    }

    /// Resident nodes: masters plus mirrors.
    pub fn num_local_nodes(&self) -> usize {
        self.data.len()
    }

    pub fn num_masters(&self) -> usize {
        (self.masters.end - self.masters.start) as usize
    }

    pub fn num_local_edges(&self) -> usize {
        self.edge_dst.len()
    }

    /// Every resident node.
    pub fn all_nodes_range(&self) -> NodeRange {
        NodeRange::Contiguous(0..self.data.len() as LocalId)
    }

    /// Resident nodes with at least one local out-edge.
    pub fn all_nodes_with_edges_range(&self) -> NodeRange {
        NodeRange::Sparse(self.with_edges.clone())
    }

    pub fn masters_range(&self) -> NodeRange {
        NodeRange::Contiguous(0..self.num_masters() as LocalId)
    }

    pub fn mirrors_range(&self) -> NodeRange {
        NodeRange::Contiguous(self.num_masters() as LocalId..self.data.len() as LocalId)
    }

    /// Local ids of the mirrors whose master lives on `owner`.
    pub fn mirrors_owned_by(&self, owner: HostId) -> Range<LocalId> {
        self.mirror_ranges[owner].clone()
    }

    /// Peers holding a mirror of master `lid`.
    pub fn mirror_hosts(&self, lid: LocalId) -> &[HostId] {
        &self.mirror_hosts[lid as usize]
    }

    #[inline]
    pub fn get_data(&self, lid: LocalId) -> &N {
        &self.data[lid as usize]
    }

    #[inline]
    pub fn get_gid(&self, lid: LocalId) -> GlobalId {
        let m = self.num_masters() as LocalId;
        if lid < m {
            self.masters.start + lid as u64
        } else {
            self.mirrors[(lid - m) as usize]
        }
    }

    /// Local id of `gid`, if it is resident here.
    #[inline]
    pub fn get_lid(&self, gid: GlobalId) -> Option<LocalId> {
        if self.masters.contains(&gid) {
            Some((gid - self.masters.start) as LocalId)
        } else {
            self.mirror_lids.get(&gid).copied()
        }
    }

    /// Whether this host is `gid`'s master.
    #[inline]
    pub fn is_owned(&self, gid: GlobalId) -> bool {
        self.masters.contains(&gid)
    }

    #[inline]
    pub fn is_local(&self, gid: GlobalId) -> bool {
        self.get_lid(gid).is_some()
    }

    /// Master host of any global id.
    #[inline]
    pub fn owner(&self, gid: GlobalId) -> HostId {
        self.blocks.owner(gid)
    }

    /// Edge indices of `lid`'s out-edges.
    #[inline]
    pub fn edges(&self, lid: LocalId) -> Range<usize> {
        let l = lid as usize;
        self.row_start[l] as usize..self.row_start[l + 1] as usize
    }

    #[inline]
    pub fn edge_dst(&self, edge: usize) -> LocalId {
        self.edge_dst[edge]
    }

    #[inline]
    pub fn neighbors(&self, lid: LocalId) -> &[LocalId] {
        &self.edge_dst[self.edges(lid)]
    }

    pub fn stats(&self) -> PartitionStats {
        PartitionStats {
            host: self.host,
            masters: self.num_masters() as u64,
            mirrors: self.mirrors.len() as u64,
            edges: self.edge_dst.len() as u64,
        }
    }

    /// Plain-array copy of the fragment for device backends.
    pub fn marshal(&self) -> MarshalGraph {
        MarshalGraph {
            host: self.host,
            num_masters: self.num_masters() as u32,
            row_start: self.row_start.clone(),
            edge_dst: self.edge_dst.clone(),
            lid_to_gid: (0..self.data.len() as LocalId).map(|l| self.get_gid(l)).collect(),
        }
    }
}

impl<N> DebugInvariants for PartitionedGraph<N> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "PartitionedGraph");
    }

    fn validate_invariants(&self) -> Result<(), GraphError> {
        let fail = |msg: String| Err(GraphError::InvariantViolation(msg));
        let n = self.data.len();

        if self.blocks.range(self.host) != self.masters {
            return fail(format!("host {} masters {:?} disagree with block map", self.host, self.masters));
        }
        if self.mirror_hosts.len() != self.num_masters() {
            return fail("mirror host table does not cover every master".into());
        }
        if self.row_start.len() != n + 1 || self.row_start[n] as usize != self.edge_dst.len() {
            return fail("CSR offsets do not match the edge array".into());
        }
        if let Some(w) = self.mirrors.windows(2).find(|w| w[0] >= w[1]) {
            return fail(format!("mirrors not strictly ascending at {}", w[1]));
        }
        for lid in 0..n as LocalId {
            let gid = self.get_gid(lid);
            if self.get_lid(gid) != Some(lid) {
                return fail(format!("lid {lid} -> gid {gid} does not round-trip"));
            }
            if gid >= self.global_nodes {
                return fail(format!("gid {gid} outside [0, {})", self.global_nodes));
            }
            if (lid as usize) >= self.num_masters() && self.owner(gid) == self.host {
                return fail(format!("mirror gid {gid} is mastered locally"));
            }
        }
        if let Some(&d) = self.edge_dst.iter().find(|&&d| d as usize >= n) {
            return fail(format!("edge destination {d} is not resident"));
        }
        if self.with_edges.iter().any(|&l| self.edges(l).is_empty()) {
            return fail("with-edges range lists a node without edges".into());
        }
        Ok(())
    }
}

impl<N> std::fmt::Debug for PartitionedGraph<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedGraph")
            .field("host", &self.host)
            .field("num_hosts", &self.num_hosts)
            .field("strategy", &self.strategy)
            .field("masters", &self.masters)
            .field("mirrors", &self.mirrors.len())
            .field("edges", &self.edge_dst.len())
            .finish()
    }
}
