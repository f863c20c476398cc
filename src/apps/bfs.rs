//! Breadth-first search, pull style.
//!
//! The fragment is built from the transposed edge list, so a node's local
//! out-edges lead to its in-neighbours. Each round a node pulls the previous
//! round's distances of its in-neighbours and keeps the smallest `d + 1`. The
//! frontier therefore advances exactly one level per round.

use std::sync::atomic::{AtomicU32, Ordering};

use log::info;

use crate::algs::communicator::Communicator;
use crate::algs::reduction::ReduceOp;
use crate::bsp::{
    Backend, BspExecutor, FieldSlice, RoundReport, RunConfig, RunContext, RunStats, VertexProgram,
    gather_field, scatter_field,
};
use crate::data::accumulator::DistAccumulator;
use crate::data::bitset::DynamicBitSet;
use crate::graph::{GlobalId, LocalId, PartitionedGraph};
use crate::graph_error::GraphError;
use crate::partitioning::{ConfigError, EdgeList, HostId, PartitionConfig};
use crate::sync::{AtomicField, BitsetSource, ReadLocation, SyncConfig, WriteLocation, sync};

/// Distance of unreached nodes.
pub const INFINITY: u32 = u32::MAX / 4;

#[derive(Debug, Default)]
pub struct NodeData {
    pub dist_current: AtomicU32,
    /// `dist_current` as of the end of the previous round.
    pub dist_old: AtomicU32,
}

/// The synchronized distance field.
pub const DIST_CURRENT: AtomicField<NodeData, AtomicU32> =
    AtomicField::new("dist_current", |n| &n.dist_current);

pub type BfsGraph = PartitionedGraph<NodeData>;

/// Build `host`'s fragment of `edges` for pull-style BFS.
pub fn build_graph(
    host: HostId,
    num_hosts: usize,
    edges: &EdgeList,
    cfg: &PartitionConfig,
) -> Result<BfsGraph, GraphError> {
    PartitionedGraph::construct(host, num_hosts, &edges.transposed(), cfg)
}

pub struct InitializeGraph<'g> {
    graph: &'g BfsGraph,
    src_node: GlobalId,
}

impl InitializeGraph<'_> {
    pub fn go(exec: &BspExecutor, graph: &BfsGraph, src_node: GlobalId) {
        exec.do_all(&graph.all_nodes_range(), &InitializeGraph { graph, src_node });
    }
}

impl VertexProgram for InitializeGraph<'_> {
    fn apply(&self, lid: LocalId) {
        let d = if self.graph.get_gid(lid) == self.src_node { 0 } else { INFINITY };
        let node = self.graph.get_data(lid);
        node.dist_current.store(d, Ordering::Relaxed);
        node.dist_old.store(d, Ordering::Relaxed);
    }
}

pub struct Bfs<'g> {
    graph: &'g BfsGraph,
    dirty: &'g DynamicBitSet,
    accum: &'g DistAccumulator<u32>,
}

impl Bfs<'_> {
    /// Run rounds until no distance changes anywhere or the ceiling is hit.
    #[allow(clippy::too_many_arguments)]
    pub fn go<C: Communicator>(
        exec: &BspExecutor,
        comm: &C,
        graph: &BfsGraph,
        backend: &Backend,
        dirty: &DynamicBitSet,
        accum: &mut DistAccumulator<u32>,
        ctx: &mut RunContext,
        max_iterations: u32,
    ) -> Result<RoundReport<u32>, GraphError> {
        let nodes_with_edges = graph.all_nodes_with_edges_range();
        let all_nodes = graph.all_nodes_range();
        let cfg = SyncConfig::new(
            WriteLocation::Source,
            ReadLocation::Destination,
            ReduceOp::Min,
            BitsetSource::Dirty(dirty),
        );

        exec.run_rounds(comm, ctx, max_iterations, accum, |_, accum| {
            match backend {
                Backend::Cpu => exec.do_all(&nodes_with_edges, &Bfs { graph, dirty, accum }),
                Backend::Device(device) => {
                    let mut current = gather_field(graph, &DIST_CURRENT);
                    let mut old: Vec<u32> = all_nodes
                        .iter()
                        .map(|l| graph.get_data(l).dist_old.load(Ordering::Relaxed))
                        .collect();
                    let work = device.launch(
                        "BFS",
                        &nodes_with_edges,
                        &mut [FieldSlice::U32(&mut current), FieldSlice::U32(&mut old)],
                        dirty,
                    )?;
                    scatter_field(graph, &DIST_CURRENT, &current)?;
                    let work = u32::try_from(work)
                        .map_err(|_| GraphError::Backend(format!("work count {work} overflows")))?;
                    accum.add(work);
                }
            }
            sync(graph, comm, &DIST_CURRENT, &cfg)?;
            exec.do_all(&all_nodes, &SnapshotDistance { graph });
            Ok(())
        })
    }
}

impl VertexProgram for Bfs<'_> {
    fn apply(&self, src: LocalId) {
        let snode = self.graph.get_data(src);
        for &dst in self.graph.neighbors(src) {
            let new_dist = self.graph.get_data(dst).dist_old.load(Ordering::Relaxed) + 1;
            let old_dist = snode.dist_current.fetch_min(new_dist, Ordering::Relaxed);
            if old_dist > new_dist {
                self.dirty.set(src as usize);
                self.accum.add(1);
            }
        }
    }
}

/// Publish this round's distances for the next round to read.
struct SnapshotDistance<'g> {
    graph: &'g BfsGraph,
}

impl VertexProgram for SnapshotDistance<'_> {
    fn apply(&self, lid: LocalId) {
        let node = self.graph.get_data(lid);
        node.dist_old
            .store(node.dist_current.load(Ordering::Relaxed), Ordering::Relaxed);
    }
}

/// Global summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanityReport {
    pub visited: u64,
    pub max_distance: u32,
}

/// Counts owned nodes with a finite distance and tracks the largest one.
pub struct BfsSanityCheck<'g> {
    graph: &'g BfsGraph,
    visited: &'g DistAccumulator<u64>,
    current_max: AtomicU32,
}

impl BfsSanityCheck<'_> {
    pub fn go<C: Communicator>(
        exec: &BspExecutor,
        comm: &C,
        graph: &BfsGraph,
    ) -> Result<SanityReport, GraphError> {
        let visited = exec.accumulator::<u64>(ReduceOp::Sum);
        let max = exec.accumulator::<u32>(ReduceOp::Max);

        let check = BfsSanityCheck {
            graph,
            visited: &visited,
            current_max: AtomicU32::new(0),
        };
        exec.do_all(&graph.all_nodes_range(), &check);
        max.add(check.current_max.into_inner());

        let report = SanityReport {
            visited: visited.reduce(comm)?,
            max_distance: max.reduce(comm)?,
        };
        if graph.host() == 0 {
            info!("Number of nodes visited is {}", report.visited);
            info!("Max distance is {}", report.max_distance);
        }
        Ok(report)
    }
}

impl VertexProgram for BfsSanityCheck<'_> {
    fn apply(&self, lid: LocalId) {
        let dist = self.graph.get_data(lid).dist_current.load(Ordering::Relaxed);
        if self.graph.is_owned(self.graph.get_gid(lid)) && dist < INFINITY {
            self.visited.add(1);
            self.current_max.fetch_max(dist, Ordering::Relaxed);
        }
    }
}

/// `(gid, distance)` for every owned node, ascending by gid.
pub fn verify_output(graph: &BfsGraph) -> Vec<(GlobalId, u32)> {
    graph
        .masters_range()
        .iter()
        .map(|l| (graph.get_gid(l), graph.get_data(l).dist_current.load(Ordering::Relaxed)))
        .collect()
}

/// Everything one host learned from [`run`].
#[derive(Debug, Clone, Default)]
pub struct BfsOutcome {
    pub runs: Vec<RunStats>,
    pub sanity: Vec<SanityReport>,
    /// Filled when verification is on.
    pub output: Vec<(GlobalId, u32)>,
}

/// Initialise, run `cfg.num_runs` times with a sanity check after each run,
/// and optionally collect the owned distances.
pub fn run<C: Communicator>(
    graph: &BfsGraph,
    comm: &C,
    exec: &BspExecutor,
    backend: &Backend,
    cfg: &RunConfig,
) -> Result<BfsOutcome, GraphError> {
    let host = graph.host();
    if cfg.src_node >= graph.global_num_nodes() {
        return Err(ConfigError::SourceOutOfRange {
            src: cfg.src_node,
            num_nodes: graph.global_num_nodes(),
        }
        .into());
    }
    if host == 0 {
        info!("Max Iterations {}, Source Node ID {}", cfg.max_iterations, cfg.src_node);
    }

    let mut dirty = DynamicBitSet::with_size(graph.num_local_nodes());
    let mut accum = exec.accumulator::<u32>(ReduceOp::Sum);
    let mut ctx = RunContext::new("BFS", 0);
    let mut outcome = BfsOutcome::default();

    info!("[{host}] InitializeGraph::go called");
    InitializeGraph::go(exec, graph, cfg.src_node);

    for run in 0..cfg.num_runs {
        info!("[{host}] BFS::go run {run} called");
        let report = Bfs::go(
            exec,
            comm,
            graph,
            backend,
            &dirty,
            &mut accum,
            &mut ctx,
            cfg.max_iterations,
        )?;
        if host == 0 {
            info!("NUM_ITERATIONS_{run} {}", report.rounds);
        }
        outcome.runs.push(RunStats {
            identifier: ctx.identifier(),
            run,
            rounds: report.rounds,
            converged: report.converged,
            work_items: report.local_work.iter().map(|&w| u64::from(w)).collect(),
        });
        outcome.sanity.push(BfsSanityCheck::go(exec, comm, graph)?);

        if run + 1 != cfg.num_runs {
            dirty.reset();
            ctx.next_run();
            InitializeGraph::go(exec, graph, cfg.src_node);
        }
    }

    if cfg.verify {
        outcome.output = verify_output(graph);
    }
    comm.barrier()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    fn single_host(edges: Vec<(u64, u64)>) -> BfsGraph {
        build_graph(0, 1, &EdgeList::from_edges(edges), &PartitionConfig::default()).unwrap()
    }

    #[test]
    fn chain_distances() {
        let g = single_host(vec![(0, 1), (1, 2), (2, 3)]);
        let exec = BspExecutor::with_threads(2).unwrap();
        let cfg = RunConfig::default().with_verify(true);
        let out = run(&g, &NoComm, &exec, &Backend::Cpu, &cfg).unwrap();
        assert_eq!(out.output, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert!(out.runs[0].converged);
        assert_eq!(out.runs[0].rounds, 4);
        assert_eq!(out.sanity[0], SanityReport { visited: 4, max_distance: 3 });
    }

    #[test]
    fn one_round_reaches_depth_one_only() {
        let g = single_host(vec![(0, 1), (1, 2), (2, 3)]);
        let exec = BspExecutor::with_threads(4).unwrap();
        let cfg = RunConfig::default().with_max_iterations(1).with_verify(true);
        let out = run(&g, &NoComm, &exec, &Backend::Cpu, &cfg).unwrap();
        assert_eq!(out.output, vec![(0, 0), (1, 1), (2, INFINITY), (3, INFINITY)]);
        assert!(!out.runs[0].converged);
        assert_eq!(out.runs[0].rounds, 1);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let g = single_host(vec![(0, 1), (0, 2), (2, 3), (4, 0)]);
        let exec = BspExecutor::new();
        let cfg = RunConfig::default().with_num_runs(3).with_verify(true);
        let out = run(&g, &NoComm, &exec, &Backend::Cpu, &cfg).unwrap();
        assert_eq!(out.runs.len(), 3);
        assert_eq!(out.runs[2].identifier, "BFS_2");
        assert!(out.runs.windows(2).all(|w| w[0].rounds == w[1].rounds));
        assert!(out.sanity.iter().all(|s| *s == SanityReport { visited: 4, max_distance: 2 }));
        assert_eq!(out.output[4], (4, INFINITY));
    }

    #[test]
    fn bad_source_rejected() {
        let g = single_host(vec![(0, 1)]);
        let cfg = RunConfig::default().with_src_node(9);
        let err = run(&g, &NoComm, &BspExecutor::new(), &Backend::Cpu, &cfg).unwrap_err();
        assert!(matches!(err, GraphError::Config(ConfigError::SourceOutOfRange { .. })));
    }
}
