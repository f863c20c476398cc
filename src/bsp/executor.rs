//! Parallel application of vertex programs and the BSP round loop.

use log::{debug, warn};
use num_traits::Zero;
use rayon::prelude::*;

use super::config::RunConfig;
use super::context::{RoundReport, RunContext};
use crate::algs::communicator::Communicator;
use crate::algs::reduction::{ReduceOp, ReduceValue};
use crate::data::accumulator::DistAccumulator;
use crate::graph::{LocalId, NodeRange};
use crate::graph_error::GraphError;

/// A kernel applied once per node of a range.
///
/// Implementations capture the graph, dirty bitsets and accumulators they
/// touch. Side effects on distinct nodes must be independent except through
/// atomics, the bitset, or an accumulator.
pub trait VertexProgram: Sync {
    fn apply(&self, lid: LocalId);
}

/// A kernel that may enqueue more work while it runs.
pub trait WorklistProgram: Sync {
    type Item: Send;

    fn apply(&self, item: Self::Item, worklist: &mut Worklist<Self::Item>);
}

/// Items pushed by one [`WorklistProgram::apply`] call.
#[derive(Debug)]
pub struct Worklist<T> {
    pushed: Vec<T>,
}

impl<T> Worklist<T> {
    fn new() -> Self {
        Self { pushed: Vec::new() }
    }

    pub fn push(&mut self, item: T) {
        self.pushed.push(item);
    }
}

/// Runs vertex programs on this host's worker threads.
///
/// With no dedicated pool, work goes to rayon's global pool. Hosts that share
/// a process (threaded tests) each get their own pool.
#[derive(Debug, Default)]
pub struct BspExecutor {
    pool: Option<rayon::ThreadPool>,
}

impl BspExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor with a dedicated pool of `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self, GraphError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| GraphError::Backend(format!("rayon pool: {e}")))?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn from_config(cfg: &RunConfig) -> Result<Self, GraphError> {
        match cfg.num_threads {
            Some(n) => Self::with_threads(n),
            None => Ok(Self::new()),
        }
    }

    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(p) => p.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Run `f` inside this executor's pool.
    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(p) => p.install(f),
            None => f(),
        }
    }

    /// An accumulator with one slot per worker of this executor.
    pub fn accumulator<T: ReduceValue>(&self, op: ReduceOp) -> DistAccumulator<T> {
        DistAccumulator::with_threads(op, self.num_threads())
    }

    /// Apply `program` to every node of `range`. Returns once all are done.
    pub fn do_all<P: VertexProgram + ?Sized>(&self, range: &NodeRange, program: &P) {
        self.install(|| range.par_iter().for_each(|lid| program.apply(lid)));
    }

    /// Process `initial` and everything transitively pushed from it.
    ///
    /// Items are handled in waves: each wave runs in parallel and the items it
    /// pushes form the next wave. Returns the number of items processed.
    pub fn for_each<P: WorklistProgram>(&self, initial: Vec<P::Item>, program: &P) -> usize {
        self.install(|| {
            let mut wave = initial;
            let mut processed = 0;
            while !wave.is_empty() {
                processed += wave.len();
                wave = wave
                    .into_par_iter()
                    .flat_map_iter(|item| {
                        let mut wl = Worklist::new();
                        program.apply(item, &mut wl);
                        wl.pushed
                    })
                    .collect();
            }
            processed
        })
    }

    /// Drive the round state machine.
    ///
    /// Each round resets `accum`, calls `step` (local compute followed by
    /// synchronization), then reduces `accum` across every host. The loop
    /// continues while the reduced value is nonzero and fewer than
    /// `max_iterations` rounds have run. At least one round always runs.
    pub fn run_rounds<C, T, F>(
        &self,
        comm: &C,
        ctx: &mut RunContext,
        max_iterations: u32,
        accum: &mut DistAccumulator<T>,
        mut step: F,
    ) -> Result<RoundReport<T>, GraphError>
    where
        C: Communicator,
        T: ReduceValue + Zero,
        F: FnMut(&RunContext, &DistAccumulator<T>) -> Result<(), GraphError>,
    {
        ctx.reset_rounds();
        let mut local_work = Vec::new();
        let converged = loop {
            accum.reset();
            step(ctx, accum)?;
            let local = accum.read_local();
            local_work.push(local);
            // every host branches on the same reduced value
            let global = accum.reduce(comm)?;
            ctx.advance();
            debug!(
                "[{}] {} round {}: local work {:?}, global {:?}",
                comm.rank(),
                ctx.identifier(),
                ctx.round(),
                local,
                global
            );
            if global.is_zero() {
                break true;
            }
            if ctx.round() >= max_iterations {
                warn!(
                    "[{}] {} stopped at the {max_iterations}-round ceiling before converging",
                    comm.rank(),
                    ctx.identifier()
                );
                break false;
            }
        };
        Ok(RoundReport {
            rounds: ctx.round(),
            converged,
            local_work,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Tally<'a>(&'a AtomicU64);

    impl VertexProgram for Tally<'_> {
        fn apply(&self, lid: LocalId) {
            self.0.fetch_add(lid as u64, Ordering::Relaxed);
        }
    }

    #[test]
    fn do_all_visits_every_node_once() {
        let exec = BspExecutor::with_threads(3).unwrap();
        let sum = AtomicU64::new(0);
        exec.do_all(&NodeRange::Contiguous(0..100), &Tally(&sum));
        assert_eq!(sum.load(Ordering::Relaxed), 4950);
    }

    struct Halve;

    impl WorklistProgram for Halve {
        type Item = u32;
        fn apply(&self, item: u32, wl: &mut Worklist<u32>) {
            if item > 1 {
                wl.push(item / 2);
                wl.push(item / 2);
            }
        }
    }

    #[test]
    fn worklist_processes_pushed_items() {
        let exec = BspExecutor::new();
        // 8 -> 2×4 -> 4×2 -> 8×1
        assert_eq!(exec.for_each(vec![8], &Halve), 1 + 2 + 4 + 8);
        assert_eq!(exec.for_each(Vec::new(), &Halve), 0);
    }

    #[test]
    fn rounds_stop_on_zero() {
        let exec = BspExecutor::new();
        let mut ctx = RunContext::new("count", 0);
        let mut acc = exec.accumulator::<u64>(ReduceOp::Sum);
        let mut left = 3u64;
        let report = exec
            .run_rounds(&NoComm, &mut ctx, 10, &mut acc, |_, a| {
                a.add(left);
                left = left.saturating_sub(1);
                Ok(())
            })
            .unwrap();
        assert!(report.converged);
        assert_eq!(report.rounds, 4);
        assert_eq!(report.local_work, vec![3, 2, 1, 0]);
    }

    #[test]
    fn ceiling_is_not_an_error() {
        let exec = BspExecutor::new();
        let mut ctx = RunContext::new("forever", 0);
        let mut acc = exec.accumulator::<u64>(ReduceOp::Sum);
        let report = exec
            .run_rounds(&NoComm, &mut ctx, 5, &mut acc, |_, a| {
                a.add(1);
                Ok(())
            })
            .unwrap();
        assert!(!report.converged);
        assert_eq!(report.rounds, 5);
    }

    #[test]
    fn step_errors_propagate() {
        let exec = BspExecutor::new();
        let mut ctx = RunContext::new("fail", 0);
        let mut acc = exec.accumulator::<u64>(ReduceOp::Sum);
        let err = exec
            .run_rounds(&NoComm, &mut ctx, 5, &mut acc, |_, _| {
                Err(GraphError::Backend("boom".into()))
            })
            .unwrap_err();
        assert_eq!(err, GraphError::Backend("boom".into()));
    }
}
