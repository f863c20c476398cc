//! Distributed accumulator: a host-local partial plus a collective reduction.
//!
//! Concurrency strategy: **per-thread-then-merge**. The partial is sharded
//! into one slot per rayon worker (plus one for threads outside the pool),
//! each behind its own uncontended lock. `add` combines into the caller's
//! slot; `read_local` and `reduce` merge the slots with the operator. Any
//! `ReduceValue` works, not just types with a native atomic.

use parking_lot::Mutex;

use crate::algs::communicator::Communicator;
use crate::algs::reduction::{ReduceOp, ReduceValue};
use crate::graph_error::GraphError;

#[repr(align(64))]
struct Slot<T>(Mutex<T>);

/// A host-local partial under `op`, reducible across every host.
pub struct DistAccumulator<T: ReduceValue> {
    op: ReduceOp,
    slots: Box<[Slot<T>]>,
}

impl<T: ReduceValue> DistAccumulator<T> {
    /// An accumulator sized for the current rayon pool.
    pub fn new(op: ReduceOp) -> Self {
        Self::with_threads(op, rayon::current_num_threads())
    }

    /// An accumulator with one slot per worker of a `threads`-wide pool.
    pub fn with_threads(op: ReduceOp, threads: usize) -> Self {
        let slots = (0..threads.max(1) + 1)
            .map(|_| Slot(Mutex::new(T::identity(op))))
            .collect();
        Self { op, slots }
    }

    /// Summing accumulator (the common termination counter).
    pub fn sum() -> Self {
        Self::new(ReduceOp::Sum)
    }

    /// Minimum accumulator.
    pub fn min() -> Self {
        Self::new(ReduceOp::Min)
    }

    /// Maximum accumulator.
    pub fn max() -> Self {
        Self::new(ReduceOp::Max)
    }

    /// The combine operator.
    pub fn op(&self) -> ReduceOp {
        self.op
    }

    #[inline]
    fn slot(&self) -> &Mutex<T> {
        let n = self.slots.len();
        let idx = match rayon::current_thread_index() {
            Some(i) => i % (n - 1),
            None => n - 1,
        };
        &self.slots[idx].0
    }

    /// Combine `delta` into this host's partial. Safe from any thread.
    #[inline]
    pub fn add(&self, delta: T) {
        let mut g = self.slot().lock();
        *g = T::combine(self.op, *g, delta);
    }

    /// Set the local partial to the operator's identity.
    pub fn reset(&mut self) {
        let id = T::identity(self.op);
        for s in self.slots.iter_mut() {
            *s.0.get_mut() = id;
        }
    }

    /// This host's un-combined partial. Diagnostic only: never decide
    /// termination on it.
    pub fn read_local(&self) -> T {
        self.op.fold(self.slots.iter().map(|s| *s.0.lock()))
    }

    /// Blocking collective: combine every host's partial with the operator.
    /// Every host receives the identical value.
    pub fn reduce<C: Communicator>(&self, comm: &C) -> Result<T, GraphError> {
        comm.all_reduce(self.read_local(), self.op)
    }
}

impl<T: ReduceValue> std::fmt::Debug for DistAccumulator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistAccumulator")
            .field("op", &self.op)
            .field("local", &self.read_local())
            .finish()
    }
}
