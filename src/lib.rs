#![cfg_attr(docsrs, feature(doc_cfg))]
//! # graph-bsp
//!
//! graph-bsp is a distributed, vertex-centric graph-analytics runtime. A large
//! graph is partitioned across host processes; iterative bulk-synchronous
//! vertex programs (breadth-first search is the bundled example) run over the
//! fragments, and per-node state is reconciled between each node's master copy
//! and its mirrors after every round.
//!
//! ## Features
//! - Three deterministic cut strategies (edge-cut, cartesian vertex-cut and
//!   hybrid-cut) with per-host capacity weights
//! - Lock-free dirty-bit tracking ([`DynamicBitSet`]) and a distributed
//!   accumulator ([`DistAccumulator`]) for globally agreed termination
//! - A reduce/broadcast synchronization engine driven by a small
//!   configuration value per call
//! - Work-stealing local execution on rayon, with a round state machine that
//!   stops on convergence or a round ceiling
//! - Pluggable transports: single host, in-process threads, or MPI
//!   (`mpi-support` feature)
//!
//! ## Round structure
//!
//! Every round is `LOCAL_COMPUTE → SYNCHRONIZE → CHECK_TERMINATION`. Worker
//! threads write node data only during compute; the sync engine writes it only
//! during synchronize. The termination decision is made on the all-reduced
//! accumulator value, which every host receives identically.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! graph-bsp = "0.3"
//! # features = ["mpi-support"]
//! ```
//!
//! See `demos/bfs_threads.rs` for a multi-host run on threads.

pub mod algs;
pub mod apps;
pub mod bsp;
pub mod data;
pub mod debug_invariants;
pub mod graph;
pub mod graph_error;
pub mod partitioning;
pub mod sync;

pub use data::{DistAccumulator, DynamicBitSet};
pub use debug_invariants::DebugInvariants;
pub use graph_error::GraphError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    pub use crate::algs::reduction::{ReduceOp, ReduceValue};
    pub use crate::bsp::{
        Backend, BspExecutor, HeteroConfig, Personality, RoundReport, RunConfig, RunContext,
        RunStats, VertexProgram, Worklist, WorklistProgram,
    };
    pub use crate::data::{DistAccumulator, DynamicBitSet};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::graph::{GlobalId, LocalId, NodeRange, PartitionedGraph};
    pub use crate::graph_error::GraphError;
    pub use crate::partitioning::{CutStrategy, EdgeList, PartitionConfig};
    pub use crate::sync::{
        AtomicField, BitsetSource, BroadcastPolicy, NodeField, ReadLocation, SyncConfig,
        SyncEngine, WriteLocation,
    };
}
