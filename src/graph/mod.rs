//! Partitioned graph fragments and the id spaces they translate between.

pub mod marshal;
pub mod partitioned;
pub mod range;

pub use self::marshal::MarshalGraph;
pub use self::partitioned::PartitionedGraph;
pub use self::range::NodeRange;

/// Node id in the original graph, `[0, N)`.
pub type GlobalId = u64;
/// Dense per-host id over resident nodes, masters first.
pub type LocalId = u32;
