//! Configuration errors raised while building a partition.

use thiserror::Error;

/// Errors from edge-list validation, strategy setup and host configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An edge references a node outside `[0, num_nodes)`.
    #[error("edge ({src}, {dst}) references a node outside [0, {num_nodes})")]
    DanglingEdge { src: u64, dst: u64, num_nodes: u64 },
    /// A global id ended up without a master host.
    #[error("global id {0} was not assigned to any host")]
    UnassignedNode(u64),
    /// Host id out of range for the configured host count.
    #[error("host {host} is out of range for {num_hosts} hosts")]
    InvalidHost { host: usize, num_hosts: usize },
    /// Scale factors have the wrong length or sum to zero.
    #[error("invalid scale factors: {0}")]
    ScaleFactors(String),
    /// The chosen cut strategy cannot be applied.
    #[error("invalid cut strategy: {0}")]
    InvalidStrategy(String),
    /// The resident node count does not fit in a local id.
    #[error("{0} resident nodes exceed the local id range")]
    TooManyNodes(u64),
    /// The traversal source is not a node of the graph.
    #[error("source node {src} is outside [0, {num_nodes})")]
    SourceOutOfRange { src: u64, num_nodes: u64 },
    /// Hosts cannot be spread evenly over the physical machines.
    #[error("{num_hosts} hosts do not divide evenly across {machines} machines")]
    MachineLayout { num_hosts: usize, machines: usize },
    /// A personality-set character is not one of `c`, `g` or `o`.
    #[error("unknown personality '{0}' (expected 'c', 'g' or 'o')")]
    UnknownPersonality(char),
}
