//! GraphError: unified error type for graph-bsp public APIs.
//!
//! Every fallible operation in the crate returns this type. Configuration
//! problems are detected while the partition is built; transport problems are
//! fatal because a lost delta leaves master and mirror copies irreconcilable.

use thiserror::Error;

use crate::partitioning::error::ConfigError;

/// Unified error type for partitioning, synchronization and execution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Malformed partition input or run configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// A send, receive, barrier or collective failed.
    #[error("Communication error with host {neighbor}: {message}")]
    CommError { neighbor: usize, message: String },
    /// A peer delivered a message that does not decode.
    #[error("Malformed message from host {neighbor}: {message}")]
    Wire { neighbor: usize, message: String },
    /// The selected compute backend failed or is unavailable.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A structural invariant of the partition does not hold.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl GraphError {
    /// True for failures that originate in the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, GraphError::CommError { .. } | GraphError::Wire { .. })
    }
}
