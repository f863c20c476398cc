//! Bulk-synchronous execution: parallel vertex-program application, the
//! round state machine, run configuration and backend selection.

pub mod backend;
pub mod config;
pub mod context;
pub mod executor;

pub use self::backend::{Backend, Device, FieldSlice, HeteroConfig, Personality, gather_field, scatter_field};
pub use self::config::RunConfig;
pub use self::context::{RoundReport, RunContext, RunStats};
pub use self::executor::{BspExecutor, VertexProgram, Worklist, WorklistProgram};
