//! Transport and the wire/reduction primitives it carries.

pub mod communicator;
pub mod reduction;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, SyncCommTags, ThreadComm, Wait};
pub use reduction::{ReduceOp, ReduceValue};
