//! Field synchronization between master and mirror copies.

pub mod engine;
pub mod field;

pub use self::engine::{
    BitsetSource, BroadcastPolicy, ReadLocation, SyncConfig, SyncEngine, SyncStats, WriteLocation, sync,
};
pub use self::field::{AtomicField, AtomicSlot, NodeField};
