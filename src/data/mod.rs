//! Data module: dirty bitsets and distributed accumulators
#![warn(missing_docs)]

pub mod accumulator;
pub mod bitset;

pub use accumulator::DistAccumulator;
pub use bitset::DynamicBitSet;
