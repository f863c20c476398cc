//! Associative, commutative combine operators shared by the distributed
//! accumulator and the synchronization engine's reduce phase.

use bytemuck::Pod;
use num_traits::{Bounded, Zero};
use serde::{Deserialize, Serialize};
use std::ops::Add;

/// A combine operator with a well-defined identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReduceOp {
    Min,
    Max,
    Sum,
}

/// Values that can travel through a reduction.
///
/// Implemented for every `Pod` numeric type that `num-traits` can bound, so
/// `u32`, `u64`, `i64`, `f64` and friends all qualify.
pub trait ReduceValue: Pod + PartialOrd + Send + Sync + std::fmt::Debug {
    /// The identity of `op`: `combine(op, identity(op), x) == x`.
    fn identity(op: ReduceOp) -> Self;
    /// Combine two partials.
    fn combine(op: ReduceOp, a: Self, b: Self) -> Self;
}

impl<T> ReduceValue for T
where
    T: Pod + PartialOrd + Send + Sync + std::fmt::Debug + Bounded + Zero + Add<Output = T>,
{
    #[inline]
    fn identity(op: ReduceOp) -> Self {
        match op {
            ReduceOp::Min => T::max_value(),
            ReduceOp::Max => T::min_value(),
            ReduceOp::Sum => T::zero(),
        }
    }

    #[inline]
    fn combine(op: ReduceOp, a: Self, b: Self) -> Self {
        match op {
            ReduceOp::Min => {
                if b < a {
                    b
                } else {
                    a
                }
            }
            ReduceOp::Max => {
                if b > a {
                    b
                } else {
                    a
                }
            }
            ReduceOp::Sum => a + b,
        }
    }
}

impl ReduceOp {
    /// Fold an iterator of partials, starting from the identity.
    pub fn fold<T: ReduceValue>(self, values: impl IntoIterator<Item = T>) -> T {
        values
            .into_iter()
            .fold(T::identity(self), |acc, v| T::combine(self, acc, v))
    }

    /// Whether applying the same contribution twice leaves the result unchanged.
    pub fn is_idempotent(self) -> bool {
        !matches!(self, ReduceOp::Sum)
    }
}
