//! Named, synchronizable fields of node data.

use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, AtomicU64, Ordering};

use crate::algs::reduction::{ReduceOp, ReduceValue};

/// One field of a node record that the sync engine can read, overwrite and
/// combine into.
///
/// Implementations take `&N`: node records use interior mutability so that
/// worker threads and the sync engine never need `&mut` access.
pub trait NodeField<N>: Sync {
    type Value: ReduceValue;

    fn name(&self) -> &str;
    fn read(&self, node: &N) -> Self::Value;
    fn write(&self, node: &N, value: Self::Value);
    /// Combine `value` into the node's field with `op`. Returns whether the
    /// stored value changed.
    fn combine(&self, node: &N, op: ReduceOp, value: Self::Value) -> bool;
}

/// Atomic storage usable as a field slot.
pub trait AtomicSlot: Send + Sync {
    type Value: ReduceValue;

    fn load(&self) -> Self::Value;
    fn store(&self, v: Self::Value);
    /// Returns the previous value.
    fn fetch_min(&self, v: Self::Value) -> Self::Value;
    fn fetch_max(&self, v: Self::Value) -> Self::Value;
    fn fetch_add(&self, v: Self::Value) -> Self::Value;
}

macro_rules! atomic_slot {
    ($($atomic:ty => $value:ty),* $(,)?) => {$(
        impl AtomicSlot for $atomic {
            type Value = $value;

            #[inline]
            fn load(&self) -> $value {
                <$atomic>::load(self, Ordering::Relaxed)
            }
            #[inline]
            fn store(&self, v: $value) {
                <$atomic>::store(self, v, Ordering::Relaxed)
            }
            #[inline]
            fn fetch_min(&self, v: $value) -> $value {
                <$atomic>::fetch_min(self, v, Ordering::Relaxed)
            }
            #[inline]
            fn fetch_max(&self, v: $value) -> $value {
                <$atomic>::fetch_max(self, v, Ordering::Relaxed)
            }
            #[inline]
            fn fetch_add(&self, v: $value) -> $value {
                <$atomic>::fetch_add(self, v, Ordering::Relaxed)
            }
        }
    )*};
}

atomic_slot!(AtomicU32 => u32, AtomicU64 => u64, AtomicI32 => i32, AtomicI64 => i64);

/// A field stored in an atomic slot of `N`, selected by a projection.
pub struct AtomicField<N, A> {
    name: &'static str,
    project: fn(&N) -> &A,
}

impl<N, A> AtomicField<N, A> {
    pub const fn new(name: &'static str, project: fn(&N) -> &A) -> Self {
        Self { name, project }
    }

    #[inline]
    pub fn slot<'n>(&self, node: &'n N) -> &'n A {
        (self.project)(node)
    }
}

impl<N, A> Clone for AtomicField<N, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N, A> Copy for AtomicField<N, A> {}

impl<N, A: AtomicSlot> NodeField<N> for AtomicField<N, A> {
    type Value = A::Value;

    fn name(&self) -> &str {
        self.name
    }

    #[inline]
    fn read(&self, node: &N) -> A::Value {
        self.slot(node).load()
    }

    #[inline]
    fn write(&self, node: &N, value: A::Value) {
        self.slot(node).store(value)
    }

    #[inline]
    fn combine(&self, node: &N, op: ReduceOp, value: A::Value) -> bool {
        let slot = self.slot(node);
        match op {
            ReduceOp::Min => slot.fetch_min(value) > value,
            ReduceOp::Max => slot.fetch_max(value) < value,
            ReduceOp::Sum => {
                slot.fetch_add(value);
                value != A::Value::identity(ReduceOp::Sum)
            }
        }
    }
}

impl<N, A> std::fmt::Debug for AtomicField<N, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AtomicField").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Node {
        dist: AtomicU32,
        hits: AtomicU64,
    }

    const DIST: AtomicField<Node, AtomicU32> = AtomicField::new("dist", |n| &n.dist);
    const HITS: AtomicField<Node, AtomicU64> = AtomicField::new("hits", |n| &n.hits);

    #[test]
    fn combine_reports_change() {
        let n = Node::default();
        DIST.write(&n, 10);
        assert!(DIST.combine(&n, ReduceOp::Min, 4));
        assert!(!DIST.combine(&n, ReduceOp::Min, 7));
        assert_eq!(DIST.read(&n), 4);
        assert!(DIST.combine(&n, ReduceOp::Max, 9));
        assert!(!DIST.combine(&n, ReduceOp::Max, 9));
        assert_eq!(DIST.name(), "dist");
    }

    #[test]
    fn sum_accumulates() {
        let n = Node::default();
        assert!(HITS.combine(&n, ReduceOp::Sum, 3));
        assert!(!HITS.combine(&n, ReduceOp::Sum, 0));
        assert!(HITS.combine(&n, ReduceOp::Sum, 2));
        assert_eq!(HITS.read(&n), 5);
    }
}
