use std::sync::atomic::{AtomicU32, Ordering};

use graph_bsp::algs::{ReduceOp, ReduceValue};
use graph_bsp::sync::{AtomicField, NodeField};
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

const DIST: AtomicField<AtomicU32, AtomicU32> = AtomicField::new("dist", |n| n);

proptest! {
    #[test]
    fn min_reduce_is_order_independent(
        start in 0u32..1_000,
        updates in prop::collection::vec(0u32..1_000, 0..64),
        seed in any::<u64>(),
    ) {
        let sequential = updates.iter().fold(start, |acc, &u| u32::combine(ReduceOp::Min, acc, u));

        let mut shuffled = updates.clone();
        shuffled.shuffle(&mut SmallRng::seed_from_u64(seed));
        let node = AtomicU32::new(start);
        for &u in &shuffled {
            DIST.combine(&node, ReduceOp::Min, u);
        }
        prop_assert_eq!(node.load(Ordering::Relaxed), sequential);

        let node = AtomicU32::new(start);
        updates.par_iter().for_each(|&u| {
            DIST.combine(&node, ReduceOp::Min, u);
        });
        prop_assert_eq!(node.load(Ordering::Relaxed), sequential);
    }

    #[test]
    fn combine_reports_improvement(start in 0u32..100, v in 0u32..100) {
        let node = AtomicU32::new(start);
        let changed = DIST.combine(&node, ReduceOp::Min, v);
        prop_assert_eq!(changed, v < start);
        prop_assert_eq!(DIST.read(&node), start.min(v));
    }

    #[test]
    fn fold_matches_pairwise_combine(xs in prop::collection::vec(any::<i64>(), 0..32)) {
        for op in [ReduceOp::Min, ReduceOp::Max] {
            let pairwise = xs.iter().fold(i64::identity(op), |a, &b| i64::combine(op, a, b));
            prop_assert_eq!(op.fold(xs.iter().copied()), pairwise);
        }
    }
}
