//! Concurrent dirty-bit vector, one bit per local node.
//!
//! Bits are backed by `AtomicU64` words. `set` is an atomic OR and may be
//! called from any number of worker threads during a compute phase. Bulk
//! operations (`resize`, `reset`, `reset_range`, `bitwise_or`) take `&mut self`,
//! so the borrow checker keeps them out of a phase in which `set` is running.
//! `test` and `count` are only meaningful once the compute phase has joined.

use std::sync::atomic::{AtomicU64, Ordering};

const BITS: usize = u64::BITS as usize;

/// Fixed-size atomic bit vector.
#[derive(Default)]
pub struct DynamicBitSet {
    words: Vec<AtomicU64>,
    num_bits: usize,
}

impl DynamicBitSet {
    /// A zeroed bitset of `n` bits.
    pub fn with_size(n: usize) -> Self {
        let mut b = Self::default();
        b.resize(n);
        b
    }

    /// Resize to `n` bits. All bits are zero afterwards.
    pub fn resize(&mut self, n: usize) {
        self.num_bits = n;
        self.words.resize_with(n.div_ceil(BITS), || AtomicU64::new(0));
        self.reset();
    }

    /// Number of addressable bits.
    pub fn size(&self) -> usize {
        self.num_bits
    }

    /// Bytes of backing storage.
    pub fn alloc_size(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }

    /// Clear every bit.
    pub fn reset(&mut self) {
        for w in &mut self.words {
            *w.get_mut() = 0;
        }
    }

    /// Clear bits `begin..=end` (inclusive).
    pub fn reset_range(&mut self, begin: usize, end: usize) {
        if begin > end || begin >= self.num_bits {
            return;
        }
        let end = end.min(self.num_bits - 1);
        let (first, last) = (begin / BITS, end / BITS);
        let lo_mask = !0u64 << (begin % BITS);
        let hi_mask = !0u64 >> (BITS - 1 - end % BITS);
        if first == last {
            *self.words[first].get_mut() &= !(lo_mask & hi_mask);
            return;
        }
        *self.words[first].get_mut() &= !lo_mask;
        for w in &mut self.words[first + 1..last] {
            *w.get_mut() = 0;
        }
        *self.words[last].get_mut() &= !hi_mask;
    }

    /// Atomically set bit `index`. Once set, it stays set until a reset.
    #[inline]
    pub fn set(&self, index: usize) {
        debug_assert!(index < self.num_bits, "bit {index} out of range {}", self.num_bits);
        let mask = 1u64 << (index % BITS);
        let word = &self.words[index / BITS];
        // Skip the RMW when the bit is already visible.
        if word.load(Ordering::Relaxed) & mask == 0 {
            word.fetch_or(mask, Ordering::Relaxed);
        }
    }

    /// Read bit `index`. Assumes no concurrent `set` is in flight.
    #[inline]
    pub fn test(&self, index: usize) -> bool {
        self.words[index / BITS].load(Ordering::Relaxed) & (1u64 << (index % BITS)) != 0
    }

    /// OR `other` into `self`. Sizes must match.
    pub fn bitwise_or(&mut self, other: &DynamicBitSet) {
        assert_eq!(self.num_bits, other.num_bits, "bitwise_or on bitsets of different size");
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a.get_mut() |= b.load(Ordering::Relaxed);
        }
    }

    /// Population count.
    pub fn count(&self) -> u64 {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as u64)
            .sum()
    }

    /// Indices of set bits, ascending.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, w)| {
            let bits = w.load(Ordering::Relaxed);
            set_bits(bits).map(move |b| wi * BITS + b)
        })
    }

    /// Atomically take and clear the set bits within `begin..end`, ascending.
    ///
    /// Each word is swapped to zero (or masked, at the range edges) in a single
    /// RMW, so a bit set after its word was taken stays set for the next call.
    pub fn take_range(&self, begin: usize, end: usize) -> Vec<usize> {
        let end = end.min(self.num_bits);
        let mut out = Vec::new();
        if begin >= end {
            return out;
        }
        let (first, last) = (begin / BITS, (end - 1) / BITS);
        for wi in first..=last {
            let lo = if wi == first { begin % BITS } else { 0 };
            let hi = if wi == last { (end - 1) % BITS } else { BITS - 1 };
            let mask = (!0u64 << lo) & (!0u64 >> (BITS - 1 - hi));
            let taken = if mask == !0u64 {
                self.words[wi].swap(0, Ordering::AcqRel)
            } else {
                self.words[wi].fetch_and(!mask, Ordering::AcqRel) & mask
            };
            out.extend(set_bits(taken).map(|b| wi * BITS + b));
        }
        out
    }
}

fn set_bits(mut bits: u64) -> impl Iterator<Item = usize> {
    std::iter::from_fn(move || {
        if bits == 0 {
            return None;
        }
        let tz = bits.trailing_zeros() as usize;
        bits &= bits - 1;
        Some(tz)
    })
}

impl Clone for DynamicBitSet {
    fn clone(&self) -> Self {
        Self {
            words: self
                .words
                .iter()
                .map(|w| AtomicU64::new(w.load(Ordering::Relaxed)))
                .collect(),
            num_bits: self.num_bits,
        }
    }
}

impl PartialEq for DynamicBitSet {
    fn eq(&self, other: &Self) -> bool {
        self.num_bits == other.num_bits
            && self
                .words
                .iter()
                .zip(&other.words)
                .all(|(a, b)| a.load(Ordering::Relaxed) == b.load(Ordering::Relaxed))
    }
}

impl std::fmt::Debug for DynamicBitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicBitSet")
            .field("size", &self.num_bits)
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn resize_zeroes() {
        let mut b = DynamicBitSet::with_size(100);
        b.set(3);
        b.set(99);
        b.resize(130);
        assert_eq!(b.size(), 130);
        assert_eq!(b.count(), 0);
        assert_eq!(b.alloc_size(), 3 * 8);
    }

    #[test]
    fn concurrent_sets_are_all_visible() {
        let b = DynamicBitSet::with_size(10_000);
        (0..10_000usize).into_par_iter().for_each(|i| {
            if i % 3 == 0 {
                b.set(i);
                b.set(i);
            }
        });
        assert_eq!(b.count(), (0..10_000).filter(|i| i % 3 == 0).count() as u64);
        assert!(b.test(9999));
        assert!(!b.test(9998));
    }

    #[test]
    fn reset_range_is_inclusive() {
        let mut b = DynamicBitSet::with_size(200);
        for i in 0..200 {
            b.set(i);
        }
        b.reset_range(10, 140);
        assert!(b.test(9));
        assert!(!b.test(10));
        assert!(!b.test(64));
        assert!(!b.test(140));
        assert!(b.test(141));
        assert_eq!(b.count(), 200 - 131);

        b.reset_range(5, 5);
        assert!(!b.test(5));
        assert!(b.test(4) && b.test(6));

        b.reset_range(150, 10_000);
        assert_eq!(b.iter_set().max(), Some(149));
    }

    #[test]
    fn take_range_clears_only_what_it_returns() {
        let b = DynamicBitSet::with_size(130);
        for i in [0, 5, 63, 64, 100, 129] {
            b.set(i);
        }
        let taken = b.take_range(5, 101);
        assert_eq!(taken, vec![5, 63, 64, 100]);
        assert_eq!(b.iter_set().collect::<Vec<_>>(), vec![0, 129]);

        // a bit set after the take survives to the next one
        b.set(70);
        assert_eq!(b.take_range(0, 130), vec![0, 70, 129]);
        assert_eq!(b.count(), 0);
    }

    #[test]
    fn bitwise_or_merges() {
        let mut a = DynamicBitSet::with_size(70);
        let c = DynamicBitSet::with_size(70);
        a.set(1);
        c.set(69);
        a.bitwise_or(&c);
        assert_eq!(a.iter_set().collect::<Vec<_>>(), vec![1, 69]);
    }

    #[test]
    #[should_panic(expected = "different size")]
    fn bitwise_or_size_mismatch_panics() {
        let mut a = DynamicBitSet::with_size(10);
        a.bitwise_or(&DynamicBitSet::with_size(11));
    }
}
