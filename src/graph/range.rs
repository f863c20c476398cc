//! Restartable, ascending local-id sequences.

use std::ops::Range;
use std::sync::Arc;

use itertools::Either;
use rayon::prelude::*;

use super::LocalId;

/// A finite set of local ids, iterated in ascending order.
///
/// Cloning is cheap: the sparse form shares its id list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRange {
    Contiguous(Range<LocalId>),
    Sparse(Arc<[LocalId]>),
}

impl NodeRange {
    pub fn len(&self) -> usize {
        match self {
            NodeRange::Contiguous(r) => r.len(),
            NodeRange::Sparse(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First and one-past-last local id, for backends that take bounds.
    pub fn bounds(&self) -> Range<LocalId> {
        match self {
            NodeRange::Contiguous(r) => r.clone(),
            NodeRange::Sparse(ids) => match (ids.first(), ids.last()) {
                (Some(&lo), Some(&hi)) => lo..hi + 1,
                _ => 0..0,
            },
        }
    }

    pub fn contains(&self, lid: LocalId) -> bool {
        match self {
            NodeRange::Contiguous(r) => r.contains(&lid),
            NodeRange::Sparse(ids) => ids.binary_search(&lid).is_ok(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = LocalId> + '_ {
        match self {
            NodeRange::Contiguous(r) => Either::Left(r.clone()),
            NodeRange::Sparse(ids) => Either::Right(ids.iter().copied()),
        }
    }

    /// Work-stealing parallel iterator over the same ids.
    pub fn par_iter(&self) -> impl IndexedParallelIterator<Item = LocalId> + '_ {
        match self {
            NodeRange::Contiguous(r) => rayon::iter::Either::Left(r.clone().into_par_iter()),
            NodeRange::Sparse(ids) => rayon::iter::Either::Right(ids.par_iter().copied()),
        }
    }
}

impl<'a> IntoIterator for &'a NodeRange {
    type Item = LocalId;
    type IntoIter = Box<dyn Iterator<Item = LocalId> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_and_sparse_agree() {
        let c = NodeRange::Contiguous(2..5);
        let s = NodeRange::Sparse(Arc::from(vec![2, 3, 4]));
        assert_eq!(c.iter().collect::<Vec<_>>(), s.iter().collect::<Vec<_>>());
        assert_eq!(c.bounds(), s.bounds());
        assert_eq!(c.len(), 3);
        assert!(s.contains(3) && !s.contains(5));
    }

    #[test]
    fn restartable() {
        let s = NodeRange::Sparse(Arc::from(vec![1, 7, 9]));
        let first: Vec<_> = s.iter().collect();
        let second: Vec<_> = (&s).into_iter().collect();
        assert_eq!(first, second);
        let mut par: Vec<_> = s.par_iter().collect();
        par.sort_unstable();
        assert_eq!(par, first);
    }

    #[test]
    fn empty_ranges() {
        let s = NodeRange::Sparse(Arc::from(Vec::<LocalId>::new()));
        assert!(s.is_empty());
        assert_eq!(s.bounds(), 0..0);
        assert!(NodeRange::Contiguous(4..4).is_empty());
    }
}
