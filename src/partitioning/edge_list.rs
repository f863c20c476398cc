//! Global edge list handed over by a graph loader.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// A directed graph over global ids `[0, num_nodes)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeList {
    num_nodes: u64,
    edges: Vec<(u64, u64)>,
}

impl EdgeList {
    /// An edge list over `num_nodes` nodes. Not validated until [`EdgeList::validate`].
    pub fn new(num_nodes: u64, edges: Vec<(u64, u64)>) -> Self {
        Self { num_nodes, edges }
    }

    /// An edge list whose node count is one past the largest endpoint.
    /// An endpoint of `u64::MAX` caps the count there and fails [`EdgeList::validate`].
    pub fn from_edges(edges: Vec<(u64, u64)>) -> Self {
        let num_nodes = edges
            .iter()
            .map(|&(u, v)| u.max(v).checked_add(1).unwrap_or(u64::MAX))
            .max()
            .unwrap_or(0);
        Self { num_nodes, edges }
    }

    pub fn num_nodes(&self) -> u64 {
        self.num_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[(u64, u64)] {
        &self.edges
    }

    /// Reject edges that reference nonexistent nodes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.num_nodes;
        match self.edges.par_iter().find_first(|&&(u, v)| u >= n || v >= n) {
            Some(&(src, dst)) => Err(ConfigError::DanglingEdge {
                src,
                dst,
                num_nodes: n,
            }),
            None => Ok(()),
        }
    }

    /// The same graph with every edge reversed. Pull-style programs read
    /// their in-neighbours through the transposed graph's out-edges.
    pub fn transposed(&self) -> Self {
        Self {
            num_nodes: self.num_nodes,
            edges: self.edges.par_iter().map(|&(u, v)| (v, u)).collect(),
        }
    }

    /// In-degree of every node. Assumes the list is valid.
    pub fn in_degrees(&self) -> Vec<u64> {
        let mut deg = vec![0u64; self.num_nodes as usize];
        for &(_, v) in &self.edges {
            deg[v as usize] += 1;
        }
        deg
    }

    /// Out-degree of every node. Assumes the list is valid.
    pub fn out_degrees(&self) -> Vec<u64> {
        let mut deg = vec![0u64; self.num_nodes as usize];
        for &(u, _) in &self.edges {
            deg[u as usize] += 1;
        }
        deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_edges_counts_nodes() {
        let g = EdgeList::from_edges(vec![(0, 1), (1, 2), (2, 3)]);
        assert_eq!(g.num_nodes(), 4);
        assert_eq!(g.num_edges(), 3);
        assert!(g.validate().is_ok());
    }

    #[test]
    fn dangling_edge_rejected() {
        let g = EdgeList::new(3, vec![(0, 1), (1, 3)]);
        assert_eq!(
            g.validate(),
            Err(ConfigError::DanglingEdge {
                src: 1,
                dst: 3,
                num_nodes: 3
            })
        );
    }

    #[test]
    fn max_endpoint_does_not_wrap() {
        let g = EdgeList::from_edges(vec![(0, u64::MAX)]);
        assert_eq!(g.num_nodes(), u64::MAX);
        assert_eq!(
            g.validate(),
            Err(ConfigError::DanglingEdge {
                src: 0,
                dst: u64::MAX,
                num_nodes: u64::MAX
            })
        );
    }

    #[test]
    fn transpose_and_degrees() {
        let g = EdgeList::new(3, vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(g.out_degrees(), vec![2, 1, 0]);
        assert_eq!(g.in_degrees(), vec![0, 1, 2]);
        let t = g.transposed();
        assert_eq!(t.edges(), &[(1, 0), (2, 0), (2, 1)]);
        assert_eq!(t.out_degrees(), g.in_degrees());
    }
}
