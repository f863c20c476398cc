//! Flat copy of a host's fragment for accelerator backends.

use serde::{Deserialize, Serialize};

use super::LocalId;

/// CSR fragment with plain arrays only, produced once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarshalGraph {
    pub host: usize,
    pub num_masters: u32,
    /// `row_start[l]..row_start[l + 1]` index `edge_dst` for local node `l`.
    pub row_start: Vec<u64>,
    pub edge_dst: Vec<LocalId>,
    pub lid_to_gid: Vec<u64>,
}

impl MarshalGraph {
    pub fn num_nodes(&self) -> usize {
        self.lid_to_gid.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_dst.len()
    }

    /// Local destinations of `lid`'s out-edges.
    pub fn neighbors(&self, lid: LocalId) -> &[LocalId] {
        let l = lid as usize;
        &self.edge_dst[self.row_start[l] as usize..self.row_start[l + 1] as usize]
    }
}
