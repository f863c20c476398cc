//! Vertex programs built on the BSP runtime.

pub mod bfs;
