//! Run-level settings shared by every vertex-program driver.

use serde::{Deserialize, Serialize};

use crate::graph::GlobalId;

/// Settings for one algorithm invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Hard ceiling on BSP rounds per run.
    pub max_iterations: u32,
    /// Global id the traversal starts from.
    pub src_node: GlobalId,
    /// Repetitions; node data and dirty bits are re-initialised in between.
    pub num_runs: u32,
    /// Collect `(gid, value)` for every owned node after the last run.
    pub verify: bool,
    /// Worker threads per host; `None` uses rayon's global pool.
    pub num_threads: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            src_node: 0,
            num_runs: 1,
            verify: false,
            num_threads: None,
        }
    }
}

impl RunConfig {
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_src_node(mut self, src_node: GlobalId) -> Self {
        self.src_node = src_node;
        self
    }

    pub fn with_num_runs(mut self, num_runs: u32) -> Self {
        self.num_runs = num_runs;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.max_iterations, 1000);
        assert_eq!(cfg.src_node, 0);
        assert_eq!(cfg.num_runs, 1);
        assert!(!cfg.verify);
        assert_eq!(cfg.num_threads, None);
    }
}
