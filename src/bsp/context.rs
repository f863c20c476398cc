//! Per-run state handed to every round, and what a run reports back.

use serde::{Deserialize, Serialize};

/// Identifies one run of one algorithm. Owned by the driver, so repeated or
/// concurrent runs never share mutable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    name: String,
    run: u32,
    round: u32,
}

impl RunContext {
    pub fn new(name: impl Into<String>, run: u32) -> Self {
        Self {
            name: name.into(),
            run,
            round: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&self) -> u32 {
        self.run
    }

    /// Rounds completed so far in this run.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// `"{name}_{run}"`, used to tag log lines and statistics.
    pub fn identifier(&self) -> String {
        format!("{}_{}", self.name, self.run)
    }

    /// Identifier of a named loop within this run.
    pub fn loop_identifier(&self, loop_name: &str) -> String {
        format!("{loop_name}_{}", self.run)
    }

    /// Start the next run of the same algorithm.
    pub fn next_run(&mut self) {
        self.run += 1;
        self.round = 0;
    }

    pub(crate) fn reset_rounds(&mut self) {
        self.round = 0;
    }

    pub(crate) fn advance(&mut self) {
        self.round += 1;
    }
}

/// Outcome of the round state machine.
///
/// Hitting the round ceiling is not an error: `converged` is false and
/// `rounds` equals the ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport<T> {
    pub rounds: u32,
    pub converged: bool,
    /// This host's accumulator partial, per round.
    pub local_work: Vec<T>,
}

/// Statistics of one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub identifier: String,
    pub run: u32,
    pub rounds: u32,
    pub converged: bool,
    /// Local work items per round on this host.
    pub work_items: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        let mut ctx = RunContext::new("BFS", 0);
        assert_eq!(ctx.identifier(), "BFS_0");
        assert_eq!(ctx.loop_identifier("InitializeGraph"), "InitializeGraph_0");
        ctx.advance();
        ctx.next_run();
        assert_eq!(ctx.identifier(), "BFS_1");
        assert_eq!(ctx.round(), 0);
    }
}
