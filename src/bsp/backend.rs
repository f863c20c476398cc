//! Compute-backend selection for heterogeneous clusters.
//!
//! Each host resolves its [`Personality`] once at startup. CPU hosts run vertex
//! programs on the [`BspExecutor`](super::BspExecutor); device hosts hand
//! marshalled field arrays and the dirty bitset to a [`Device`] and get back the
//! number of work items, which feeds the same accumulator as the CPU path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::bitset::DynamicBitSet;
use crate::graph::{MarshalGraph, NodeRange, PartitionedGraph};
use crate::graph_error::GraphError;
use crate::partitioning::{ConfigError, HostId};
use crate::sync::field::NodeField;

/// What kind of compute a host contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Personality {
    Cpu,
    GpuCuda,
    GpuOpenCl,
}

impl Personality {
    pub fn from_char(c: char) -> Result<Self, ConfigError> {
        match c {
            'c' => Ok(Personality::Cpu),
            'g' => Ok(Personality::GpuCuda),
            'o' => Ok(Personality::GpuOpenCl),
            other => Err(ConfigError::UnknownPersonality(other)),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Personality::Cpu => 'c',
            Personality::GpuCuda => 'g',
            Personality::GpuOpenCl => 'o',
        }
    }

    pub fn is_device(self) -> bool {
        !matches!(self, Personality::Cpu)
    }
}

impl std::fmt::Display for Personality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Personality::Cpu => "CPU",
            Personality::GpuCuda => "GPU_CUDA",
            Personality::GpuOpenCl => "GPU_OPENCL",
        })
    }
}

/// Per-physical-machine personality layout and capacity weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeteroConfig {
    /// One character per host on a physical machine: `c`, `g` or `o`.
    pub personality_set: String,
    /// Physical machines; `None` means one host per machine.
    pub num_nodes: Option<usize>,
    pub scale_cpu: u32,
    pub scale_gpu: u32,
}

impl Default for HeteroConfig {
    fn default() -> Self {
        Self {
            personality_set: "c".into(),
            num_nodes: None,
            scale_cpu: 1,
            scale_gpu: 1,
        }
    }
}

impl HeteroConfig {
    /// The personality string, if it describes the hosts of one machine.
    fn layout(&self, num_hosts: usize) -> Result<Option<Vec<Personality>>, ConfigError> {
        let machines = self.num_nodes.unwrap_or(num_hosts).max(1);
        if num_hosts % machines != 0 {
            return Err(ConfigError::MachineLayout { num_hosts, machines });
        }
        let set: Vec<Personality> = self
            .personality_set
            .chars()
            .map(Personality::from_char)
            .collect::<Result<_, _>>()?;
        Ok((!set.is_empty() && set.len() == num_hosts / machines).then_some(set))
    }

    /// Personality of `host`. Hosts fall back to CPU when the set does not
    /// match the machine layout.
    pub fn personality(&self, host: HostId, num_hosts: usize) -> Result<Personality, ConfigError> {
        if host >= num_hosts {
            return Err(ConfigError::InvalidHost { host, num_hosts });
        }
        Ok(match self.layout(num_hosts)? {
            Some(set) => set[host % set.len()],
            None => Personality::Cpu,
        })
    }

    /// Master-block weights for every host, or empty (uniform) when both
    /// scales are 1 or the layout does not apply.
    pub fn scale_factors(&self, num_hosts: usize) -> Result<Vec<u32>, ConfigError> {
        if self.scale_cpu <= 1 && self.scale_gpu <= 1 {
            return Ok(Vec::new());
        }
        Ok(match self.layout(num_hosts)? {
            Some(set) => (0..num_hosts)
                .map(|h| match set[h % set.len()] {
                    Personality::Cpu => self.scale_cpu,
                    _ => self.scale_gpu,
                })
                .collect(),
            None => Vec::new(),
        })
    }
}

/// A marshalled field array lent to a device for one kernel launch.
#[derive(Debug)]
pub enum FieldSlice<'a> {
    U32(&'a mut [u32]),
    U64(&'a mut [u64]),
}

impl FieldSlice<'_> {
    pub fn len(&self) -> usize {
        match self {
            FieldSlice::U32(s) => s.len(),
            FieldSlice::U64(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An accelerator that runs named kernels over marshalled node data.
///
/// A launch reads and writes `fields` (indexed by local id), sets the dirty
/// bit of every node whose synchronized field changed, and returns the number
/// of work items for the round accumulator.
pub trait Device: Send + Sync {
    fn name(&self) -> &str;
    fn load_graph(&self, graph: MarshalGraph) -> Result<(), GraphError>;
    fn launch(
        &self,
        kernel: &str,
        nodes: &NodeRange,
        fields: &mut [FieldSlice<'_>],
        dirty: &DynamicBitSet,
    ) -> Result<u64, GraphError>;
}

/// Where a host's local-compute phase runs.
#[derive(Clone, Default)]
pub enum Backend {
    #[default]
    Cpu,
    Device(Arc<dyn Device>),
}

impl Backend {
    /// Resolve the backend for `personality`. Device personalities need a
    /// device; the graph is loaded onto it here, once.
    pub fn select<N>(
        personality: Personality,
        device: Option<Arc<dyn Device>>,
        graph: &PartitionedGraph<N>,
    ) -> Result<Self, GraphError> {
        if !personality.is_device() {
            return Ok(Backend::Cpu);
        }
        let device = device.ok_or_else(|| {
            GraphError::Backend(format!("host {} is {personality} but no device is available", graph.host()))
        })?;
        device.load_graph(graph.marshal())?;
        log::info!("[{}] using device backend {}", graph.host(), device.name());
        Ok(Backend::Device(device))
    }

    pub fn is_cpu(&self) -> bool {
        matches!(self, Backend::Cpu)
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Cpu => f.write_str("Cpu"),
            Backend::Device(d) => f.debug_tuple("Device").field(&d.name()).finish(),
        }
    }
}

/// Copy `field` of every resident node into a flat array indexed by local id.
pub fn gather_field<N, F: NodeField<N>>(graph: &PartitionedGraph<N>, field: &F) -> Vec<F::Value> {
    graph
        .all_nodes_range()
        .iter()
        .map(|l| field.read(graph.get_data(l)))
        .collect()
}

/// Write a flat array produced by [`gather_field`] back into node data.
pub fn scatter_field<N, F: NodeField<N>>(
    graph: &PartitionedGraph<N>,
    field: &F,
    values: &[F::Value],
) -> Result<(), GraphError> {
    if values.len() != graph.num_local_nodes() {
        return Err(GraphError::Backend(format!(
            "device returned {} values for {} nodes",
            values.len(),
            graph.num_local_nodes()
        )));
    }
    for (l, &v) in graph.all_nodes_range().iter().zip(values) {
        field.write(graph.get_data(l), v);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personality_chars() {
        assert_eq!(Personality::from_char('g'), Ok(Personality::GpuCuda));
        assert_eq!(Personality::from_char('o').unwrap().as_char(), 'o');
        assert_eq!(Personality::from_char('x'), Err(ConfigError::UnknownPersonality('x')));
    }

    #[test]
    fn personality_follows_machine_layout() {
        // two machines, each running a CPU host and a GPU host
        let cfg = HeteroConfig {
            personality_set: "cg".into(),
            num_nodes: Some(2),
            ..HeteroConfig::default()
        };
        let got: Vec<_> = (0..4).map(|h| cfg.personality(h, 4).unwrap()).collect();
        assert_eq!(
            got,
            vec![Personality::Cpu, Personality::GpuCuda, Personality::Cpu, Personality::GpuCuda]
        );
    }

    #[test]
    fn mismatched_set_falls_back_to_cpu() {
        let cfg = HeteroConfig {
            personality_set: "gg".into(),
            ..HeteroConfig::default()
        };
        // one host per machine expects a single character
        assert_eq!(cfg.personality(0, 3), Ok(Personality::Cpu));
    }

    #[test]
    fn scale_factors_by_personality() {
        let cfg = HeteroConfig {
            personality_set: "cg".into(),
            num_nodes: Some(1),
            scale_cpu: 1,
            scale_gpu: 3,
        };
        assert_eq!(cfg.scale_factors(2).unwrap(), vec![1, 3]);
        assert!(HeteroConfig::default().scale_factors(2).unwrap().is_empty());
    }
}
