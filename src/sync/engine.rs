//! Master/mirror reconciliation of one field after a compute phase.
//!
//! A call runs up to two phases, each a single personalized all-to-all with
//! exactly one (possibly empty) message per peer:
//!
//! 1. **Reduce**: dirty mirrors send `(gid, value)` to their master, which
//!    combines every contribution with the configured operator.
//! 2. **Broadcast**: dirty masters (including those that just received a
//!    contribution) send their value to every host mirroring them, which
//!    overwrites its copy.
//!
//! Whether a phase runs depends only on the cut strategy and the
//! configuration, so every host takes the same branches and stays in step.

use log::{debug, trace};
use rayon::prelude::*;

use crate::algs::communicator::{Communicator, SyncCommTags};
use crate::algs::reduction::{ReduceOp, ReduceValue};
use crate::algs::wire::{self, MessageKind};
use crate::data::bitset::DynamicBitSet;
use crate::graph::{GlobalId, LocalId, PartitionedGraph};
use crate::graph_error::GraphError;
use crate::partitioning::CutStrategy;

use super::field::NodeField;

/// Which edge endpoint the compute phase writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteLocation {
    /// Only edge sources are written.
    Source,
    /// Only edge destinations are written.
    Destination,
    /// Either endpoint may be written.
    Any,
}

/// Which edge endpoint the compute phase reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadLocation {
    /// Only edge sources are read.
    Source,
    /// Only edge destinations are read.
    Destination,
    /// Either endpoint may be read.
    Any,
}

fn endpoint_may_be_mirror(strategy: CutStrategy, source: bool, destination: bool) -> bool {
    (source && strategy.sources_may_be_mirrors())
        || (destination && strategy.destinations_may_be_mirrors())
}

impl WriteLocation {
    /// Whether a written node can be a mirror under `strategy`.
    pub fn may_be_mirror(self, strategy: CutStrategy) -> bool {
        let (s, d) = match self {
            WriteLocation::Source => (true, false),
            WriteLocation::Destination => (false, true),
            WriteLocation::Any => (true, true),
        };
        endpoint_may_be_mirror(strategy, s, d)
    }
}

impl ReadLocation {
    /// Whether a read node can be a mirror under `strategy`.
    pub fn may_be_mirror(self, strategy: CutStrategy) -> bool {
        let (s, d) = match self {
            ReadLocation::Source => (true, false),
            ReadLocation::Destination => (false, true),
            ReadLocation::Any => (true, true),
        };
        endpoint_may_be_mirror(strategy, s, d)
    }
}

/// What mirrors do with a master's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastPolicy {
    /// Mirrors take the master's value.
    #[default]
    Overwrite,
    /// Mirrors are not refreshed; masters stay authoritative only.
    Skip,
}

/// Which nodes a call communicates.
#[derive(Debug, Clone, Copy)]
pub enum BitsetSource<'a> {
    /// Only nodes whose bit is set; bits are consumed as they are sent.
    Dirty(&'a DynamicBitSet),
    /// Every mirror and every mirrored master.
    All,
}

/// Per-call synchronization settings.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig<'a> {
    /// Decides whether the reduce phase runs.
    pub write: WriteLocation,
    /// Decides whether the broadcast phase runs.
    pub read: ReadLocation,
    /// Folds mirror contributions into masters.
    pub reduce: ReduceOp,
    pub broadcast: BroadcastPolicy,
    /// Nodes to communicate.
    pub bitset: BitsetSource<'a>,
}

impl<'a> SyncConfig<'a> {
    /// Settings with [`BroadcastPolicy::Overwrite`].
    pub fn new(write: WriteLocation, read: ReadLocation, reduce: ReduceOp, bitset: BitsetSource<'a>) -> Self {
        Self {
            write,
            read,
            reduce,
            broadcast: BroadcastPolicy::Overwrite,
            bitset,
        }
    }

    pub fn with_broadcast(mut self, broadcast: BroadcastPolicy) -> Self {
        self.broadcast = broadcast;
        self
    }
}

/// Record counts of one sync call, as seen by this host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub reduce_sent: usize,
    pub reduce_received: usize,
    pub broadcast_sent: usize,
    pub broadcast_received: usize,
    pub bytes_sent: usize,
}

/// Master/mirror reconciliation for one host's fragment over one transport.
pub struct SyncEngine<'g, N, C> {
    graph: &'g PartitionedGraph<N>,
    comm: &'g C,
    tags: SyncCommTags,
}

impl<'g, N: Sync, C: Communicator> SyncEngine<'g, N, C> {
    /// An engine using the default [`SyncCommTags`].
    pub fn new(graph: &'g PartitionedGraph<N>, comm: &'g C) -> Self {
        Self {
            graph,
            comm,
            tags: SyncCommTags::default(),
        }
    }

    /// Reconcile `field` between masters and mirrors.
    ///
    /// Blocks until every host has taken part. Any transport failure is
    /// returned as-is and leaves the field in an undefined state.
    pub fn sync<F: NodeField<N>>(&self, field: &F, cfg: &SyncConfig<'_>) -> Result<SyncStats, GraphError> {
        let g = self.graph;
        let me = self.comm.rank();
        if self.comm.size() != g.num_hosts() || me != g.host() {
            return Err(GraphError::CommError {
                neighbor: me,
                message: format!(
                    "transport is host {me} of {}, graph is host {} of {}",
                    self.comm.size(),
                    g.host(),
                    g.num_hosts()
                ),
            });
        }

        let mut stats = SyncStats::default();
        let strategy = g.strategy();
        if cfg.write.may_be_mirror(strategy) {
            self.reduce_phase(field, cfg, &mut stats)?;
        }
        if cfg.broadcast == BroadcastPolicy::Overwrite && cfg.read.may_be_mirror(strategy) {
            self.broadcast_phase(field, cfg, &mut stats)?;
        } else if let BitsetSource::Dirty(bits) = cfg.bitset {
            // no mirror reads these masters; they are already authoritative
            bits.take_range(0, g.num_masters());
        }

        debug!(
            "[{me}] sync {}: reduce {}/{} broadcast {}/{} records sent/received, {} bytes",
            field.name(),
            stats.reduce_sent,
            stats.reduce_received,
            stats.broadcast_sent,
            stats.broadcast_received,
            stats.bytes_sent
        );
        Ok(stats)
    }

    fn pack<F: NodeField<N>>(&self, field: &F, kind: MessageKind, lids: &[LocalId]) -> Vec<u8> {
        let gids: Vec<GlobalId> = lids.iter().map(|&l| self.graph.get_gid(l)).collect();
        let values: Vec<F::Value> = lids
            .iter()
            .map(|&l| field.read(self.graph.get_data(l)))
            .collect();
        wire::encode_batch(kind, &gids, &values)
    }

    fn reduce_phase<F: NodeField<N>>(
        &self,
        field: &F,
        cfg: &SyncConfig<'_>,
        stats: &mut SyncStats,
    ) -> Result<(), GraphError> {
        let g = self.graph;
        let me = self.comm.rank();
        let n = self.comm.size();
        let identity = F::Value::identity(cfg.reduce);

        let mut outgoing = vec![Vec::new(); n];
        for (peer, out) in outgoing.iter_mut().enumerate() {
            if peer == me {
                continue;
            }
            let range = g.mirrors_owned_by(peer);
            let lids: Vec<LocalId> = match cfg.bitset {
                BitsetSource::Dirty(bits) => bits
                    .take_range(range.start as usize, range.end as usize)
                    .into_iter()
                    .map(|l| l as LocalId)
                    .collect(),
                BitsetSource::All => range.collect(),
            };
            *out = self.pack(field, MessageKind::Reduce, &lids);
            if cfg.reduce == ReduceOp::Sum {
                // contributed; do not count it again next round
                for &l in &lids {
                    field.write(g.get_data(l), identity);
                }
            }
            trace!("[{me}] reduce {} -> host {peer}: {} records", field.name(), lids.len());
            stats.reduce_sent += lids.len();
            stats.bytes_sent += out.len();
        }

        let incoming = self.comm.exchange(self.tags.reduce, outgoing)?;
        for (peer, buf) in incoming.iter().enumerate() {
            if peer == me {
                continue;
            }
            let (gids, values) = wire::decode_batch::<F::Value>(buf, MessageKind::Reduce)
                .map_err(|message| GraphError::Wire { neighbor: peer, message })?;
            stats.reduce_received += gids.len();
            gids.par_iter()
                .zip(values.par_iter())
                .try_for_each(|(&gid, &v)| {
                    if !g.is_owned(gid) {
                        return Err(GraphError::Wire {
                            neighbor: peer,
                            message: format!("reduce for gid {gid}, which host {me} does not master"),
                        });
                    }
                    let lid = g.get_lid(gid).ok_or_else(|| GraphError::Wire {
                        neighbor: peer,
                        message: format!("gid {gid} is not resident on host {me}"),
                    })?;
                    field.combine(g.get_data(lid), cfg.reduce, v);
                    // the contributor's copy may now differ; refresh it on broadcast
                    if let BitsetSource::Dirty(bits) = cfg.bitset {
                        bits.set(lid as usize);
                    }
                    Ok(())
                })?;
        }
        Ok(())
    }

    fn broadcast_phase<F: NodeField<N>>(
        &self,
        field: &F,
        cfg: &SyncConfig<'_>,
        stats: &mut SyncStats,
    ) -> Result<(), GraphError> {
        let g = self.graph;
        let me = self.comm.rank();
        let n = self.comm.size();

        let dirty: Vec<LocalId> = match cfg.bitset {
            BitsetSource::Dirty(bits) => bits
                .take_range(0, g.num_masters())
                .into_iter()
                .map(|l| l as LocalId)
                .collect(),
            BitsetSource::All => (0..g.num_masters() as LocalId).collect(),
        };
        let mut per_peer: Vec<Vec<LocalId>> = vec![Vec::new(); n];
        for &lid in &dirty {
            for &h in g.mirror_hosts(lid) {
                per_peer[h].push(lid);
            }
        }

        let mut outgoing = vec![Vec::new(); n];
        for (peer, out) in outgoing.iter_mut().enumerate() {
            if peer == me {
                continue;
            }
            *out = self.pack(field, MessageKind::Broadcast, &per_peer[peer]);
            trace!(
                "[{me}] broadcast {} -> host {peer}: {} records",
                field.name(),
                per_peer[peer].len()
            );
            stats.broadcast_sent += per_peer[peer].len();
            stats.bytes_sent += out.len();
        }

        let incoming = self.comm.exchange(self.tags.broadcast, outgoing)?;
        for (peer, buf) in incoming.iter().enumerate() {
            if peer == me {
                continue;
            }
            let (gids, values) = wire::decode_batch::<F::Value>(buf, MessageKind::Broadcast)
                .map_err(|message| GraphError::Wire { neighbor: peer, message })?;
            stats.broadcast_received += gids.len();
            gids.par_iter()
                .zip(values.par_iter())
                .try_for_each(|(&gid, &v)| {
                    match g.get_lid(gid) {
                        Some(lid) if !g.is_owned(gid) => {
                            field.write(g.get_data(lid), v);
                            Ok(())
                        }
                        _ => Err(GraphError::Wire {
                            neighbor: peer,
                            message: format!("broadcast for gid {gid}, which is not a mirror on host {me}"),
                        }),
                    }
                })?;
        }
        Ok(())
    }
}

/// One-shot [`SyncEngine::sync`] with the default tags.
pub fn sync<N: Sync, C: Communicator, F: NodeField<N>>(
    graph: &PartitionedGraph<N>,
    comm: &C,
    field: &F,
    cfg: &SyncConfig<'_>,
) -> Result<SyncStats, GraphError> {
    SyncEngine::new(graph, comm).sync(field, cfg)
}
