//! Thin façade over inter-host message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees). Handles
//! are waitable; the synchronization engine calls `.wait()` on every handle
//! before it trusts a buffer. Collectives (`exchange`, `barrier`,
//! `all_reduce`) have default implementations in terms of `isend`/`irecv`;
//! backends with native collectives override them.
//!
//! The core treats every transport failure as fatal: there are no retries.

use std::collections::VecDeque;
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;

use crate::algs::reduction::{ReduceOp, ReduceValue};
use crate::algs::wire::{self, MessageKind};
use crate::graph_error::GraphError;

/// A message tag. Messages with equal `(src, dst, tag)` are delivered in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    pub const fn offset(self, by: u16) -> Self {
        Self(self.0.wrapping_add(by))
    }

    /// Tag reserved for the default `all_reduce`.
    pub const COLLECTIVE: CommTag = CommTag(0xC011);
    /// Tag reserved for the default `barrier`.
    pub const BARRIER: CommTag = CommTag(0xBA77);
}

/// Tags used by one synchronization call (reduce then broadcast).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncCommTags {
    pub reduce: CommTag,
    pub broadcast: CommTag,
}

impl SyncCommTags {
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            reduce: base,
            broadcast: base.offset(1),
        }
    }
}

impl Default for SyncCommTags {
    fn default() -> Self {
        Self::from_base(CommTag::new(0x5100))
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    ///
    /// Receive handles return `None` on failure.
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Host-to-host transport.
pub trait Communicator: 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// This host's id in `[0, size)`.
    fn rank(&self) -> usize;
    /// Number of participating hosts.
    fn size(&self) -> usize;

    /// Post a send to `peer`. Some transports block here until the peer
    /// receives, so two hosts calling `isend` then `irecv` on each other can
    /// deadlock. [`Communicator::exchange`] never does.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle;

    /// Personalized all-to-all: `outgoing[p]` goes to host `p`, and the result's
    /// slot `p` holds what host `p` sent here. Exactly one message per peer pair.
    ///
    /// The local slot is moved across without touching the transport.
    fn exchange(&self, tag: CommTag, mut outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, GraphError> {
        let me = self.rank();
        let n = self.size();
        if outgoing.len() != n {
            return Err(GraphError::CommError {
                neighbor: me,
                message: format!("exchange needs {n} buffers, got {}", outgoing.len()),
            });
        }

        // 1) post all sends; buffers stay alive until the handles drain
        let mut pending_sends = Vec::with_capacity(n.saturating_sub(1));
        for (peer, buf) in outgoing.iter().enumerate() {
            if peer != me {
                pending_sends.push(self.isend(peer, tag.as_u16(), buf));
            }
        }

        // 2) receive from every peer (but do not early-return)
        let mut incoming = vec![Vec::new(); n];
        let mut maybe_err = None;
        for (peer, slot) in incoming.iter_mut().enumerate() {
            if peer == me {
                continue;
            }
            match self.irecv(peer, tag.as_u16()).wait() {
                Some(data) => *slot = data,
                None if maybe_err.is_none() => {
                    maybe_err = Some(GraphError::CommError {
                        neighbor: peer,
                        message: format!("failed to receive tag {:#06x} from host {peer}", tag.0),
                    });
                }
                None => {}
            }
        }

        // 3) always drain all send handles before returning
        for send in pending_sends {
            let _ = send.wait();
        }

        if let Some(err) = maybe_err {
            return Err(err);
        }
        incoming[me] = std::mem::take(&mut outgoing[me]);
        Ok(incoming)
    }

    /// Block until every host has entered the barrier.
    fn barrier(&self) -> Result<(), GraphError> {
        let n = self.size();
        let empty = wire::encode_batch::<u8>(MessageKind::Barrier, &[], &[]);
        let replies = self.exchange(CommTag::BARRIER, vec![empty; n])?;
        for (peer, reply) in replies.iter().enumerate() {
            wire::decode_batch::<u8>(reply, MessageKind::Barrier)
                .map_err(|message| GraphError::Wire { neighbor: peer, message })?;
        }
        Ok(())
    }

    /// Combine every host's `value` with `op`; every host gets the same result.
    ///
    /// Partials are folded in host order, so the result is bit-identical on
    /// every host even for floating-point sums.
    fn all_reduce<T: ReduceValue>(&self, value: T, op: ReduceOp) -> Result<T, GraphError> {
        let n = self.size();
        let msg = wire::encode_scalar(MessageKind::Collective, value);
        let partials = self.exchange(CommTag::COLLECTIVE, vec![msg; n])?;
        let mut acc = T::identity(op);
        for (peer, bytes) in partials.iter().enumerate() {
            let v = wire::decode_scalar::<T>(bytes, MessageKind::Collective)
                .map_err(|message| GraphError::Wire { neighbor: peer, message })?;
            acc = T::combine(op, acc, v);
        }
        Ok(acc)
    }
}

/// Single-host transport: every collective is local.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16) {}
    fn barrier(&self) -> Result<(), GraphError> {
        Ok(())
    }
    fn all_reduce<T: ReduceValue>(&self, value: T, op: ReduceOp) -> Result<T, GraphError> {
        Ok(T::combine(op, T::identity(op), value))
    }
}

// --- ThreadComm: hosts as threads of one process ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Mailbox {
    queues: DashMap<Key, VecDeque<Bytes>>,
}

impl Mailbox {
    fn push(&self, key: Key, msg: Bytes) {
        self.queues.entry(key).or_default().push_back(msg);
    }

    fn pop(&self, key: &Key) -> Option<Bytes> {
        self.queues.get_mut(key).and_then(|mut q| q.pop_front())
    }
}

/// Receive handle for [`ThreadComm`]; polls the shared mailbox on `wait`.
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    timeout: Option<Duration>,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let start = Instant::now();
        loop {
            if let Some(bytes) = self.mailbox.pop(&self.key) {
                return Some(bytes.to_vec());
            }
            if self.timeout.is_some_and(|t| start.elapsed() >= t) {
                log::error!(
                    "host {} timed out waiting for host {} (tag {:#06x})",
                    self.key.1,
                    self.key.0,
                    self.key.2
                );
                return None;
            }
            std::thread::yield_now();
        }
    }
}

/// In-process transport: one endpoint per host, all sharing a mailbox.
///
/// Sends never block. Receives poll until a message arrives or the
/// configured timeout expires.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    barrier: Arc<Barrier>,
    recv_timeout: Option<Duration>,
}

impl ThreadComm {
    /// Default receive timeout for in-process hosts.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create the endpoints of an `n`-host world.
    pub fn world(n: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox::default());
        let barrier = Arc::new(Barrier::new(n.max(1)));
        (0..n)
            .map(|rank| ThreadComm {
                rank,
                size: n,
                mailbox: mailbox.clone(),
                barrier: barrier.clone(),
                recv_timeout: Some(Self::DEFAULT_TIMEOUT),
            })
            .collect()
    }

    /// Override the receive timeout (`None` waits forever).
    pub fn with_recv_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.recv_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.mailbox
            .push((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle {
        LocalHandle {
            mailbox: self.mailbox.clone(),
            key: (peer, self.rank, tag),
            timeout: self.recv_timeout,
        }
    }

    fn barrier(&self) -> Result<(), GraphError> {
        self.barrier.wait();
        Ok(())
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::environment::Universe;
    use mpi::request::WaitGuard;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// World communicator over MPI. Owns the MPI environment.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        /// Initialize MPI. Returns `None` if MPI was already initialized.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    /// A receive that already completed (MPI receives block in `irecv`).
    pub struct MpiRecv(Vec<u8>);

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            Some(self.0)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        /// Standard-mode blocking send: it may wait for the matching receive.
        /// Only `exchange`, which posts immediate sends in a request scope,
        /// is deadlock-free between two hosts sending to each other.
        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag as i32);
        }

        fn irecv(&self, peer: usize, tag: u16) -> MpiRecv {
            let (msg, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(tag as i32);
            MpiRecv(msg)
        }

        fn exchange(&self, tag: CommTag, mut outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, GraphError> {
            let me = self.rank;
            if outgoing.len() != self.size {
                return Err(GraphError::CommError {
                    neighbor: me,
                    message: format!("exchange needs {} buffers, got {}", self.size, outgoing.len()),
                });
            }
            let mut incoming = vec![Vec::new(); self.size];
            mpi::request::scope(|scope| {
                let mut guards = Vec::with_capacity(self.size);
                for (peer, buf) in outgoing.iter().enumerate() {
                    if peer != me {
                        let req = self
                            .world
                            .process_at_rank(peer as i32)
                            .immediate_send_with_tag(scope, &buf[..], tag.as_u16() as i32);
                        guards.push(WaitGuard::from(req));
                    }
                }
                for (peer, slot) in incoming.iter_mut().enumerate() {
                    if peer != me {
                        *slot = self.irecv(peer, tag.as_u16()).0;
                    }
                }
                drop(guards);
            });
            incoming[me] = std::mem::take(&mut outgoing[me]);
            Ok(incoming)
        }

        fn barrier(&self) -> Result<(), GraphError> {
            self.world.barrier();
            Ok(())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
