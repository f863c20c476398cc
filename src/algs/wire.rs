//! Fixed, versioned, little-endian wire types for synchronization and
//! collective messages.
//!
//! A sync message is `WireHdr | WireBatch | n × u64 gid | n × value`. Global
//! ids are stored pre-LE with `.to_le()`; values are copied as raw `Pod`
//! bytes, so every host must agree on the value layout (homogeneous cluster).

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// What a message carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageKind {
    /// Mirror → master contributions.
    Reduce = 1,
    /// Master → mirror authoritative values.
    Broadcast = 2,
    /// One partial of an all-reduce.
    Collective = 3,
    /// Empty rendezvous message.
    Barrier = 4,
}

impl MessageKind {
    fn from_u16(k: u16) -> Option<Self> {
        match k {
            1 => Some(Self::Reduce),
            2 => Some(Self::Broadcast),
            3 => Some(Self::Collective),
            4 => Some(Self::Barrier),
            _ => None,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,  // = WIRE_VERSION.to_le()
    pub kind_le: u16,     // MessageKind
    pub reserved_le: u32, // future use; keep zero
}

impl WireHdr {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: (kind as u16).to_le(),
            reserved_le: 0,
        }
    }
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_u16(u16::from_le(self.kind_le))
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
}

/// Record count and per-value width of a batch.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireBatch {
    pub n_le: u32,
    pub value_size_le: u32,
}

impl WireBatch {
    pub fn new(n: usize, value_size: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
            value_size_le: (value_size as u32).to_le(),
        }
    }
    pub fn len(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn value_size(&self) -> usize {
        u32::from_le(self.value_size_le) as usize
    }
}

const_assert_eq!(size_of::<WireHdr>(), 8);
const_assert_eq!(size_of::<WireBatch>(), 8);

const PREFIX: usize = size_of::<WireHdr>() + size_of::<WireBatch>();

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Pack `(gid, value)` pairs into one message.
pub fn encode_batch<V: Pod>(kind: MessageKind, gids: &[u64], values: &[V]) -> Vec<u8> {
    debug_assert_eq!(gids.len(), values.len());
    let n = gids.len();
    let mut out = Vec::with_capacity(PREFIX + n * (8 + size_of::<V>()));
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(kind)));
    out.extend_from_slice(bytemuck::bytes_of(&WireBatch::new(n, size_of::<V>())));
    for &g in gids {
        out.extend_from_slice(&g.to_le_bytes());
    }
    out.extend_from_slice(bytemuck::cast_slice(values));
    out
}

/// Unpack a message produced by [`encode_batch`], checking kind and layout.
pub fn decode_batch<V: Pod>(
    buf: &[u8],
    kind: MessageKind,
) -> Result<(Vec<u64>, Vec<V>), String> {
    if buf.len() < PREFIX {
        return Err(format!("message of {} bytes is shorter than its header", buf.len()));
    }
    let hdr: WireHdr = bytemuck::pod_read_unaligned(&buf[..size_of::<WireHdr>()]);
    if hdr.version() != WIRE_VERSION {
        return Err(format!("wire version {} != {}", hdr.version(), WIRE_VERSION));
    }
    if hdr.kind() != Some(kind) {
        return Err(format!("expected {kind:?} message, got kind {:?}", hdr.kind()));
    }
    let batch: WireBatch = bytemuck::pod_read_unaligned(&buf[size_of::<WireHdr>()..PREFIX]);
    if batch.value_size() != size_of::<V>() {
        return Err(format!(
            "value width {} != local width {}",
            batch.value_size(),
            size_of::<V>()
        ));
    }
    let n = batch.len();
    expect_exact_len(buf.len(), PREFIX + n * (8 + size_of::<V>()))?;

    let (gid_bytes, value_bytes) = buf[PREFIX..].split_at(n * 8);
    let gids = gid_bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(bytemuck::pod_read_unaligned(c)))
        .collect();
    let values = if size_of::<V>() == 0 {
        vec![V::zeroed(); n]
    } else {
        value_bytes
            .chunks_exact(size_of::<V>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    };
    Ok((gids, values))
}

/// Pack a single value (collective partials).
pub fn encode_scalar<T: Pod>(kind: MessageKind, value: T) -> Vec<u8> {
    encode_batch(kind, &[0], &[value])
}

/// Unpack a single value produced by [`encode_scalar`].
pub fn decode_scalar<T: Pod>(buf: &[u8], kind: MessageKind) -> Result<T, String> {
    let (_, values) = decode_batch::<T>(buf, kind)?;
    match values.as_slice() {
        [v] => Ok(*v),
        other => Err(format!("expected one value, got {}", other.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_roundtrip() {
        let bytes = encode_batch(MessageKind::Reduce, &[3, 70_000_000_000], &[5u32, 9]);
        let (gids, vals) = decode_batch::<u32>(&bytes, MessageKind::Reduce).unwrap();
        assert_eq!(gids, vec![3, 70_000_000_000]);
        assert_eq!(vals, vec![5, 9]);
    }

    #[test]
    fn empty_batch_is_not_empty_bytes() {
        let bytes = encode_batch::<u64>(MessageKind::Broadcast, &[], &[]);
        assert_eq!(bytes.len(), 16);
        let (gids, vals) = decode_batch::<u64>(&bytes, MessageKind::Broadcast).unwrap();
        assert!(gids.is_empty() && vals.is_empty());
    }

    #[test]
    fn kind_mismatch_rejected() {
        let bytes = encode_scalar(MessageKind::Collective, 7u64);
        let err = decode_scalar::<u64>(&bytes, MessageKind::Barrier).unwrap_err();
        assert!(err.contains("expected Barrier"), "{err}");
    }

    #[test]
    fn width_mismatch_rejected() {
        let bytes = encode_batch(MessageKind::Reduce, &[1], &[1u64]);
        assert!(decode_batch::<u32>(&bytes, MessageKind::Reduce).is_err());
    }

    #[test]
    fn truncated_rejected() {
        let mut bytes = encode_batch(MessageKind::Reduce, &[1, 2], &[1u32, 2]);
        bytes.pop();
        assert!(decode_batch::<u32>(&bytes, MessageKind::Reduce).is_err());
    }

    #[test]
    fn version_guard() {
        let hdr = WireHdr::new(MessageKind::Reduce);
        assert_eq!(hdr.version(), WIRE_VERSION);
        assert_eq!(hdr.kind(), Some(MessageKind::Reduce));
    }
}
