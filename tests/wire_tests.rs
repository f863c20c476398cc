use graph_bsp::algs::communicator::CommTag;
use graph_bsp::algs::wire::{MessageKind, decode_batch, encode_batch, expect_exact_len};

#[test]
fn commtag_offset_wrap() {
    let t = CommTag::new(u16::MAX).offset(1);
    assert_eq!(t.as_u16(), 0);
}

#[test]
fn expect_exact_len_err() {
    assert!(expect_exact_len(3, 4).is_err());
    assert!(expect_exact_len(4, 4).is_ok());
}

#[test]
fn batch_keeps_large_gids() {
    let gids = [0u64, 1 << 40, u64::MAX];
    let vals = [7u32, 8, 9];
    let buf = encode_batch(MessageKind::Broadcast, &gids, &vals);
    let (g, v) = decode_batch::<u32>(&buf, MessageKind::Broadcast).unwrap();
    assert_eq!(g, gids);
    assert_eq!(v, vals);
}

#[test]
fn kind_and_width_are_checked() {
    let buf = encode_batch(MessageKind::Reduce, &[3], &[1u64]);
    assert!(decode_batch::<u64>(&buf, MessageKind::Broadcast).is_err());
    assert!(decode_batch::<u32>(&buf, MessageKind::Reduce).is_err());
    assert!(decode_batch::<u64>(&buf[..buf.len() - 1], MessageKind::Reduce).is_err());
}
