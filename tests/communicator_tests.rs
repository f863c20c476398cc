mod util;

use std::time::Duration;

use graph_bsp::algs::communicator::{CommTag, Communicator, ThreadComm, Wait};
use graph_bsp::algs::ReduceOp;
use graph_bsp::GraphError;
use util::*;

#[test]
fn thread_round_trip() {
    let tag = CommTag(0x1000);
    let world = ThreadComm::world(2);

    let msg = b"hello";
    world[0].isend(1, tag.as_u16(), msg).wait();
    let got = world[1].irecv(0, tag.as_u16()).wait().unwrap();
    assert_eq!(&got, msg);
}

#[test]
fn thread_fifo_order() {
    let tag = CommTag(0x1001);
    let world = ThreadComm::world(2);

    for i in 0..10u8 {
        world[0].isend(1, tag.as_u16(), &[i]);
    }
    let out: Vec<u8> = (0..10)
        .map(|_| world[1].irecv(0, tag.as_u16()).wait().unwrap()[0])
        .collect();
    assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
}

#[test]
fn tags_do_not_mix() {
    let world = ThreadComm::world(2);
    world[0].isend(1, 1, &[1]);
    world[0].isend(1, 2, &[2]);
    assert_eq!(world[1].irecv(0, 2).wait().unwrap(), vec![2]);
    assert_eq!(world[1].irecv(0, 1).wait().unwrap(), vec![1]);
}

#[test]
fn exchange_is_personalized() {
    let n = 4;
    let got = run_hosts(n, |comm| {
        let me = comm.rank() as u8;
        let outgoing = (0..n as u8).map(|p| vec![me, p]).collect();
        comm.exchange(CommTag::new(0x2000), outgoing).unwrap()
    });
    for (me, slots) in got.iter().enumerate() {
        for (peer, buf) in slots.iter().enumerate() {
            assert_eq!(buf, &vec![peer as u8, me as u8]);
        }
    }
}

#[test]
fn all_reduce_and_barrier() {
    let out = run_hosts(5, |comm| {
        let v = comm.rank() as u64 + 1;
        comm.barrier().unwrap();
        let sum = comm.all_reduce(v, ReduceOp::Sum).unwrap();
        let min = comm.all_reduce(v, ReduceOp::Min).unwrap();
        let max = comm.all_reduce(v as f64 * 0.5, ReduceOp::Max).unwrap();
        comm.barrier().unwrap();
        (sum, min, max)
    });
    assert!(out.iter().all(|&r| r == (15, 1, 2.5)));
}

#[test]
fn silent_peer_is_a_transport_error() {
    let world = ThreadComm::world(3);
    let c2 = world[2]
        .clone()
        .with_recv_timeout(Some(Duration::from_millis(25)));
    let err = c2.all_reduce(1u32, ReduceOp::Sum).unwrap_err();
    assert!(matches!(err, GraphError::CommError { neighbor: 0, .. }));
    assert!(err.to_string().contains("host 0"));
}

#[cfg(feature = "mpi-support")]
mod mpi_smoke {
    use graph_bsp::algs::communicator::{CommTag, Communicator, MpiComm};
    use graph_bsp::algs::ReduceOp;
    use serial_test::serial;

    #[test]
    #[serial]
    fn collectives_and_large_exchange() {
        let Some(comm) = MpiComm::new() else {
            return;
        };
        comm.barrier().unwrap();
        let total = comm.all_reduce(1u64, ReduceOp::Sum).unwrap();
        assert_eq!(total, comm.size() as u64);

        // MPI initializes once per process, so exchange is checked here too
        let n = comm.size();
        let me = comm.rank() as u8;
        // large enough to leave the eager protocol
        let outgoing = (0..n).map(|p| vec![me ^ p as u8; 1 << 20]).collect();
        let got = comm.exchange(CommTag::new(0x3000), outgoing).unwrap();
        for (peer, buf) in got.iter().enumerate() {
            assert_eq!(buf.len(), 1 << 20);
            assert!(buf.iter().all(|&b| b == peer as u8 ^ me));
        }
    }
}
