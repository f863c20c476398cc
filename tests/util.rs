#![allow(dead_code)]
use std::collections::VecDeque;

use graph_bsp::algs::communicator::ThreadComm;
use graph_bsp::partitioning::{CutStrategy, EdgeList, PartitionConfig};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Run `f` once per host, each on its own thread with its own endpoint.
/// Results come back in host order.
pub fn run_hosts<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(ThreadComm) -> T + Sync,
{
    let comms = ThreadComm::world(n);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                let f = &f;
                s.spawn(move || f(c))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("host thread panicked"))
            .collect()
    })
}

/// Every strategy, with a hybrid threshold low enough to cut on small graphs.
pub fn all_strategies() -> Vec<PartitionConfig> {
    vec![
        PartitionConfig::new(CutStrategy::EdgeCut),
        PartitionConfig::new(CutStrategy::CartesianCut),
        PartitionConfig::new(CutStrategy::HybridCut { threshold: 2 }),
    ]
}

/// `m` random directed edges over `n` nodes, fixed by `seed`.
pub fn random_graph(n: u64, m: usize, seed: u64) -> EdgeList {
    let mut rng = SmallRng::seed_from_u64(seed);
    let edges = (0..m)
        .map(|_| (rng.gen_range(0..n), rng.gen_range(0..n)))
        .collect();
    EdgeList::new(n, edges)
}

/// Sequential BFS over out-edges; unreachable nodes get `infinity`.
pub fn reference_bfs(graph: &EdgeList, src: u64, infinity: u32) -> Vec<u32> {
    let n = graph.num_nodes() as usize;
    let mut adj = vec![Vec::new(); n];
    for &(u, v) in graph.edges() {
        adj[u as usize].push(v as usize);
    }
    let mut dist = vec![infinity; n];
    let mut queue = VecDeque::new();
    dist[src as usize] = 0;
    queue.push_back(src as usize);
    while let Some(u) = queue.pop_front() {
        for &v in &adj[u] {
            if dist[v] == infinity {
                dist[v] = dist[u] + 1;
                queue.push_back(v);
            }
        }
    }
    dist
}

/// Merge per-host `(gid, value)` lists into one vector indexed by gid.
pub fn merge_owned<V: Copy + Default>(n: u64, per_host: &[Vec<(u64, V)>]) -> Vec<V> {
    let mut out = vec![V::default(); n as usize];
    let mut seen = vec![false; n as usize];
    for list in per_host {
        for &(g, v) in list {
            assert!(!seen[g as usize], "gid {g} reported by two hosts");
            seen[g as usize] = true;
            out[g as usize] = v;
        }
    }
    assert!(seen.iter().all(|&s| s), "some gid was reported by no host");
    out
}
