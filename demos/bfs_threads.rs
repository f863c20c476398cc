// cargo run --example bfs_threads -- [hosts] [edge|cartesian|hybrid] [nodes]
//
// Runs pull-style BFS with every host on its own thread of this process.
use std::process::ExitCode;

use graph_bsp::apps::bfs::{self, BfsOutcome, INFINITY};
use graph_bsp::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn parse_strategy(s: &str) -> Option<CutStrategy> {
    match s {
        "edge" => Some(CutStrategy::EdgeCut),
        "cartesian" => Some(CutStrategy::CartesianCut),
        "hybrid" => Some(CutStrategy::hybrid()),
        _ => None,
    }
}

fn host_main(
    comm: ThreadComm,
    edges: &EdgeList,
    part: &PartitionConfig,
    run: &RunConfig,
) -> Result<BfsOutcome, GraphError> {
    let host = comm.rank();
    let graph = bfs::build_graph(host, comm.size(), edges, part)?;
    let exec = BspExecutor::from_config(run)?;
    bfs::run(&graph, &comm, &exec, &Backend::Cpu, run)
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let hosts: usize = args.first().and_then(|a| a.parse().ok()).unwrap_or(4);
    let Some(strategy) = parse_strategy(args.get(1).map_or("edge", String::as_str)) else {
        eprintln!("unknown strategy {:?}; use edge, cartesian or hybrid", args[1]);
        return ExitCode::FAILURE;
    };
    let nodes: u64 = args.get(2).and_then(|a| a.parse().ok()).unwrap_or(10_000);

    let mut rng = SmallRng::seed_from_u64(7);
    let edges = EdgeList::new(
        nodes,
        (0..nodes * 4)
            .map(|_| (rng.gen_range(0..nodes), rng.gen_range(0..nodes)))
            .collect(),
    );
    let part = PartitionConfig::new(strategy);
    let run = RunConfig::default().with_verify(true).with_num_threads(2);

    let (edges, part, run) = (&edges, &part, &run);
    let results: Vec<Result<BfsOutcome, GraphError>> = std::thread::scope(|s| {
        let handles: Vec<_> = ThreadComm::world(hosts)
            .into_iter()
            .map(|comm| s.spawn(move || host_main(comm, edges, part, run)))
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(GraphError::Backend("host thread panicked".into())))
            })
            .collect()
    });

    let mut reached = 0;
    for (host, r) in results.iter().enumerate() {
        match r {
            Ok(outcome) => {
                reached += outcome.output.iter().filter(|&&(_, d)| d < INFINITY).count();
                if host == 0 {
                    let stats = &outcome.runs[0];
                    let sanity = &outcome.sanity[0];
                    println!(
                        "{} on {hosts} hosts ({}): {} rounds, converged {}",
                        stats.identifier,
                        strategy.name(),
                        stats.rounds,
                        stats.converged
                    );
                    println!(
                        "Number of nodes visited is {}, max distance is {}",
                        sanity.visited, sanity.max_distance
                    );
                }
            }
            Err(e) => {
                eprintln!("host {host}: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    println!("verified {reached} reached nodes across all hosts");
    ExitCode::SUCCESS
}
