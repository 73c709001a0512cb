// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gtnn_core::DenseMatrix;
use gtnn_search::{BruteForceOracle, GroupTestConfig, GroupTestEngine};
use std::thread;

fn synthetic(rows: usize, dim: usize, seed: usize) -> DenseMatrix {
    let values = (0..rows * dim)
        .map(|i| ((i * 7 + seed * 13) % 11) as f64 / 10.0)
        .collect::<Vec<_>>();
    DenseMatrix::from_vec(values, rows, dim).expect("synthetic shape should be valid")
}

#[test]
fn one_engine_serves_concurrent_query_sets() {
    const THREADS: usize = 4;

    let data = synthetic(200, 6, 0);
    let engine = GroupTestEngine::new(&data, GroupTestConfig::with_rho(2.5))
        .expect("engine should build");
    let oracle = BruteForceOracle::new(2.5).expect("oracle should build");

    thread::scope(|scope| {
        let workers = (0..THREADS)
            .map(|worker| {
                let engine = &engine;
                let data = &data;
                scope.spawn(move || {
                    let queries = synthetic(16, 6, worker + 1);
                    let outcome = engine
                        .search_matrix(&queries)
                        .expect("threaded search should succeed");
                    let truth = oracle
                        .exhaustive_search(data, &queries)
                        .expect("oracle should succeed");
                    (outcome.hits.sorted(), truth.hits)
                })
            })
            .collect::<Vec<_>>();

        for worker in workers {
            let (found, truth) = worker.join().expect("thread should join cleanly");
            assert_eq!(found, truth);
        }
    });
}

#[test]
fn repeated_calls_do_not_leak_query_state() {
    let data = synthetic(64, 4, 3);
    let engine = GroupTestEngine::new(&data, GroupTestConfig::with_rho(1.5))
        .expect("engine should build");

    let first_queries = synthetic(8, 4, 5);
    let second_queries = synthetic(3, 4, 9);

    let first = engine
        .search_matrix(&first_queries)
        .expect("first search should succeed");
    let _ = engine
        .search_matrix(&second_queries)
        .expect("second search should succeed");
    let again = engine
        .search_matrix(&first_queries)
        .expect("repeat search should succeed");

    assert_eq!(first.hits, again.hits);
    assert_eq!(first.stats.recursive_calls, again.stats.recursive_calls);
}
