// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use gtnn_core::DenseMatrix;
use gtnn_search::{BruteForceOracle, GroupTestConfig, GroupTestEngine};
use libfuzzer_sys::fuzz_target;

const MAX_ROWS: usize = 48;
const MAX_QUERIES: usize = 12;
const MAX_DIM: usize = 6;

fn take_matrix(bytes: &mut impl Iterator<Item = u8>, rows: usize, dim: usize) -> DenseMatrix {
    // Integer-valued cells keep every block sum exact.
    let values = (0..rows * dim)
        .map(|_| f64::from(bytes.next().unwrap_or(0) % 8))
        .collect::<Vec<_>>();
    DenseMatrix::from_vec(values, rows, dim).expect("mapped shape must be valid")
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }
    let n = 1 + usize::from(data[0]) % MAX_ROWS;
    let nq = 1 + usize::from(data[1]) % MAX_QUERIES;
    let dim = 1 + usize::from(data[2]) % MAX_DIM;
    let rho = f64::from(data[3] % 64);
    let batch_size = usize::from(data[4]) % (nq + 1);

    let mut bytes = data[5..].iter().copied();
    let matrix = take_matrix(&mut bytes, n, dim);
    let queries = take_matrix(&mut bytes, nq, dim);

    let engine = GroupTestEngine::new(
        &matrix,
        GroupTestConfig {
            batch_size,
            prune_slack: 0.0,
            ..GroupTestConfig::with_rho(rho)
        },
    )
    .expect("engine must accept non-negative input");
    let found = engine
        .search_matrix(&queries)
        .expect("search must succeed on finite input");
    let truth = BruteForceOracle::new(rho)
        .expect("rho is finite")
        .exhaustive_search(&matrix, &queries)
        .expect("oracle must succeed");

    assert_eq!(found.hits.sorted(), truth.hits);
});
