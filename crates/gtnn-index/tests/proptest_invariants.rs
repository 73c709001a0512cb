// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gtnn_core::{DenseMatrix, dot};
use gtnn_index::{Block, PrefixIndex, SummationMode, block_sum};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn integer_matrix(max_rows: usize, dim: usize) -> impl Strategy<Value = DenseMatrix> {
    (1..max_rows).prop_flat_map(move |rows| {
        prop::collection::vec(0i16..100, rows * dim).prop_map(move |cells| {
            let values = cells.into_iter().map(f64::from).collect::<Vec<_>>();
            DenseMatrix::from_vec(values, rows, dim).expect("generated shape should be valid")
        })
    })
}

fn range_in(len: usize) -> impl Strategy<Value = (usize, usize)> {
    (0..len).prop_flat_map(move |start| (Just(start), start..len))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        .. ProptestConfig::default()
    })]

    #[test]
    fn range_sum_equals_literal_sum(
        (source, (start, end)) in (1usize..5)
            .prop_flat_map(|dim| integer_matrix(40, dim))
            .prop_flat_map(|m| { let rows = m.rows(); (Just(m), range_in(rows)) }),
    ) {
        for mode in [SummationMode::Plain, SummationMode::Compensated] {
            let index = PrefixIndex::build_with(&source, mode).expect("index should build");
            let mut expected = vec![0.0; source.cols()];
            for row in start..=end {
                for (slot, value) in expected.iter_mut().zip(source.row(row)) {
                    *slot += value;
                }
            }
            prop_assert_eq!(index.range_sum(start, end), expected);
        }
    }

    #[test]
    fn block_sum_equals_pairwise_sum(
        (data, queries) in (1usize..4).prop_flat_map(|dim| (integer_matrix(12, dim), integer_matrix(8, dim))),
        seed in any::<u64>(),
    ) {
        let data_index = PrefixIndex::build(&data).expect("data index should build");
        let query_index = PrefixIndex::build(&queries).expect("query index should build");

        let pick = |modulus: usize, shift: u32| (seed.rotate_left(shift) as usize) % modulus;
        let a = pick(data.rows(), 0);
        let b = a + pick(data.rows() - a, 16);
        let c = pick(queries.rows(), 32);
        let d = c + pick(queries.rows() - c, 48);
        let block = Block::new(a, b, c, d);

        let mut expected = 0.0;
        for i in a..=b {
            for j in c..=d {
                expected += dot(data.row(i), queries.row(j));
            }
        }
        let sum = block_sum(&data_index, &query_index, block);
        prop_assert_eq!(sum.value, expected);
        prop_assert!(sum.scale >= sum.value);
    }
}
