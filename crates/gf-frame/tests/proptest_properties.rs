#![forbid(unsafe_code)]

//! Property-based checks across the (shape x null-pattern x execution-mode)
//! space: key/ordinal bijection under arbitrary mutation sequences, and
//! observational equivalence of the sequential and parallel engines.

use proptest::prelude::*;

use gf_frame::{ExecMode, Frame};
use gf_index::Index;
use gf_types::ToleranceComparator;

// ---------------------------------------------------------------------------
// Strategy generators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum IndexOp {
    Add(i64),
    Remove(i64),
}

fn arb_index_op() -> impl Strategy<Value = IndexOp> {
    prop_oneof![
        3 => (0i64..40).prop_map(IndexOp::Add),
        1 => (0i64..40).prop_map(IndexOp::Remove),
    ]
}

fn arb_index_ops() -> impl Strategy<Value = Vec<IndexOp>> {
    proptest::collection::vec(arb_index_op(), 0..60)
}

/// A double frame with arbitrary shape and a sprinkling of nulls.
fn arb_double_frame() -> impl Strategy<Value = Frame<i64, i64>> {
    (1usize..40, 1usize..12).prop_flat_map(|(rows, cols)| {
        proptest::collection::vec(
            prop_oneof![
                4 => -1e6f64..1e6f64,
                1 => Just(f64::NAN),
            ],
            rows * cols,
        )
        .prop_map(move |values| {
            Frame::from_fn_doubles(0..rows as i64, 0..cols as i64, |i, j| values[i * cols + j])
                .expect("dense integer keys are unique")
        })
    })
}

/// A double frame with no NaN cells.
fn arb_finite_frame() -> impl Strategy<Value = Frame<i64, i64>> {
    (1usize..20, 1usize..8).prop_flat_map(|(rows, cols)| {
        proptest::collection::vec(-1e6f64..1e6f64, rows * cols).prop_map(move |values| {
            Frame::from_fn_doubles(0..rows as i64, 0..cols as i64, |i, j| values[i * cols + j])
                .expect("dense integer keys are unique")
        })
    })
}

// ---------------------------------------------------------------------------
// Property: index bijection under mutation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// After any add/remove sequence, key -> ordinal -> key is the identity,
    /// ordinals are dense in [0, len), and the key list has no duplicates.
    #[test]
    fn prop_index_bijection_survives_mutation(ops in arb_index_ops()) {
        let mut index: Index<i64> = Index::new();
        let mut model: Vec<i64> = Vec::new();
        for op in ops {
            match op {
                IndexOp::Add(key) => {
                    let result = index.add(key);
                    if model.contains(&key) {
                        prop_assert!(result.is_err(), "duplicate add of {key} must fail");
                    } else {
                        prop_assert_eq!(result.expect("fresh add"), model.len());
                        model.push(key);
                    }
                }
                IndexOp::Remove(key) => {
                    let result = index.remove(&key);
                    match model.iter().position(|&k| k == key) {
                        Some(pos) => {
                            prop_assert_eq!(result.expect("present remove"), pos);
                            model.remove(pos);
                        }
                        None => prop_assert!(result.is_err(), "absent remove of {key} must fail"),
                    }
                }
            }
        }
        prop_assert_eq!(index.len(), model.len());
        prop_assert_eq!(index.keys(), model.as_slice());
        for (ordinal, key) in model.iter().enumerate() {
            prop_assert_eq!(index.ordinal_of(key), Some(ordinal));
            prop_assert_eq!(index.key_of(ordinal).expect("dense ordinal"), key);
        }
        prop_assert!(index.key_of(model.len()).is_err());
    }

    /// Range queries agree with a naive scan whether or not the index is sorted.
    #[test]
    fn prop_range_matches_naive_scan(
        keys in proptest::collection::hash_set(0i64..200, 0..40),
        lo in 0i64..200,
        span in 0i64..100,
    ) {
        let keys: Vec<i64> = keys.into_iter().collect();
        let index = Index::from_keys(keys.clone()).expect("set keys are unique");
        let hi = lo + span;
        let naive: Vec<usize> = keys
            .iter()
            .enumerate()
            .filter(|(_, k)| **k >= lo && **k <= hi)
            .map(|(ordinal, _)| ordinal)
            .collect();
        prop_assert_eq!(index.range(lo..=hi), naive);
    }
}

// ---------------------------------------------------------------------------
// Property: sequential / parallel equivalence
// ---------------------------------------------------------------------------

fn plus_row_ordinal(cell: &gf_frame::CellRef<'_, i64, i64>) -> f64 {
    cell.get_double().unwrap_or(f64::NAN) + cell.row_ordinal() as f64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// apply_doubles writes identical frames in either execution mode.
    #[test]
    fn prop_apply_modes_are_equivalent(frame in arb_double_frame()) {
        let mut seq = frame.clone();
        let mut par = frame;
        seq.apply_doubles(ExecMode::Sequential, plus_row_ordinal).expect("sequential");
        par.apply_doubles(ExecMode::Parallel, plus_row_ordinal).expect("parallel");
        prop_assert_eq!(seq, par);
    }

    /// Filtering yields the same ordinals in the same order in either mode.
    #[test]
    fn prop_filter_modes_agree(frame in arb_double_frame(), modulus in 2i64..7) {
        let seq: Vec<i64> = frame
            .rows()
            .filter(|row| row.key() % modulus == 0)
            .iter()
            .map(|row| *row.key())
            .collect();
        let par: Vec<i64> = frame
            .rows()
            .parallel()
            .filter(|row| row.key() % modulus == 0)
            .iter()
            .map(|row| *row.key())
            .collect();
        prop_assert_eq!(seq, par);
    }

    /// Every row is visited exactly once in either mode.
    #[test]
    fn prop_for_each_visits_each_row_once(frame in arb_double_frame()) {
        for view in [frame.rows().sequential(), frame.rows().parallel()] {
            let visited = std::sync::Mutex::new(Vec::new());
            view.for_each(|row| visited.lock().unwrap().push(row.ordinal()));
            let mut visited = visited.into_inner().unwrap();
            visited.sort_unstable();
            let expected: Vec<usize> = (0..frame.row_count()).collect();
            prop_assert_eq!(visited, expected);
        }
    }

    /// Column statistics are invariant under row re-selection of all rows.
    #[test]
    fn prop_stats_survive_reselection(frame in arb_double_frame()) {
        let all: Vec<usize> = (0..frame.row_count()).collect();
        let reselected = frame.select_rows(&all).expect("full selection");
        let cmp = ToleranceComparator::DEFAULT;
        for col in frame.col_index().keys() {
            let a = frame.col(col).expect("col").stats().expect("stats");
            let b = reselected.col(col).expect("col").stats().expect("stats");
            prop_assert!(a.approx_eq(&b, &cmp), "stats diverged for column {col}");
        }
    }

    /// Finite frames survive a JSON round-trip (JSON has no NaN literal, so
    /// nulls in double columns are out of scope here).
    #[test]
    fn prop_frame_json_round_trip(frame in arb_finite_frame()) {
        let json = serde_json::to_string(&frame).expect("serialize");
        let back: Frame<i64, i64> = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back.row_count(), frame.row_count());
        prop_assert_eq!(back.col_count(), frame.col_count());
        let cmp = ToleranceComparator::DEFAULT;
        for row in 0..frame.row_count() {
            for col in 0..frame.col_count() {
                let a = frame.get_double_at(row, col).expect("cell");
                let b = back.get_double_at(row, col).expect("cell");
                prop_assert!(cmp.equals(a, b), "cell ({row}, {col}) drifted: {a} vs {b}");
            }
        }
    }
}
