// crates/casjobs-client/tests/proptest_frame.rs
// ============================================================================
// Module: Frame Property-Based Tests
// Description: CSV serialization checks over generated cell values.
// Purpose: Ensure uploaded frames parse back to the same cells.
// ============================================================================

//! ## Overview
//! Text cells containing delimiters, quotes, and newlines must survive the
//! CSV writer and reader unchanged, and float columns keep their values.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use casjobs_client::Cell;
use casjobs_client::DataFrame;
use proptest::prelude::*;

proptest! {
    #[test]
    fn text_cells_survive_csv(values in prop::collection::vec("x[a-zA-Z0-9 ,\"\n]{0,12}", 1..8)) {
        let rows: Vec<Vec<Cell>> = values.iter().map(|value| vec![Cell::from(value.as_str())]).collect();
        let frame = DataFrame::new(vec!["label".to_string()], rows).unwrap();
        let csv = frame.to_csv().unwrap();
        let parsed = DataFrame::from_csv(csv.as_slice(), Some(0)).unwrap();
        prop_assert_eq!(parsed.index_name(), Some("index"));
        prop_assert_eq!(parsed.len(), values.len());
        for (row, value) in values.iter().enumerate() {
            prop_assert_eq!(parsed.get(row, "label"), Some(&Cell::Text(value.clone())));
        }
    }

    #[test]
    fn float_cells_survive_csv(values in prop::collection::vec(-1.0e12_f64..1.0e12, 1..8)) {
        let rows: Vec<Vec<Cell>> = values.iter().map(|value| vec![Cell::Float(*value)]).collect();
        let frame = DataFrame::new(vec!["mag".to_string()], rows).unwrap();
        let parsed = DataFrame::from_csv(frame.to_csv().unwrap().as_slice(), None).unwrap();
        for (row, value) in values.iter().enumerate() {
            prop_assert_eq!(parsed.get(row, "mag").and_then(Cell::as_f64), Some(*value));
        }
    }
}
