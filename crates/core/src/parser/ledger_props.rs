//! Property-based tests for ledger parsing.
//!
//! Movement count equals the dated rows inside account blocks minus the rows
//! whose date cannot be parsed.

use proptest::prelude::*;

use super::ledger::LedgerParser;
use crate::reader::{Cell, Column, Sheet, find_header_row};

#[derive(Debug, Clone)]
enum RowSpec {
    Opening(u16),
    Movement { day: u32, debit: u32 },
    BadDate,
    Subtotal,
}

fn row_spec() -> impl Strategy<Value = RowSpec> {
    prop_oneof![
        1 => (1000u16..9999).prop_map(RowSpec::Opening),
        6 => (1u32..=28, 0u32..1_000_000).prop_map(|(day, debit)| RowSpec::Movement { day, debit }),
        1 => Just(RowSpec::BadDate),
        1 => Just(RowSpec::Subtotal),
    ]
}

fn render(spec: &RowSpec) -> Vec<Cell> {
    let cells: Vec<String> = match spec {
        RowSpec::Opening(code) => vec![format!("Saldo anterior: {code} Cuenta"), String::new(), String::new(), "0".into()],
        RowSpec::Movement { day, debit } => vec![format!("{day:02}/03/2024"), debit.to_string(), "0".into(), String::new()],
        RowSpec::BadDate => vec!["99/99/2024".into(), "1".into(), "0".into(), String::new()],
        RowSpec::Subtotal => vec![String::new(), "10".into(), "10".into(), "0".into()],
    };
    cells.iter().map(|c| Cell::text(c)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_movement_count_matches_dated_rows_in_blocks(specs in prop::collection::vec(row_spec(), 0..60)) {
        let mut rows = vec![vec![Cell::text("Fecha"), Cell::text("Debe"), Cell::text("Haber"), Cell::text("Saldo")]];
        rows.extend(specs.iter().map(render));
        let sheet = Sheet::new(rows);
        let columns = find_header_row(&sheet, &Column::ALL, 30).unwrap();
        let ledger = LedgerParser::new(&columns).parse(&sheet);

        let mut in_block = false;
        let mut dated_in_block = 0usize;
        let mut bad_in_block = 0usize;
        for spec in &specs {
            match spec {
                RowSpec::Opening(_) => in_block = true,
                RowSpec::Movement { .. } if in_block => dated_in_block += 1,
                RowSpec::BadDate if in_block => {
                    dated_in_block += 1;
                    bad_in_block += 1;
                }
                _ => {}
            }
        }

        prop_assert_eq!(ledger.movements.len(), dated_in_block - bad_in_block);
        prop_assert_eq!(ledger.rows_scanned, specs.len());
        prop_assert!(ledger.movements.iter().all(|m| m.credit.is_zero()));
    }
}
