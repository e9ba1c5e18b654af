//! Property-based tests for amount parsing.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::values::parse_amount;
use crate::reader::Cell;

/// Groups the integer digits of `cents / 100` with `sep`.
fn group_thousands(cents: i64, thousands: char, decimal: char) -> String {
    let units = (cents / 100).to_string();
    let mut grouped = String::new();
    for (idx, digit) in units.chars().enumerate() {
        if idx > 0 && (units.len() - idx) % 3 == 0 {
            grouped.push(thousands);
        }
        grouped.push(digit);
    }
    format!("{grouped}{decimal}{:02}", cents % 100)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Amounts written with either locale convention parse to the same value.
    #[test]
    fn prop_locale_formats_agree(cents in 0i64..100_000_000_000i64) {
        let expected = Decimal::new(cents, 2);
        let latin = group_thousands(cents, '.', ',');
        let english = group_thousands(cents, ',', '.');

        prop_assert_eq!(parse_amount(&Cell::text(&latin)).unwrap(), expected);
        prop_assert_eq!(parse_amount(&Cell::text(&english)).unwrap(), expected);
    }

    /// Parentheses negate.
    #[test]
    fn prop_parentheses_negate(cents in 1i64..100_000_000i64) {
        let plain = group_thousands(cents, '.', ',');
        let wrapped = format!("(${plain})");
        prop_assert_eq!(
            parse_amount(&Cell::text(&wrapped)).unwrap(),
            -parse_amount(&Cell::text(&plain)).unwrap()
        );
    }

    /// Arbitrary text never panics.
    #[test]
    fn prop_arbitrary_text_does_not_panic(raw in ".{0,24}") {
        let _ = parse_amount(&Cell::text(&raw));
    }
}
