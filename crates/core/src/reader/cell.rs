//! Owned cell values.

use std::fmt;

use calamine::{Data, DataType};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// A spreadsheet cell after conversion out of the source format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Blank cell.
    Empty,
    /// Text, trimmed.
    Text(String),
    /// Numeric value.
    Number(Decimal),
    /// Native date or date-time value.
    Date(NaiveDateTime),
    /// Boolean value.
    Bool(bool),
}

impl Cell {
    /// Builds a text cell, mapping blank text to `Empty`.
    #[must_use]
    pub fn text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    /// Returns true for blank cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the text content, if this is a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the cell as trimmed text, `None` when blank.
    ///
    /// Whole numbers render without a fractional part so numeric document
    /// codes and account codes read the same as their text form.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(n.normalize().to_string()),
            Self::Date(dt) => Some(dt.format("%Y-%m-%d").to_string()),
            Self::Bool(b) => Some(b.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Self::Empty,
            Data::String(s) => Self::text(s),
            Data::Int(i) => Self::Number(Decimal::from(*i)),
            Data::Float(f) => Decimal::from_f64(*f)
                .map_or_else(|| Self::text(&f.to_string()), |d| Self::Number(d.normalize())),
            Data::Bool(b) => Self::Bool(*b),
            Data::DateTime(_) => data
                .as_datetime()
                .map_or(Self::Empty, Self::Date),
            Data::DateTimeIso(s) => parse_iso(s).map_or_else(|| Self::text(s), Self::Date),
            Data::DurationIso(s) => Self::text(s),
        }
    }
}

fn parse_iso(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_text_trims_and_maps_blank_to_empty() {
        assert_eq!(Cell::text("  Caja  "), Cell::Text("Caja".into()));
        assert_eq!(Cell::text("   "), Cell::Empty);
    }

    #[test]
    fn test_from_calamine_data() {
        assert_eq!(Cell::from(&Data::Int(42)), Cell::Number(dec!(42)));
        assert_eq!(Cell::from(&Data::Float(1250.5)), Cell::Number(dec!(1250.5)));
        assert_eq!(Cell::from(&Data::String(" 33 ".into())), Cell::Text("33".into()));
        assert_eq!(Cell::from(&Data::Empty), Cell::Empty);
        assert_eq!(Cell::from(&Data::Bool(true)), Cell::Bool(true));
    }

    #[test]
    fn test_from_iso_datetime() {
        let cell = Cell::from(&Data::DateTimeIso("2024-03-15".into()));
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(cell, Cell::Date(expected));
    }

    #[test]
    fn test_whole_numbers_render_without_fraction() {
        assert_eq!(Cell::Number(dec!(33.0)).to_text().as_deref(), Some("33"));
        assert_eq!(Cell::Number(dec!(12.50)).to_text().as_deref(), Some("12.5"));
        assert_eq!(Cell::Empty.to_text(), None);
    }
}
