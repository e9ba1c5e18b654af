//! Accounting period expressed as year and month (`YYYYMM`).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced when parsing a `YYYYMM` period.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodParseError {
    /// Input is not exactly six ASCII digits.
    #[error("period '{0}' must have the form YYYYMM")]
    Format(String),

    /// Month component outside 1..=12.
    #[error("period '{0}' has an invalid month")]
    Month(String),
}

/// A calendar month used to key closures, uploads and cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Creates a period, returning `None` when the month is out of range.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Period year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Period month (1-12).
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// First day of the period.
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Returns true if the date falls inside this period.
    #[must_use]
    pub fn contains(self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PeriodParseError::Format(s.to_string()));
        }
        let year: i32 = s[..4]
            .parse()
            .map_err(|_| PeriodParseError::Format(s.to_string()))?;
        let month: u32 = s[4..]
            .parse()
            .map_err(|_| PeriodParseError::Format(s.to_string()))?;
        Self::new(year, month).ok_or_else(|| PeriodParseError::Month(s.to_string()))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_and_display() {
        let period: Period = "202403".parse().unwrap();
        assert_eq!(period.year(), 2024);
        assert_eq!(period.month(), 3);
        assert_eq!(period.to_string(), "202403");
    }

    #[rstest]
    #[case("2024")]
    #[case("2024-03")]
    #[case("20240a")]
    #[case("")]
    fn test_parse_rejects_bad_format(#[case] input: &str) {
        assert!(matches!(
            input.parse::<Period>(),
            Err(PeriodParseError::Format(_))
        ));
    }

    #[rstest]
    #[case("202400")]
    #[case("202413")]
    fn test_parse_rejects_bad_month(#[case] input: &str) {
        assert!(matches!(
            input.parse::<Period>(),
            Err(PeriodParseError::Month(_))
        ));
    }

    #[test]
    fn test_ordering_is_chronological() {
        let a: Period = "202312".parse().unwrap();
        let b: Period = "202401".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_contains() {
        let period: Period = "202402".parse().unwrap();
        assert!(period.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!period.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert_eq!(period.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_serde_as_string() {
        let period: Period = "202511".parse().unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"202511\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
    }
}
