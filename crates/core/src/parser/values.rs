//! Cell value parsing for dates and amounts.

use std::str::FromStr;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

use crate::reader::Cell;

/// A date cell that is not a date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date '{0}'")]
pub struct DateError(pub String);

/// An amount cell that is not a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid amount '{0}'")]
pub struct AmountError(pub String);

/// Largest Excel serial date (9999-12-31).
const MAX_EXCEL_SERIAL: i64 = 2_958_465;

/// Parses a date cell.
///
/// Accepts native dates, Excel serial numbers and the text forms
/// `dd/mm/yyyy`, `dd-mm-yyyy`, `yyyy-mm-dd` and `dd/mm/yy`. A trailing time
/// component in text is ignored.
pub fn parse_date(cell: &Cell) -> Result<NaiveDate, DateError> {
    match cell {
        Cell::Date(dt) => Ok(dt.date()),
        Cell::Number(n) => excel_serial(*n).ok_or_else(|| DateError(n.to_string())),
        Cell::Text(s) => parse_date_text(s).ok_or_else(|| DateError(s.clone())),
        Cell::Empty => Err(DateError(String::new())),
        Cell::Bool(b) => Err(DateError(b.to_string())),
    }
}

fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let token = raw.split_whitespace().next()?;
    let segments: Vec<&str> = token.split(['/', '-']).collect();
    if segments.len() != 3 {
        return None;
    }

    let formats: &[&str] = if segments[0].len() == 4 {
        &["%Y-%m-%d"]
    } else if segments[2].len() == 2 {
        &["%d/%m/%y", "%d-%m-%y"]
    } else {
        &["%d/%m/%Y", "%d-%m-%Y"]
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
}

fn excel_serial(n: Decimal) -> Option<NaiveDate> {
    if !n.fract().is_zero() {
        return None;
    }
    let days = n.to_i64()?;
    if !(1..=MAX_EXCEL_SERIAL).contains(&days) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(u64::try_from(days).ok()?))
}

/// Parses an amount cell; blank cells are zero.
///
/// Text may carry a currency sign, thousands separators (`.` or `,`) and a
/// parenthesised or leading-minus negative. When both separators appear the
/// rightmost one is the decimal mark. A single separator followed by exactly
/// three digits is read as a thousands separator.
pub fn parse_amount(cell: &Cell) -> Result<Decimal, AmountError> {
    match cell {
        Cell::Empty => Ok(Decimal::ZERO),
        Cell::Number(n) => Ok(*n),
        Cell::Text(s) => parse_amount_text(s).ok_or_else(|| AmountError(s.clone())),
        Cell::Date(dt) => Err(AmountError(dt.to_string())),
        Cell::Bool(b) => Err(AmountError(b.to_string())),
    }
}

fn parse_amount_text(raw: &str) -> Option<Decimal> {
    let mut text: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$')
        .collect();
    if text.is_empty() || text == "-" {
        return Some(Decimal::ZERO);
    }

    let mut negative = false;
    if text.starts_with('(') && text.ends_with(')') {
        negative = true;
        text = text[1..text.len() - 1].to_string();
    }
    if let Some(rest) = text.strip_prefix('-') {
        negative = !negative;
        text = rest.to_string();
    }
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let normalized = normalize_separators(&text)?;
    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

fn normalize_separators(text: &str) -> Option<String> {
    let last_dot = text.rfind('.');
    let last_comma = text.rfind(',');

    let decimal_mark = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => Some(if dot > comma { '.' } else { ',' }),
        (Some(_), None) => single_separator_decimal(text, '.'),
        (None, Some(_)) => single_separator_decimal(text, ','),
        (None, None) => None,
    };

    let mut out = String::with_capacity(text.len());
    let mut seen_decimal = false;
    for (idx, c) in text.char_indices() {
        match c {
            '0'..='9' => out.push(c),
            _ if Some(c) == decimal_mark && Some(idx) == text.rfind(c) => {
                if seen_decimal {
                    return None;
                }
                seen_decimal = true;
                out.push('.');
            }
            _ if Some(c) == decimal_mark => return None,
            _ => {}
        }
    }
    (!out.is_empty()).then_some(out)
}

/// With only one kind of separator: repeated or followed by three digits
/// means thousands, otherwise decimal.
fn single_separator_decimal(text: &str, sep: char) -> Option<char> {
    if text.matches(sep).count() > 1 {
        return None;
    }
    let tail = text.rsplit(sep).next().unwrap_or_default();
    if tail.len() == 3 { None } else { Some(sep) }
}
