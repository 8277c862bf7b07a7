//! Cell-level coercion shared by all input formats

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// A single table cell before interpretation
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];

/// Parse a locale-formatted number.
///
/// A decimal comma is accepted (`"12,5"` → 12.5); spaces and non-breaking
/// spaces used as thousands separators are stripped. Non-finite results are
/// rejected.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) if v.is_finite() => Some(*v),
            Cell::Text(s) => parse_numeric(s),
            _ => None,
        }
    }

    /// Numbers are read as epoch milliseconds
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            Cell::Text(s) => parse_datetime(s),
            Cell::Number(v) if v.is_finite() => {
                DateTime::from_timestamp_millis(*v as i64).map(|dt| dt.naive_utc())
            }
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Cell::Number(v) => Some(v.to_string()),
            Cell::DateTime(dt) => Some(dt.to_string()),
            Cell::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("12,5", Some(12.5))]
    #[case(" 7.25 ", Some(7.25))]
    #[case("1 234,5", Some(1234.5))]
    #[case("-3", Some(-3.0))]
    #[case("", None)]
    #[case("n/a", None)]
    #[case("NaN", None)]
    fn test_parse_numeric(#[case] raw: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_numeric(raw), expected);
    }

    #[rstest]
    #[case("2024-03-01 13:00:00")]
    #[case("2024-03-01T13:00:00")]
    #[case("2024-03-01 13:00")]
    #[case("01.03.2024 13:00")]
    #[case("2024-03-01T13:00:00+00:00")]
    fn test_parse_datetime_formats(#[case] raw: &str) {
        let dt = parse_datetime(raw).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2024, 3, 1, 13));
    }

    #[test]
    fn test_parse_date_only() {
        let dt = parse_datetime("2024-03-01").unwrap();
        assert_eq!(dt.hour(), 0);
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn test_epoch_millis_date() {
        let cell = Cell::Number(1_704_067_200_000.0);
        let dt = cell.as_datetime().unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 1));
    }

    proptest! {
        #[test]
        fn decimal_comma_matches_decimal_point(int in -100_000i64..100_000, frac in 0u32..1000) {
            let point = format!("{int}.{frac:03}");
            let comma = format!("{int},{frac:03}");
            prop_assert_eq!(parse_numeric(&point), parse_numeric(&comma));
        }
    }
}
