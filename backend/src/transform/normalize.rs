//! Record normalization: untyped rows to validated rows.
//!
//! Identity fields are not recoverable, numeric fields are:
//!
//! - a row whose date cannot be parsed, or whose vehicle id is empty, is
//!   dropped (counted, never reported as an error);
//! - liters that cannot be parsed, or are negative, become `0.0` and the
//!   row is kept.
//!
//! Dates follow an explicit [`DateOrder`] policy. When both day/month
//! readings of a date are valid and differ, the row is kept with the policy
//! reading and its index is flagged as ambiguous.

use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::DateOrder;
use crate::models::{NormalizedRow, RawRow};

static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})(?:[T ].*)?$").expect("valid ISO date pattern")
});

static NUMERIC_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{4}|\d{2})(?:[T ].*)?$").expect("valid numeric date pattern")
});

static SERIAL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,7}(?:\.\d+)?$").expect("valid serial date pattern"));

static YEAR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("valid year pattern"));

/// Largest spreadsheet serial day (9999-12-31).
const MAX_SERIAL_DAY: f64 = 2_958_465.0;

/// Smallest serial day accepted from text cells (1927-05-18). Shorter
/// numbers in text are years or noise, not serials.
const MIN_TEXT_SERIAL_DAY: f64 = 10_000.0;

/// Two-digit years below this pivot are 20xx, the rest 19xx.
const TWO_DIGIT_YEAR_PIVOT: i32 = 69;

/// Why a row left the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    InvalidDate,
    MissingVehicleId,
}

/// A dropped row, by its 0-based index in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRow {
    pub row: usize,
    pub reason: DropReason,
}

/// A parsed date and whether the other day/month reading was also valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub ambiguous: bool,
}

impl ParsedDate {
    fn exact(date: NaiveDate) -> Self {
        Self {
            date,
            ambiguous: false,
        }
    }
}

/// Everything normalization learned about one input sequence.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub rows: Vec<NormalizedRow>,
    pub dropped: Vec<DroppedRow>,
    /// Input indices whose date was read with the policy but could be read
    /// the other way too.
    pub ambiguous_dates: Vec<usize>,
}

/// Counts surfaced to callers instead of per-row errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationStats {
    pub raw_rows: usize,
    pub kept_rows: usize,
    pub dropped_invalid_date: usize,
    pub dropped_missing_vehicle_id: usize,
    pub ambiguous_dates: usize,
    /// First few ambiguous input indices, for review.
    pub ambiguous_sample: Vec<usize>,
}

const AMBIGUOUS_SAMPLE_LEN: usize = 20;

impl NormalizeOutcome {
    pub fn stats(&self) -> NormalizationStats {
        let count = |reason: DropReason| self.dropped.iter().filter(|d| d.reason == reason).count();
        NormalizationStats {
            raw_rows: self.rows.len() + self.dropped.len(),
            kept_rows: self.rows.len(),
            dropped_invalid_date: count(DropReason::InvalidDate),
            dropped_missing_vehicle_id: count(DropReason::MissingVehicleId),
            ambiguous_dates: self.ambiguous_dates.len(),
            ambiguous_sample: self
                .ambiguous_dates
                .iter()
                .take(AMBIGUOUS_SAMPLE_LEN)
                .copied()
                .collect(),
        }
    }
}

/// Normalize a sequence of raw rows, keeping only valid ones.
pub fn normalize(rows: &[RawRow], order: DateOrder) -> Vec<NormalizedRow> {
    normalize_with_report(rows, order).rows
}

/// Normalize and keep track of dropped and ambiguous rows.
pub fn normalize_with_report(rows: &[RawRow], order: DateOrder) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();

    for (idx, raw) in rows.iter().enumerate() {
        let parsed = match parse_date(&raw.date, order) {
            Some(parsed) => parsed,
            None => {
                outcome.dropped.push(DroppedRow {
                    row: idx,
                    reason: DropReason::InvalidDate,
                });
                continue;
            }
        };

        let vehicle_id = match coerce_vehicle_id(&raw.vehicle_id) {
            Some(id) => id,
            None => {
                outcome.dropped.push(DroppedRow {
                    row: idx,
                    reason: DropReason::MissingVehicleId,
                });
                continue;
            }
        };

        if parsed.ambiguous {
            outcome.ambiguous_dates.push(idx);
        }

        outcome.rows.push(NormalizedRow {
            date: parsed.date,
            vehicle_id,
            liters_total: coerce_liters(&raw.liters),
            liters_outside: coerce_liters(&raw.outside_liters),
        });
    }

    outcome
}

/// Parse a date cell. Any time-of-day part is discarded.
///
/// Accepts `YYYY-MM-DD`, `D/M/YYYY` or `D/M/YY` (also `-` and `.`
/// separators), a bare `YYYY` and spreadsheet serial day numbers.
pub fn parse_date(value: &Value, order: DateOrder) -> Option<ParsedDate> {
    match value {
        Value::String(s) => parse_date_str(s.trim(), order),
        Value::Number(n) => n.as_f64().and_then(from_serial_day).map(ParsedDate::exact),
        _ => None,
    }
}

fn parse_date_str(s: &str, order: DateOrder) -> Option<ParsedDate> {
    if let Some(caps) = ISO_DATE.captures(s) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).map(ParsedDate::exact);
    }

    if let Some(caps) = NUMERIC_DATE.captures(s) {
        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[2].parse().ok()?;
        let year = expand_year(&caps[3])?;

        let day_first = NaiveDate::from_ymd_opt(year, second, first);
        let month_first = NaiveDate::from_ymd_opt(year, first, second);
        let (preferred, fallback) = match order {
            DateOrder::DayFirst => (day_first, month_first),
            DateOrder::MonthFirst => (month_first, day_first),
        };

        return match (preferred, fallback) {
            (Some(p), Some(f)) => Some(ParsedDate {
                date: p,
                ambiguous: p != f,
            }),
            (Some(p), None) => Some(ParsedDate::exact(p)),
            (None, Some(f)) => Some(ParsedDate::exact(f)),
            (None, None) => None,
        };
    }

    if YEAR_ONLY.is_match(s) {
        let year = s.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1).map(ParsedDate::exact);
    }

    if SERIAL_DATE.is_match(s) {
        return s
            .parse::<f64>()
            .ok()
            .filter(|serial| *serial >= MIN_TEXT_SERIAL_DAY)
            .and_then(from_serial_day)
            .map(ParsedDate::exact);
    }

    None
}

/// Four-digit years as written; two-digit years around the pivot.
fn expand_year(digits: &str) -> Option<i32> {
    let year: i32 = digits.parse().ok()?;
    match digits.len() {
        2 if year < TWO_DIGIT_YEAR_PIVOT => Some(2000 + year),
        2 => Some(1900 + year),
        _ => Some(year),
    }
}

/// Spreadsheet serial day (days since 1899-12-30), fraction ignored.
fn from_serial_day(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_SERIAL_DAY).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.trunc() as u64))
}

/// Textual form of the vehicle id, trimmed; `None` when empty or null.
pub fn coerce_vehicle_id(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Liters as a non-negative finite number, `0.0` when unusable.
pub fn coerce_liters(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    };

    match parsed {
        // + 0.0 turns -0.0 into 0.0
        Some(v) if v.is_finite() && v >= 0.0 => v + 0.0,
        _ => 0.0,
    }
}

fn parse_decimal(s: &str) -> Option<f64> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    if let Ok(v) = compact.parse::<f64>() {
        return Some(v);
    }
    // "12,5" written with a decimal comma
    if compact.matches(',').count() == 1 && !compact.contains('.') {
        return compact.replace(',', ".").parse().ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(date: Value, vehicle: Value, liters: Value, outside: Value) -> RawRow {
        RawRow::from_cells(vec![date, vehicle, liters, outside])
    }

    #[test]
    fn test_day_first_preferred() {
        let parsed = parse_date(&json!("01/03/2024"), DateOrder::DayFirst).unwrap();
        assert_eq!(parsed.date, ymd(2024, 3, 1));
        assert!(parsed.ambiguous);

        let parsed = parse_date(&json!("01/03/2024"), DateOrder::MonthFirst).unwrap();
        assert_eq!(parsed.date, ymd(2024, 1, 3));
    }

    #[test]
    fn test_unambiguous_dates() {
        let parsed = parse_date(&json!("25/12/2023"), DateOrder::DayFirst).unwrap();
        assert_eq!(parsed.date, ymd(2023, 12, 25));
        assert!(!parsed.ambiguous);

        // Same day and month reads the same either way
        let parsed = parse_date(&json!("05.05.2024"), DateOrder::DayFirst).unwrap();
        assert!(!parsed.ambiguous);
    }

    #[test]
    fn test_falls_back_to_other_order() {
        let parsed = parse_date(&json!("03/25/2024"), DateOrder::DayFirst).unwrap();
        assert_eq!(parsed.date, ymd(2024, 3, 25));
        assert!(!parsed.ambiguous);
    }

    #[test]
    fn test_iso_and_time_parts() {
        assert_eq!(
            parse_date(&json!("2024-03-01"), DateOrder::DayFirst).unwrap().date,
            ymd(2024, 3, 1)
        );
        assert_eq!(
            parse_date(&json!("2024-03-01T08:30:00"), DateOrder::DayFirst).unwrap().date,
            ymd(2024, 3, 1)
        );
        assert_eq!(
            parse_date(&json!(" 02/03/2024 14:05 "), DateOrder::DayFirst).unwrap().date,
            ymd(2024, 3, 2)
        );
    }

    #[test]
    fn test_serial_days() {
        assert_eq!(
            parse_date(&json!(45352), DateOrder::DayFirst).unwrap().date,
            ymd(2024, 3, 1)
        );
        assert_eq!(
            parse_date(&json!("45352.75"), DateOrder::DayFirst).unwrap().date,
            ymd(2024, 3, 1)
        );
        assert!(parse_date(&json!(0), DateOrder::DayFirst).is_none());
        assert!(parse_date(&json!(-4), DateOrder::DayFirst).is_none());
    }

    #[test]
    fn test_short_numeric_text_is_not_a_serial() {
        assert_eq!(
            parse_date(&json!("2024"), DateOrder::DayFirst).unwrap().date,
            ymd(2024, 1, 1)
        );
        assert!(parse_date(&json!("5"), DateOrder::DayFirst).is_none());
        assert!(parse_date(&json!("9999.5"), DateOrder::DayFirst).is_none());
        // Number cells keep the full serial range
        assert_eq!(
            parse_date(&json!(5), DateOrder::DayFirst).unwrap().date,
            ymd(1900, 1, 4)
        );
    }

    #[test]
    fn test_two_digit_years() {
        let parsed = parse_date(&json!("01/03/24"), DateOrder::DayFirst).unwrap();
        assert_eq!(parsed.date, ymd(2024, 3, 1));
        assert!(parsed.ambiguous);

        assert_eq!(
            parse_date(&json!("25-12-68"), DateOrder::DayFirst).unwrap().date,
            ymd(2068, 12, 25)
        );
        assert_eq!(
            parse_date(&json!("25.12.69"), DateOrder::DayFirst).unwrap().date,
            ymd(1969, 12, 25)
        );
        assert_eq!(
            parse_date(&json!("03/25/24 08:00"), DateOrder::DayFirst).unwrap().date,
            ymd(2024, 3, 25)
        );

        let rows = vec![row(json!("01/03/24"), json!("51A-123"), json!(10), json!(0))];
        let stats = normalize_with_report(&rows, DateOrder::DayFirst).stats();
        assert_eq!(stats.kept_rows, 1);
        assert_eq!(stats.dropped_invalid_date, 0);
    }

    #[test]
    fn test_invalid_dates() {
        for value in [json!("32/13/2024"), json!("not a date"), json!(""), json!(null), json!(true)] {
            assert!(parse_date(&value, DateOrder::DayFirst).is_none(), "{:?}", value);
        }
        assert!(parse_date(&json!("2024-02-30"), DateOrder::DayFirst).is_none());
    }

    #[test]
    fn test_vehicle_id_coercion() {
        assert_eq!(coerce_vehicle_id(&json!("  51A-123 ")), Some("51A-123".to_string()));
        assert_eq!(coerce_vehicle_id(&json!(1234)), Some("1234".to_string()));
        assert_eq!(coerce_vehicle_id(&json!("   ")), None);
        assert_eq!(coerce_vehicle_id(&json!(null)), None);
    }

    #[test]
    fn test_liters_coercion() {
        assert_eq!(coerce_liters(&json!(100)), 100.0);
        assert_eq!(coerce_liters(&json!("42.5")), 42.5);
        assert_eq!(coerce_liters(&json!("12,5")), 12.5);
        assert_eq!(coerce_liters(&json!(" 1 000 ")), 1000.0);
        assert_eq!(coerce_liters(&json!("abc")), 0.0);
        assert_eq!(coerce_liters(&json!("")), 0.0);
        assert_eq!(coerce_liters(&json!(null)), 0.0);
        assert_eq!(coerce_liters(&json!("NaN")), 0.0);
        assert_eq!(coerce_liters(&json!(-5)), 0.0);
    }

    #[test]
    fn test_negative_zero_liters_become_positive_zero() {
        for value in [json!("-0"), json!(-0.0), json!("-0,0")] {
            let liters = coerce_liters(&value);
            assert_eq!(liters, 0.0);
            assert!(liters.is_sign_positive(), "{:?}", value);
        }
    }

    #[test]
    fn test_row_drop_is_exact() {
        let rows = vec![
            row(json!("01/03/2024"), json!("51A-123"), json!(100), json!(10)),
            row(json!("garbage"), json!("51A-123"), json!(5), json!(0)),
            row(json!("02/03/2024"), json!(""), json!(5), json!(0)),
            row(json!("03/03/2024"), json!("50A01990-B"), json!("oops"), json!(null)),
        ];

        let outcome = normalize_with_report(&rows, DateOrder::DayFirst);

        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0].vehicle_id, "51A-123");
        assert_eq!(outcome.rows[1].vehicle_id, "50A01990-B");
        assert_eq!(outcome.rows[1].liters_total, 0.0);
        assert_eq!(
            outcome.dropped,
            vec![
                DroppedRow {
                    row: 1,
                    reason: DropReason::InvalidDate
                },
                DroppedRow {
                    row: 2,
                    reason: DropReason::MissingVehicleId
                },
            ]
        );
    }

    #[test]
    fn test_stats() {
        let rows = vec![
            row(json!("01/03/2024"), json!("A"), json!(1), json!(0)),
            row(json!("25/03/2024"), json!("B"), json!(1), json!(0)),
            row(json!(null), json!("C"), json!(1), json!(0)),
        ];

        let stats = normalize_with_report(&rows, DateOrder::DayFirst).stats();

        assert_eq!(stats.raw_rows, 3);
        assert_eq!(stats.kept_rows, 2);
        assert_eq!(stats.dropped_invalid_date, 1);
        assert_eq!(stats.dropped_missing_vehicle_id, 0);
        assert_eq!(stats.ambiguous_dates, 1);
        assert_eq!(stats.ambiguous_sample, vec![0]);
    }

    #[test]
    fn test_referentially_transparent() {
        let rows = vec![row(json!("01/03/2024"), json!("A"), json!("7,25"), json!(1))];
        assert_eq!(
            normalize(&rows, DateOrder::DayFirst),
            normalize(&rows, DateOrder::DayFirst)
        );
    }
}
