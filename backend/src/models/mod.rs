//! Domain models for the fuel log pipeline.
//!
//! - [`RawRow`] - untyped positional input row
//! - [`NormalizedRow`] - validated row before derivation
//! - [`Record`] - canonical refueling event with derived fields
//! - [`FuelCategory`] - Gasoline or Diesel fleet
//! - [`AggregationTable`] - named, ordered, fixed-schema result table

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Raw Input
// =============================================================================

/// One untyped input row, in the fixed positional order
/// `(date, vehicle_id, liters, outside_liters)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub date: Value,
    pub vehicle_id: Value,
    pub liters: Value,
    pub outside_liters: Value,
}

impl RawRow {
    /// Build a row from positional cells.
    ///
    /// Missing trailing cells become `null`; cells past the fourth are ignored.
    pub fn from_cells<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut cells = cells.into_iter();
        let mut next = || cells.next().unwrap_or(Value::Null);
        Self {
            date: next(),
            vehicle_id: next(),
            liters: next(),
            outside_liters: next(),
        }
    }
}

// =============================================================================
// Fuel Category
// =============================================================================

/// Fleet a vehicle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FuelCategory {
    Gasoline,
    Diesel,
}

impl FuelCategory {
    pub const ALL: [FuelCategory; 2] = [FuelCategory::Gasoline, FuelCategory::Diesel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gasoline => "Gasoline",
            Self::Diesel => "Diesel",
        }
    }
}

impl fmt::Display for FuelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuelCategory {
    type Err = String;

    /// Accepts English names and the Vietnamese labels of the source sheets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gasoline" | "petrol" | "xang" | "xăng" => Ok(Self::Gasoline),
            "diesel" | "dau" | "dầu" => Ok(Self::Diesel),
            other => Err(format!("unknown fuel category '{}'", other)),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A row that passed normalization, before derived fields are computed.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub date: NaiveDate,
    pub vehicle_id: String,
    pub liters_total: f64,
    pub liters_outside: f64,
}

/// One normalized refueling event.
///
/// Created once per pipeline run and never mutated afterwards; filtering and
/// aggregation always produce new collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub date: NaiveDate,
    pub vehicle_id: String,
    pub liters_total: f64,
    pub liters_outside: f64,
    /// `liters_total - liters_outside`; negative when outside exceeds total.
    pub liters_in_system: f64,
    pub fuel_category: FuelCategory,
    /// `YYYY-MM`
    pub period_month: String,
    /// ISO week, `YYYY-Www`
    pub period_week: String,
    #[serde(serialize_with = "serialize_weekday")]
    pub weekday: Weekday,
}

/// Monday-first ordering used by the weekday projection.
pub const WEEKDAY_ORDER: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// English day name.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub(crate) fn serialize_weekday<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(weekday_name(*day))
}

// =============================================================================
// Aggregation Table
// =============================================================================

/// A named projection: ordered rows sharing one column schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationTable<R> {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub rows: Vec<R>,
}

impl<R> AggregationTable<R> {
    pub fn new(name: &'static str, columns: &'static [&'static str], rows: Vec<R>) -> Self {
        Self { name, columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }
}

/// Round to two decimals. Applied when flattening, never before summing.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_row_from_short_cells() {
        let row = RawRow::from_cells(vec![json!("01/03/2024"), json!("51A-123")]);
        assert_eq!(row.date, json!("01/03/2024"));
        assert_eq!(row.vehicle_id, json!("51A-123"));
        assert!(row.liters.is_null());
        assert!(row.outside_liters.is_null());
    }

    #[test]
    fn test_raw_row_ignores_extra_cells() {
        let row = RawRow::from_cells(vec![json!("d"), json!("v"), json!(1), json!(2), json!("extra")]);
        assert_eq!(row.outside_liters, json!(2));
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Diesel".parse::<FuelCategory>(), Ok(FuelCategory::Diesel));
        assert_eq!(" gasoline ".parse::<FuelCategory>(), Ok(FuelCategory::Gasoline));
        assert_eq!("Dầu".parse::<FuelCategory>(), Ok(FuelCategory::Diesel));
        assert_eq!("Xăng".parse::<FuelCategory>(), Ok(FuelCategory::Gasoline));
        assert!("kerosene".parse::<FuelCategory>().is_err());
    }

    #[test]
    fn test_category_ordering() {
        assert!(FuelCategory::Gasoline < FuelCategory::Diesel);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round2(33.333_333), 33.33);
        assert_eq!(round2(-2.456), -2.46);
    }

    #[test]
    fn test_weekday_serializes_as_name() {
        let record = Record {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            vehicle_id: "51A-123".into(),
            liters_total: 10.0,
            liters_outside: 0.0,
            liters_in_system: 10.0,
            fuel_category: FuelCategory::Gasoline,
            period_month: "2024-03".into(),
            period_week: "2024-W09".into(),
            weekday: Weekday::Fri,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["weekday"], "Friday");
        assert_eq!(value["date"], "2024-03-01");
        assert_eq!(value["fuel_category"], "Gasoline");
    }
}
