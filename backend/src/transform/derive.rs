//! Derived fields: in-system liters, fuel category and calendar keys.

use chrono::{Datelike, NaiveDate};

use crate::models::{FuelCategory, NormalizedRow, Record};

/// Assigns vehicles to a fleet by a reserved identifier fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetClassifier {
    diesel_tag: String,
}

impl FleetClassifier {
    pub fn new(diesel_tag: impl Into<String>) -> Self {
        Self {
            diesel_tag: diesel_tag.into(),
        }
    }

    /// `Diesel` iff the id contains the tag (case-sensitive, anywhere).
    /// An empty tag matches nothing.
    pub fn classify(&self, vehicle_id: &str) -> FuelCategory {
        if !self.diesel_tag.is_empty() && vehicle_id.contains(&self.diesel_tag) {
            FuelCategory::Diesel
        } else {
            FuelCategory::Gasoline
        }
    }
}

/// Complete a normalized row with its derived fields.
pub fn derive(row: NormalizedRow, classifier: &FleetClassifier) -> Record {
    let fuel_category = classifier.classify(&row.vehicle_id);
    Record {
        liters_in_system: row.liters_total - row.liters_outside,
        fuel_category,
        period_month: month_key(row.date),
        period_week: week_key(row.date),
        weekday: row.date.weekday(),
        date: row.date,
        vehicle_id: row.vehicle_id,
        liters_total: row.liters_total,
        liters_outside: row.liters_outside,
    }
}

pub fn derive_all(rows: Vec<NormalizedRow>, classifier: &FleetClassifier) -> Vec<Record> {
    rows.into_iter().map(|row| derive(row, classifier)).collect()
}

/// `YYYY-MM`
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// ISO week label `YYYY-Www`, using the ISO week-numbering year.
pub fn week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::weekday_name;
    use chrono::Weekday;

    fn row(date: (i32, u32, u32), vehicle: &str, total: f64, outside: f64) -> NormalizedRow {
        NormalizedRow {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            vehicle_id: vehicle.to_string(),
            liters_total: total,
            liters_outside: outside,
        }
    }

    #[test]
    fn test_classification() {
        let classifier = FleetClassifier::new("50A01990");
        assert_eq!(classifier.classify("50A01990-B"), FuelCategory::Diesel);
        assert_eq!(classifier.classify("X-50A01990"), FuelCategory::Diesel);
        assert_eq!(classifier.classify("50a01990"), FuelCategory::Gasoline);
        assert_eq!(classifier.classify("51A-123"), FuelCategory::Gasoline);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = FleetClassifier::new("50A01990");
        for id in ["50A01990-B", "51A-123", ""] {
            assert_eq!(classifier.classify(id), classifier.classify(id));
        }
    }

    #[test]
    fn test_empty_tag_matches_nothing() {
        let classifier = FleetClassifier::new("");
        assert_eq!(classifier.classify("50A01990-B"), FuelCategory::Gasoline);
    }

    #[test]
    fn test_in_system_liters_not_clamped() {
        let classifier = FleetClassifier::new("50A01990");
        let record = derive(row((2024, 3, 1), "51A-123", 20.0, 35.5), &classifier);
        assert_eq!(record.liters_in_system, -15.5);

        let record = derive(row((2024, 3, 1), "51A-123", 100.0, 10.0), &classifier);
        assert_eq!(record.liters_in_system, 90.0);
    }

    #[test]
    fn test_period_keys() {
        let classifier = FleetClassifier::new("50A01990");
        let record = derive(row((2024, 3, 1), "51A-123", 1.0, 0.0), &classifier);
        assert_eq!(record.period_month, "2024-03");
        assert_eq!(record.period_week, "2024-W09");
        assert_eq!(record.weekday, Weekday::Fri);
        assert_eq!(weekday_name(record.weekday), "Friday");
    }

    #[test]
    fn test_iso_week_year_boundaries() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(week_key(date(2023, 1, 1)), "2022-W52");
        assert_eq!(week_key(date(2024, 12, 30)), "2025-W01");
        assert_eq!(week_key(date(2021, 1, 3)), "2020-W53");
        assert_eq!(month_key(date(2023, 1, 1)), "2023-01");
    }
}
