//! Aggregation engine.
//!
//! Aggregation runs in two stages that are tested separately:
//!
//! ```text
//! records ──group_by──▶ [(key, GroupMetrics)] ──projection──▶ AggregationTable<Row>
//!            (full precision, ascending key)      (rounded to 2 decimals)
//! ```
//!
//! Every projection accepts an empty record slice and returns an empty
//! table, except [`weekday_totals`] which always has seven rows.

use chrono::{NaiveDate, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    round2, serialize_weekday, AggregationTable, FuelCategory, Record, WEEKDAY_ORDER,
};

// =============================================================================
// Grouping stage
// =============================================================================

/// Running totals for one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupMetrics {
    pub event_count: usize,
    pub liters_total: f64,
    pub liters_outside: f64,
    pub liters_in_system: f64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub vehicles: BTreeSet<String>,
}

impl GroupMetrics {
    pub fn add(&mut self, record: &Record) {
        self.event_count += 1;
        self.liters_total += record.liters_total;
        self.liters_outside += record.liters_outside;
        self.liters_in_system += record.liters_in_system;
        self.first_date = Some(self.first_date.map_or(record.date, |d| d.min(record.date)));
        self.last_date = Some(self.last_date.map_or(record.date, |d| d.max(record.date)));
        if !self.vehicles.contains(&record.vehicle_id) {
            self.vehicles.insert(record.vehicle_id.clone());
        }
    }

    /// Mean liters per event; `0.0` for an empty group.
    pub fn mean_liters(&self) -> f64 {
        if self.event_count == 0 {
            0.0
        } else {
            self.liters_total / self.event_count as f64
        }
    }
}

/// Group records by `key`, in ascending key order.
pub fn group_by<K, F>(records: &[Record], key: F) -> Vec<(K, GroupMetrics)>
where
    K: Ord,
    F: Fn(&Record) -> K,
{
    let mut groups: BTreeMap<K, GroupMetrics> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().add(record);
    }
    groups.into_iter().collect()
}

type VehicleKey = (String, FuelCategory);

fn vehicle_key(record: &Record) -> VehicleKey {
    (record.vehicle_id.clone(), record.fuel_category)
}

/// Stable sort, largest total first. Equal totals keep grouping order.
fn sort_by_total_desc<K>(groups: &mut [(K, GroupMetrics)]) {
    groups.sort_by(|a, b| b.1.liters_total.total_cmp(&a.1.liters_total));
}

// =============================================================================
// Per-vehicle summary
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSummaryRow {
    pub vehicle_id: String,
    pub fuel_category: FuelCategory,
    pub liters_total: f64,
    pub liters_per_event: f64,
    pub event_count: usize,
    pub liters_outside: f64,
    pub liters_in_system: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

pub const VEHICLE_SUMMARY_COLUMNS: &[&str] = &[
    "vehicle_id",
    "fuel_category",
    "liters_total",
    "liters_per_event",
    "event_count",
    "liters_outside",
    "liters_in_system",
    "first_date",
    "last_date",
];

/// One row per `(vehicle, category)`, largest consumer first.
pub fn vehicle_summary(records: &[Record]) -> AggregationTable<VehicleSummaryRow> {
    let mut groups = group_by(records, vehicle_key);
    sort_by_total_desc(&mut groups);

    let rows = groups
        .into_iter()
        .filter_map(|((vehicle_id, fuel_category), m)| {
            Some(VehicleSummaryRow {
                vehicle_id,
                fuel_category,
                liters_total: round2(m.liters_total),
                liters_per_event: round2(m.mean_liters()),
                event_count: m.event_count,
                liters_outside: round2(m.liters_outside),
                liters_in_system: round2(m.liters_in_system),
                first_date: m.first_date?,
                last_date: m.last_date?,
            })
        })
        .collect();

    AggregationTable::new("vehicle_summary", VEHICLE_SUMMARY_COLUMNS, rows)
}

// =============================================================================
// Per-category summary
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummaryRow {
    pub fuel_category: FuelCategory,
    pub liters_total: f64,
    pub liters_per_event: f64,
    pub event_count: usize,
    pub liters_outside: f64,
    pub vehicle_count: usize,
}

pub const CATEGORY_SUMMARY_COLUMNS: &[&str] = &[
    "fuel_category",
    "liters_total",
    "liters_per_event",
    "event_count",
    "liters_outside",
    "vehicle_count",
];

pub fn category_summary(records: &[Record]) -> AggregationTable<CategorySummaryRow> {
    let rows = group_by(records, |r| r.fuel_category)
        .into_iter()
        .map(|(fuel_category, m)| CategorySummaryRow {
            fuel_category,
            liters_total: round2(m.liters_total),
            liters_per_event: round2(m.mean_liters()),
            event_count: m.event_count,
            liters_outside: round2(m.liters_outside),
            vehicle_count: m.vehicles.len(),
        })
        .collect();

    AggregationTable::new("category_summary", CATEGORY_SUMMARY_COLUMNS, rows)
}

// =============================================================================
// Time-period projections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRow {
    pub month: String,
    pub liters_total: f64,
    pub liters_in_system: f64,
    pub liters_outside: f64,
}

pub const MONTHLY_COLUMNS: &[&str] = &["month", "liters_total", "liters_in_system", "liters_outside"];

pub fn monthly_totals(records: &[Record]) -> AggregationTable<MonthlyRow> {
    let rows = group_by(records, |r| r.period_month.clone())
        .into_iter()
        .map(|(month, m)| MonthlyRow {
            month,
            liters_total: round2(m.liters_total),
            liters_in_system: round2(m.liters_in_system),
            liters_outside: round2(m.liters_outside),
        })
        .collect();

    AggregationTable::new("monthly_totals", MONTHLY_COLUMNS, rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCategoryRow {
    pub month: String,
    pub fuel_category: FuelCategory,
    pub liters_total: f64,
}

pub const MONTHLY_CATEGORY_COLUMNS: &[&str] = &["month", "fuel_category", "liters_total"];

pub fn monthly_by_category(records: &[Record]) -> AggregationTable<MonthlyCategoryRow> {
    let rows = group_by(records, |r| (r.period_month.clone(), r.fuel_category))
        .into_iter()
        .map(|((month, fuel_category), m)| MonthlyCategoryRow {
            month,
            fuel_category,
            liters_total: round2(m.liters_total),
        })
        .collect();

    AggregationTable::new("monthly_by_category", MONTHLY_CATEGORY_COLUMNS, rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub liters_total: f64,
}

pub const DAILY_COLUMNS: &[&str] = &["date", "liters_total"];

pub fn daily_totals(records: &[Record]) -> AggregationTable<DailyRow> {
    let rows = group_by(records, |r| r.date)
        .into_iter()
        .map(|(date, m)| DailyRow {
            date,
            liters_total: round2(m.liters_total),
        })
        .collect();

    AggregationTable::new("daily_totals", DAILY_COLUMNS, rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayRow {
    #[serde(serialize_with = "serialize_weekday")]
    pub weekday: Weekday,
    pub liters_total: f64,
    pub event_count: usize,
}

pub const WEEKDAY_COLUMNS: &[&str] = &["weekday", "liters_total", "event_count"];

/// Always seven rows, Monday to Sunday; days without records are zero.
pub fn weekday_totals(records: &[Record]) -> AggregationTable<WeekdayRow> {
    let groups: BTreeMap<u32, GroupMetrics> = group_by(records, |r| r.weekday.num_days_from_monday())
        .into_iter()
        .collect();

    let rows = WEEKDAY_ORDER
        .iter()
        .map(|&weekday| {
            let metrics = groups.get(&weekday.num_days_from_monday());
            WeekdayRow {
                weekday,
                liters_total: metrics.map_or(0.0, |m| round2(m.liters_total)),
                event_count: metrics.map_or(0, |m| m.event_count),
            }
        })
        .collect();

    AggregationTable::new("weekday_totals", WEEKDAY_COLUMNS, rows)
}

// =============================================================================
// Top consumers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopConsumerRow {
    pub rank: usize,
    pub vehicle_id: String,
    pub fuel_category: FuelCategory,
    pub liters_total: f64,
}

pub const TOP_CONSUMER_COLUMNS: &[&str] = &["rank", "vehicle_id", "fuel_category", "liters_total"];

/// The `n` largest `(vehicle, category)` totals. Truncation is positional:
/// a tie with the n-th entry past the cutoff is dropped.
pub fn top_consumers(records: &[Record], n: usize) -> AggregationTable<TopConsumerRow> {
    let mut groups = group_by(records, vehicle_key);
    sort_by_total_desc(&mut groups);

    let rows = groups
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, ((vehicle_id, fuel_category), m))| TopConsumerRow {
            rank: i + 1,
            vehicle_id,
            fuel_category,
            liters_total: round2(m.liters_total),
        })
        .collect();

    AggregationTable::new("top_consumers", TOP_CONSUMER_COLUMNS, rows)
}

// =============================================================================
// Overview
// =============================================================================

/// Headline figures for a record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub liters_total: f64,
    pub liters_gasoline: f64,
    pub liters_diesel: f64,
    pub liters_outside: f64,
    pub vehicle_count: usize,
    pub event_count: usize,
}

pub fn overview(records: &[Record]) -> Overview {
    let mut all = GroupMetrics::default();
    let (mut gasoline, mut diesel) = (0.0, 0.0);

    for record in records {
        all.add(record);
        match record.fuel_category {
            FuelCategory::Gasoline => gasoline += record.liters_total,
            FuelCategory::Diesel => diesel += record.liters_total,
        }
    }

    Overview {
        liters_total: round2(all.liters_total),
        liters_gasoline: round2(gasoline),
        liters_diesel: round2(diesel),
        liters_outside: round2(all.liters_outside),
        vehicle_count: all.vehicles.len(),
        event_count: all.event_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NormalizedRow;
    use crate::transform::derive::{derive_all, FleetClassifier};

    fn records(rows: &[((i32, u32, u32), &str, f64, f64)]) -> Vec<Record> {
        let normalized = rows
            .iter()
            .map(|&((y, m, d), v, t, o)| NormalizedRow {
                date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                vehicle_id: v.to_string(),
                liters_total: t,
                liters_outside: o,
            })
            .collect();
        derive_all(normalized, &FleetClassifier::new("50A01990"))
    }

    fn example() -> Vec<Record> {
        records(&[
            ((2024, 3, 1), "51A-123", 100.0, 10.0),
            ((2024, 3, 2), "50A01990-B", 80.0, 0.0),
        ])
    }

    fn fleet() -> Vec<Record> {
        records(&[
            ((2024, 3, 1), "51A-123", 100.0, 10.0),
            ((2024, 3, 2), "50A01990-B", 80.0, 0.0),
            ((2024, 3, 4), "51A-123", 50.5, 0.0),
            ((2024, 3, 4), "51C-777", 20.0, 25.0),
            ((2024, 4, 2), "51C-777", 60.25, 0.0),
            ((2024, 4, 7), "50A01990-C", 33.333, 3.0),
        ])
    }

    #[test]
    fn test_group_by_is_key_ordered() {
        let groups = group_by(&fleet(), |r| r.vehicle_id.clone());
        let keys: Vec<_> = groups.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["50A01990-B", "50A01990-C", "51A-123", "51C-777"]);

        let (_, metrics) = &groups[2];
        assert_eq!(metrics.event_count, 2);
        assert_eq!(metrics.liters_total, 150.5);
        assert_eq!(metrics.first_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(metrics.last_date, NaiveDate::from_ymd_opt(2024, 3, 4));
    }

    #[test]
    fn test_category_summary_example() {
        let table = category_summary(&example());
        assert_eq!(table.len(), 2);

        let gasoline = &table.rows[0];
        assert_eq!(gasoline.fuel_category, FuelCategory::Gasoline);
        assert_eq!(gasoline.liters_total, 100.0);
        assert_eq!(gasoline.event_count, 1);
        assert_eq!(gasoline.liters_outside, 10.0);

        let diesel = &table.rows[1];
        assert_eq!(diesel.fuel_category, FuelCategory::Diesel);
        assert_eq!(diesel.liters_total, 80.0);
        assert_eq!(diesel.vehicle_count, 1);
    }

    #[test]
    fn test_vehicle_summary_sorted_and_rounded() {
        let table = vehicle_summary(&fleet());
        let ids: Vec<_> = table.iter().map(|r| r.vehicle_id.as_str()).collect();
        assert_eq!(ids, vec!["51A-123", "51C-777", "50A01990-B", "50A01990-C"]);

        let top = &table.rows[0];
        assert_eq!(top.liters_total, 150.5);
        assert_eq!(top.liters_per_event, 75.25);
        assert_eq!(top.event_count, 2);
        assert_eq!(top.liters_in_system, 140.5);
        assert_eq!(top.first_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(top.last_date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());

        let small = &table.rows[3];
        assert_eq!(small.liters_total, 33.33);
        assert_eq!(small.liters_in_system, 30.33);
        assert_eq!(table.columns.len(), 9);
    }

    #[test]
    fn test_vehicle_summary_keeps_negative_in_system() {
        let table = vehicle_summary(&records(&[((2024, 3, 4), "51C-777", 20.0, 25.0)]));
        assert_eq!(table.rows[0].liters_in_system, -5.0);
    }

    #[test]
    fn test_ties_keep_grouping_order() {
        let table = vehicle_summary(&records(&[
            ((2024, 3, 1), "B", 10.0, 0.0),
            ((2024, 3, 1), "A", 10.0, 0.0),
            ((2024, 3, 1), "C", 10.0, 0.0),
        ]));
        let ids: Vec<_> = table.iter().map(|r| r.vehicle_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_mass_is_preserved() {
        let all = fleet();
        let expected: f64 = all.iter().map(|r| r.liters_total).sum();
        let total: f64 = group_by(&all, vehicle_key).iter().map(|(_, m)| m.liters_total).sum();
        assert!((total - expected).abs() < 1e-9);

        let table_total: f64 = vehicle_summary(&all).iter().map(|r| r.liters_total).sum();
        assert!((table_total - expected).abs() < 0.01 * all.len() as f64);
    }

    #[test]
    fn test_monthly_projections() {
        let all = fleet();
        let monthly = monthly_totals(&all);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly.rows[0].month, "2024-03");
        assert_eq!(monthly.rows[0].liters_total, 250.5);
        assert_eq!(monthly.rows[0].liters_outside, 35.0);
        assert_eq!(monthly.rows[0].liters_in_system, 215.5);

        let by_category = monthly_by_category(&all);
        let keys: Vec<_> = by_category
            .iter()
            .map(|r| (r.month.as_str(), r.fuel_category))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2024-03", FuelCategory::Gasoline),
                ("2024-03", FuelCategory::Diesel),
                ("2024-04", FuelCategory::Gasoline),
                ("2024-04", FuelCategory::Diesel),
            ]
        );
        assert_eq!(by_category.rows[1].liters_total, 80.0);
    }

    #[test]
    fn test_daily_totals() {
        let daily = daily_totals(&fleet());
        assert_eq!(daily.len(), 5);
        assert_eq!(daily.rows[2].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(daily.rows[2].liters_total, 70.5);
    }

    #[test]
    fn test_weekday_totals_zero_filled() {
        let table = weekday_totals(&example());
        assert_eq!(table.len(), 7);
        let days: Vec<_> = table.iter().map(|r| r.weekday).collect();
        assert_eq!(days, WEEKDAY_ORDER.to_vec());
        // 2024-03-01 is a Friday, 2024-03-02 a Saturday
        assert_eq!(table.rows[4].liters_total, 100.0);
        assert_eq!(table.rows[5].liters_total, 80.0);
        assert_eq!(table.rows[0].liters_total, 0.0);
        assert_eq!(table.rows[0].event_count, 0);
    }

    #[test]
    fn test_top_consumers_truncation() {
        let ids = [
            "V00", "V01", "V02", "V03", "V04", "V05", "V06", "V07", "V08", "V09", "V10", "V11",
        ];
        let rows: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| ((2024, 3, 1), id, 50.0 - i.min(9) as f64, 0.0))
            .collect();
        let table = top_consumers(&records(&rows), 10);

        assert_eq!(table.len(), 10);
        assert_eq!(table.rows[0].rank, 1);
        assert_eq!(table.rows[0].vehicle_id, "V00");
        // V09, V10 and V11 tie at 41; only V09 survives the cutoff
        assert_eq!(table.rows[9].vehicle_id, "V09");
        assert!(table.rows.windows(2).all(|w| w[0].liters_total >= w[1].liters_total));
    }

    #[test]
    fn test_top_consumers_short_list() {
        let table = top_consumers(&fleet(), 10);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_overview() {
        let summary = overview(&fleet());
        assert_eq!(summary.liters_total, 344.08);
        assert_eq!(summary.liters_diesel, 113.33);
        assert_eq!(summary.liters_gasoline, 230.75);
        assert_eq!(summary.liters_outside, 38.0);
        assert_eq!(summary.vehicle_count, 4);
        assert_eq!(summary.event_count, 6);
    }

    #[test]
    fn test_empty_input() {
        let empty: Vec<Record> = Vec::new();
        assert!(vehicle_summary(&empty).is_empty());
        assert!(category_summary(&empty).is_empty());
        assert!(monthly_totals(&empty).is_empty());
        assert!(monthly_by_category(&empty).is_empty());
        assert!(daily_totals(&empty).is_empty());
        assert!(top_consumers(&empty, 10).is_empty());

        let weekdays = weekday_totals(&empty);
        assert_eq!(weekdays.len(), 7);
        assert!(weekdays.iter().all(|r| r.liters_total == 0.0 && r.event_count == 0));

        assert_eq!(overview(&empty), Overview::default());
    }
}
