//! CSV export of report tables.
//!
//! Dates are written `dd/mm/YYYY`, the convention of the fuel sheets the
//! records come from. Numbers are written as computed (summary rows are
//! already rounded to two decimals).

use chrono::NaiveDate;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::ExportResult;
use crate::models::{weekday_name, AggregationTable, Record};
use crate::transform::aggregate::VehicleSummaryRow;

pub const EXPORT_DATE_FORMAT: &str = "%d/%m/%Y";

pub const DETAIL_COLUMNS: &[&str] = &[
    "date",
    "vehicle_id",
    "liters_total",
    "liters_outside",
    "liters_in_system",
    "fuel_category",
    "period_month",
    "period_week",
    "weekday",
];

fn format_date(date: NaiveDate) -> String {
    date.format(EXPORT_DATE_FORMAT).to_string()
}

/// Write the per-vehicle summary, header included.
pub fn write_vehicle_summary<W: Write>(
    writer: W,
    table: &AggregationTable<VehicleSummaryRow>,
) -> ExportResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.columns)?;

    for row in table.iter() {
        csv_writer.write_record([
            row.vehicle_id.clone(),
            row.fuel_category.to_string(),
            row.liters_total.to_string(),
            row.liters_per_event.to_string(),
            row.event_count.to_string(),
            row.liters_outside.to_string(),
            row.liters_in_system.to_string(),
            format_date(row.first_date),
            format_date(row.last_date),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write detail records, header included.
pub fn write_records<W: Write>(writer: W, records: &[Record]) -> ExportResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(DETAIL_COLUMNS)?;

    for record in records {
        csv_writer.write_record([
            format_date(record.date),
            record.vehicle_id.clone(),
            record.liters_total.to_string(),
            record.liters_outside.to_string(),
            record.liters_in_system.to_string(),
            record.fuel_category.to_string(),
            record.period_month.clone(),
            record.period_week.clone(),
            weekday_name(record.weekday).to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn export_vehicle_summary<P: AsRef<Path>>(
    path: P,
    table: &AggregationTable<VehicleSummaryRow>,
) -> ExportResult<()> {
    write_vehicle_summary(File::create(path)?, table)
}

pub fn export_records<P: AsRef<Path>>(path: P, records: &[Record]) -> ExportResult<()> {
    write_records(File::create(path)?, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NormalizedRow;
    use crate::transform::aggregate::vehicle_summary;
    use crate::transform::derive::{derive_all, FleetClassifier};
    use tempfile::tempdir;

    fn records() -> Vec<Record> {
        let rows = vec![
            NormalizedRow {
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                vehicle_id: "51A-123".to_string(),
                liters_total: 100.0,
                liters_outside: 10.0,
            },
            NormalizedRow {
                date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                vehicle_id: "50A01990-B".to_string(),
                liters_total: 80.0,
                liters_outside: 0.0,
            },
        ];
        derive_all(rows, &FleetClassifier::new("50A01990"))
    }

    #[test]
    fn test_vehicle_summary_csv() {
        let mut buffer = Vec::new();
        write_vehicle_summary(&mut buffer, &vehicle_summary(&records())).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            lines[0],
            "vehicle_id,fuel_category,liters_total,liters_per_event,event_count,liters_outside,liters_in_system,first_date,last_date"
        );
        assert_eq!(lines[1], "51A-123,Gasoline,100,100,1,10,90,01/03/2024,01/03/2024");
        assert_eq!(lines[2], "50A01990-B,Diesel,80,80,1,0,80,02/03/2024,02/03/2024");
    }

    #[test]
    fn test_records_csv() {
        let mut buffer = Vec::new();
        write_records(&mut buffer, &records()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date,vehicle_id"));
        assert_eq!(lines[1], "01/03/2024,51A-123,100,10,90,Gasoline,2024-03,2024-W09,Friday");
    }

    #[test]
    fn test_empty_exports_have_header() {
        let mut buffer = Vec::new();
        write_records(&mut buffer, &[]).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("detail.csv");
        export_records(&path, &records()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("50A01990-B"));

        let bad = export_records(dir.path().join("missing/detail.csv"), &records());
        assert!(bad.is_err());
    }
}
