//! High-level pipeline API: source bytes to a complete fuel report.
//!
//! This module chains every step:
//! parsing, normalization, derivation, filtering and aggregation.
//!
//! # Example
//!
//! ```rust,ignore
//! use fuelboard::config::PipelineConfig;
//! use fuelboard::transform::{run_file, FilterParams};
//!
//! let config = PipelineConfig::from_env()?;
//! let report = run_file("fuel_log.csv", &FilterParams::default(), &config, None)?;
//! println!("{} liters over {} vehicles", report.overview.liters_total, report.overview.vehicle_count);
//! ```
//!
//! Loading (parse + normalize + derive) depends only on the source and the
//! configuration, so its result can be kept in a [`RecordCache`] and reused
//! across filters.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::cache::{CacheStatus, RecordCache, SourceKey};
use crate::config::PipelineConfig;
use crate::error::{PipelineResult, SourceError, SourceResult};
use crate::models::{AggregationTable, RawRow, Record};
use crate::parser::{parse_bytes_auto, ParseResult};
use crate::transform::aggregate::{
    category_summary, daily_totals, monthly_by_category, monthly_totals, overview, top_consumers,
    vehicle_summary, weekday_totals, CategorySummaryRow, DailyRow, MonthlyCategoryRow, MonthlyRow,
    Overview, TopConsumerRow, VehicleSummaryRow, WeekdayRow,
};
use crate::transform::derive::{derive_all, FleetClassifier};
use crate::transform::filter::{filter, FilterParams};
use crate::transform::normalize::{normalize_with_report, NormalizationStats};

/// Source file information
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl SourceInfo {
    /// Info for rows that did not come from a decoded file.
    pub fn in_memory(row_count: usize) -> Self {
        Self {
            encoding: "utf-8".to_string(),
            delimiter: ',',
            headers: Vec::new(),
            row_count,
        }
    }
}

/// Values a client can offer as filter choices for one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
    /// Distinct vehicle ids, ascending
    pub vehicles: Vec<String>,
}

impl FilterOptions {
    pub fn from_records(records: &[Record]) -> Self {
        let vehicles: BTreeSet<&str> = records.iter().map(|r| r.vehicle_id.as_str()).collect();
        Self {
            date_min: records.iter().map(|r| r.date).min(),
            date_max: records.iter().map(|r| r.date).max(),
            vehicles: vehicles.into_iter().map(String::from).collect(),
        }
    }
}

/// Derived records of one source, ready for any number of filters.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub info: SourceInfo,
    pub stats: NormalizationStats,
    /// Computed over every kept record, before filtering
    pub filter_options: FilterOptions,
    pub records: Arc<Vec<Record>>,
}

/// Complete result of one pipeline run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelReport {
    pub source: SourceInfo,
    pub normalization: NormalizationStats,
    /// Filter as applied
    pub filter: FilterParams,
    /// Whether the records came from the cache
    pub cached: bool,
    pub filter_options: FilterOptions,
    pub overview: Overview,
    pub per_vehicle: AggregationTable<VehicleSummaryRow>,
    pub per_category: AggregationTable<CategorySummaryRow>,
    pub monthly: AggregationTable<MonthlyRow>,
    pub monthly_by_category: AggregationTable<MonthlyCategoryRow>,
    pub daily: AggregationTable<DailyRow>,
    pub weekday: AggregationTable<WeekdayRow>,
    pub top_consumers: AggregationTable<TopConsumerRow>,
    /// Filtered detail records
    pub records: Vec<Record>,
}

impl FuelReport {
    /// No record survived normalization and filtering.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Normalize and derive positional rows.
pub fn load_rows(rows: &[RawRow], config: &PipelineConfig) -> LoadedSource {
    log_info("Normalizing rows...");
    let outcome = normalize_with_report(rows, config.date_order);
    let stats = outcome.stats();

    if stats.dropped_invalid_date > 0 {
        log_warning(format!("{} rows dropped: unparseable date", stats.dropped_invalid_date));
    }
    if stats.dropped_missing_vehicle_id > 0 {
        log_warning(format!(
            "{} rows dropped: missing vehicle id",
            stats.dropped_missing_vehicle_id
        ));
    }
    if stats.ambiguous_dates > 0 {
        log_warning(format!(
            "{} dates readable both day-first and month-first, read as {:?}",
            stats.ambiguous_dates, config.date_order
        ));
        for idx in stats.ambiguous_sample.iter().take(3) {
            log_info_indent(format!("row {}", idx + 1), 1);
        }
    }

    let classifier = FleetClassifier::new(config.diesel_tag.as_str());
    let records = derive_all(outcome.rows, &classifier);
    log_success(format!("{} of {} rows kept", stats.kept_rows, stats.raw_rows));

    let filter_options = FilterOptions::from_records(&records);
    if let (Some(min), Some(max)) = (filter_options.date_min, filter_options.date_max) {
        log_info_indent(
            format!("{} to {}, {} vehicles", min, max, filter_options.vehicles.len()),
            1,
        );
    }

    LoadedSource {
        info: SourceInfo::in_memory(rows.len()),
        stats,
        filter_options,
        records: Arc::new(records),
    }
}

/// Turn an already parsed source into a [`LoadedSource`].
pub fn load_parsed(parsed: ParseResult, config: &PipelineConfig) -> LoadedSource {
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!("Read {} rows", parsed.rows.len()));

    let info = SourceInfo {
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        headers: parsed.headers,
        row_count: parsed.rows.len(),
    };

    LoadedSource {
        info,
        ..load_rows(&parsed.rows, config)
    }
}

/// Decode, parse, normalize and derive source bytes.
pub fn load_source(bytes: &[u8], config: &PipelineConfig) -> SourceResult<LoadedSource> {
    log_info("Reading source...");
    let parsed = parse_bytes_auto(bytes)?;
    Ok(load_parsed(parsed, config))
}

/// [`load_source`] through an optional cache.
pub fn load_source_cached(
    bytes: &[u8],
    config: &PipelineConfig,
    cache: Option<&mut RecordCache>,
) -> SourceResult<(LoadedSource, CacheStatus)> {
    match cache {
        Some(cache) => {
            let key = SourceKey::new(bytes, config);
            let (source, status) = cache.get_or_try_load(key, || load_source(bytes, config))?;
            if status.is_hit() {
                log_success(format!("Reusing {} cached records", source.records.len()));
            }
            Ok((source, status))
        }
        None => Ok((load_source(bytes, config)?, CacheStatus::Miss)),
    }
}

// =============================================================================
// Reporting
// =============================================================================

/// Filter a loaded source and compute every projection.
pub fn build_report(
    source: &LoadedSource,
    params: &FilterParams,
    config: &PipelineConfig,
    status: CacheStatus,
) -> FuelReport {
    if params.has_half_open_range() {
        log_warning("Only one date bound given, date filter ignored");
    }

    let records = if params.is_empty() {
        source.records.as_ref().clone()
    } else {
        let kept = filter(&source.records, params);
        log_info(format!("Filter kept {} of {} records", kept.len(), source.records.len()));
        kept
    };

    if records.is_empty() {
        log_warning("No records to aggregate");
    } else {
        log_info("Aggregating...");
    }

    let report = FuelReport {
        source: source.info.clone(),
        normalization: source.stats.clone(),
        filter: params.clone(),
        cached: status.is_hit(),
        filter_options: source.filter_options.clone(),
        overview: overview(&records),
        per_vehicle: vehicle_summary(&records),
        per_category: category_summary(&records),
        monthly: monthly_totals(&records),
        monthly_by_category: monthly_by_category(&records),
        daily: daily_totals(&records),
        weekday: weekday_totals(&records),
        top_consumers: top_consumers(&records, config.top_n),
        records,
    };

    log_success(format!(
        "{} vehicles, {:.2} liters",
        report.overview.vehicle_count, report.overview.liters_total
    ));
    report
}

/// Run the whole pipeline on source bytes.
pub fn run_bytes(
    bytes: &[u8],
    params: &FilterParams,
    config: &PipelineConfig,
    cache: Option<&mut RecordCache>,
) -> PipelineResult<FuelReport> {
    let (source, status) = load_source_cached(bytes, config, cache)?;
    Ok(build_report(&source, params, config, status))
}

/// Run the whole pipeline on a file.
pub fn run_file<P: AsRef<Path>>(
    path: P,
    params: &FilterParams,
    config: &PipelineConfig,
    cache: Option<&mut RecordCache>,
) -> PipelineResult<FuelReport> {
    let bytes = std::fs::read(path.as_ref()).map_err(SourceError::from)?;
    run_bytes(&bytes, params, config, cache)
}

/// Run the pipeline on rows supplied by another loader.
pub fn run_rows(rows: &[RawRow], params: &FilterParams, config: &PipelineConfig) -> FuelReport {
    let source = load_rows(rows, config);
    build_report(&source, params, config, CacheStatus::Miss)
}

/// Format delimiter for display
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}
