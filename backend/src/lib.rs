//! # Fuelboard - fleet fuel log aggregation
//!
//! Fuelboard turns a refueling log (one row per event: date, vehicle,
//! liters, liters bought outside the fleet system) into consumption reports
//! per vehicle, per fuel category and per period.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV File   │────▶│   Parser    │────▶│  Normalize  │────▶│   Filter    │────▶│  Aggregate  │
//! │ (any enc.)  │     │  (auto-enc) │     │  + Derive   │     │             │     │  (report)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                          cached per source        per request
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fuelboard::{run_file, FilterParams, PipelineConfig};
//!
//! let report = run_file("fuel.csv", &FilterParams::default(), &PipelineConfig::default(), None)?;
//! for row in report.top_consumers.iter() {
//!     println!("{:>2}. {} {:.2} L", row.rank, row.vehicle_id, row.liters_total);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (RawRow, Record, FuelCategory, AggregationTable)
//! - [`config`] - Pipeline configuration from env and flags
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Normalize, derive, filter, aggregate and pipeline
//! - [`validation`] - Filter document schema validation
//! - [`cache`] - Loaded-source caching
//! - [`export`] - CSV exports
//! - [`api`] - HTTP API server and log streaming

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Caching
pub mod cache;

// Export
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ExportError, PipelineError, PipelineResult, ServerError, SourceError, ValidationError,
};

// =============================================================================
// Re-exports - Models and configuration
// =============================================================================

pub use config::{DateOrder, PipelineConfig};
pub use models::{AggregationTable, FuelCategory, NormalizedRow, RawRow, Record};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_file_auto, ParseResult,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::aggregate::{
    category_summary, daily_totals, group_by, monthly_by_category, monthly_totals, overview,
    top_consumers, vehicle_summary, weekday_totals, Overview,
};
pub use transform::derive::{derive, FleetClassifier};
pub use transform::filter::{filter, FilterParams};
pub use transform::normalize::{normalize, NormalizationStats};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    build_report, load_source, run_bytes, run_file, run_rows, FilterOptions, FuelReport, LoadedSource,
    SourceInfo,
};

// =============================================================================
// Re-exports - Cache, Validation, API
// =============================================================================

pub use cache::{CacheStatus, RecordCache, SourceKey};
pub use validation::{parse_filter_params, validate_filter_params};
pub use api::types::{error_response, ReportResponse, ResponseMetadata};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
