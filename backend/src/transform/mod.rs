//! Transformation module.
//!
//! Raw rows flow through four stages:
//! - Normalize: untyped rows to validated rows, invalid ones dropped
//! - Derive: category, in-system liters and calendar keys
//! - Filter: date range, categories and vehicles
//! - Aggregate: grouping and the report projections
//!
//! `pipeline` chains them and adds source loading and caching.

pub mod aggregate;
pub mod derive;
pub mod filter;
pub mod normalize;
pub mod pipeline;

pub use aggregate::{group_by, overview, top_consumers, vehicle_summary, GroupMetrics, Overview};
pub use derive::{derive, derive_all, FleetClassifier};
pub use filter::{filter, FilterParams};
pub use normalize::{normalize, normalize_with_report, NormalizationStats};
pub use pipeline::*;
