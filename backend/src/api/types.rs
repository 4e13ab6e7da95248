//! REST API types for report clients.
//!
//! The report itself is returned as computed by the pipeline; the envelope
//! adds a job id, a status and a small metadata block for list views.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::transform::pipeline::FuelReport;

/// Response sent after a source upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready" or "empty"
    pub status: String,

    pub report: FuelReport,

    pub metadata: ResponseMetadata,
}

/// Metadata about the run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Whether the records were served from the cache
    pub cached: bool,

    /// Records left after filtering
    pub record_count: usize,

    pub source: SourceMetadata,

    pub rows: RowStats,
}

/// Source file metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// Normalization counts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowStats {
    pub kept: usize,
    pub dropped: usize,
    pub ambiguous_dates: usize,
}

impl From<FuelReport> for ReportResponse {
    fn from(report: FuelReport) -> Self {
        let stats = &report.normalization;
        let metadata = ResponseMetadata {
            cached: report.cached,
            record_count: report.records.len(),
            source: SourceMetadata {
                encoding: report.source.encoding.clone(),
                delimiter: report.source.delimiter.to_string(),
                row_count: report.source.row_count,
                columns: report.source.headers.clone(),
            },
            rows: RowStats {
                kept: stats.kept_rows,
                dropped: stats.dropped_invalid_date + stats.dropped_missing_vehicle_id,
                ambiguous_dates: stats.ambiguous_dates,
            },
        };

        ReportResponse {
            job_id: Uuid::new_v4().to_string(),
            status: if report.is_empty() { "empty" } else { "ready" }.to_string(),
            report,
            metadata,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "report": null,
        "metadata": {
            "cached": false,
            "recordCount": 0
        }
    })
}
