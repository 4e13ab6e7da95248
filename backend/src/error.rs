//! Error types for the Fuelboard pipeline.
//!
//! - [`SourceError`] - unreadable or malformed input source (fatal)
//! - [`ConfigError`] - invalid configuration values
//! - [`ValidationError`] - filter documents failing the embedded schema
//! - [`ExportError`] - CSV export failures
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Row-level problems (bad dates, missing vehicle ids, unparseable liters)
//! are never errors: the normalizer drops or zero-fills them and only
//! counts them.

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while reading or decoding the tabular source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read file.
    #[error("Failed to read source: {0}")]
    IoError(#[from] std::io::Error),

    /// Bytes could not be decoded as text.
    #[error("Failed to decode source: {0}")]
    EncodingError(String),

    /// Malformed CSV record.
    #[error("Line {line}: {message}")]
    ParseError { line: u64, message: String },

    /// Source has no bytes or no header line.
    #[error("Source is empty")]
    EmptySource,

    /// Header row has fewer than the four positional columns.
    #[error("Expected at least {expected} columns, found {found}")]
    MissingColumns { expected: usize, found: usize },
}

impl From<csv::Error> for SourceError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        SourceError::ParseError {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading [`crate::config::PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable holds an unusable value.
    #[error("Invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors while validating filter documents.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Document does not match the schema.
    #[error("Validation failed: {}", errors.join("; "))]
    SchemaError { errors: Vec<String> },

    /// Document is not valid JSON or does not deserialize.
    #[error("Invalid filter document: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing CSV exports.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// Only source-level failures abort a run; everything downstream of the
/// loader degrades to empty or zero-filled tables instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Filter error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type SourceResult<T> = Result<T, SourceError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

pub type ExportResult<T> = Result<T, ExportError>;

pub type ServerResult<T> = Result<T, ServerError>;
