//! JSON Schema validation for filter documents.
//!
//! Filter parameters arriving as JSON (HTTP `filter` field, CLI
//! `--filter-file`) are checked against an embedded JSON Schema Draft 7
//! before deserialization, so that unknown keys and malformed dates are
//! reported one by one instead of as a single serde message.
//!
//! # Embedded Schemas
//!
//! Embedded at compile time from the `schemas/` directory:
//! - `filter-params.json`
//!
//! # Example
//!
//! ```rust,ignore
//! use fuelboard::validation::parse_filter_params;
//!
//! let params = parse_filter_params(r#"{"dateFrom": "2024-03-01", "dateTo": "2024-03-31"}"#)?;
//! assert!(params.date_range().is_some());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::ValidationError;
use crate::transform::filter::FilterParams;

static FILTER_PARAMS_SCHEMA: Lazy<Result<Value, String>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/filter-params.json"))
        .map_err(|e| format!("Invalid embedded schema: {}", e))
});

/// Validate a JSON value against a JSON schema.
///
/// Returns every violation, one message per error.
///
/// # Example
/// ```ignore
/// use serde_json::json;
/// use fuelboard::validation::validate;
///
/// let schema = json!({
///     "type": "object",
///     "required": ["name"],
///     "properties": {
///         "name": { "type": "string" }
///     }
/// });
///
/// assert!(validate(&schema, &json!({ "name": "test" })).is_ok());
/// assert!(validate(&schema, &json!({ "age": 42 })).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick true/false check.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate against the filter parameters schema.
pub fn validate_filter_params(data: &Value) -> Result<(), Vec<String>> {
    let schema = FILTER_PARAMS_SCHEMA.as_ref().map_err(|e| vec![e.clone()])?;
    validate(schema, data)
}

/// Validate, then deserialize a filter document.
///
/// Dates that match the `YYYY-MM-DD` shape but do not exist (`2024-02-30`)
/// pass the schema and fail here with [`ValidationError::JsonError`].
pub fn parse_filter_value(data: Value) -> Result<FilterParams, ValidationError> {
    validate_filter_params(&data).map_err(|errors| ValidationError::SchemaError { errors })?;
    Ok(serde_json::from_value(data)?)
}

/// [`parse_filter_value`] from JSON text. Blank text is an empty filter.
pub fn parse_filter_params(json: &str) -> Result<FilterParams, ValidationError> {
    if json.trim().is_empty() {
        return Ok(FilterParams::default());
    }
    let data: Value = serde_json::from_str(json)?;
    parse_filter_value(data)
}
