//! Tabular source loader with encoding and delimiter auto-detection.
//!
//! Turns CSV bytes into positional [`RawRow`]s. The first line is a header
//! and must carry at least the four positional columns
//! `(date, vehicle_id, liters, outside_liters)`; column names are kept for
//! reporting only. No typing or validation happens here.

use serde_json::Value;
use std::path::Path;

use crate::error::{SourceError, SourceResult};
use crate::models::RawRow;

/// Number of positional columns the pipeline reads.
pub const REQUIRED_COLUMNS: usize = 4;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Positional rows, header excluded
    pub rows: Vec<RawRow>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers as found in the source
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "windows-1258" | "cp1258" => "windows-1258".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string using the given encoding, dropping a leading BOM.
pub fn decode_content(bytes: &[u8], encoding: &str) -> SourceResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        "windows-1258" | "cp1258" => encoding_rs::WINDOWS_1258.decode(bytes).0.into_owned(),
        other => {
            let codec = encoding_rs::Encoding::for_label(other.as_bytes()).ok_or_else(|| {
                SourceError::EncodingError(format!("unsupported encoding '{}'", other))
            })?;
            codec.decode(bytes).0.into_owned()
        }
    };

    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse decoded CSV text with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: char, encoding: String) -> SourceResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(SourceError::EmptySource);
    }

    let delimiter_byte = u8::try_from(delimiter)
        .map_err(|_| SourceError::ParseError {
            line: 1,
            message: format!("delimiter '{}' is not a single-byte character", delimiter),
        })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(SourceError::EmptySource);
    }
    if headers.len() < REQUIRED_COLUMNS {
        return Err(SourceError::MissingColumns {
            expected: REQUIRED_COLUMNS,
            found: headers.len(),
        });
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(RawRow::from_cells(record.iter().map(cell_value)));
    }

    Ok(ParseResult {
        rows,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> SourceResult<ParseResult> {
    if bytes.is_empty() {
        return Err(SourceError::EmptySource);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);

    parse_str(&content, delimiter, encoding)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_file_auto("fuel_log.csv")?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Rows: {}", result.rows.len());
/// ```
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> SourceResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

fn cell_value(cell: &str) -> Value {
    if cell.is_empty() {
        Value::Null
    } else {
        Value::String(cell.to_string())
    }
}
