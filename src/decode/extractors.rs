//! Extractor implementations

use super::types::RecordExtractor;
use crate::error::{Error, Result};
use crate::http::HttpResponse;
use crate::types::{lookup_path, JsonValue};

// ============================================================================
// JSON Extractor
// ============================================================================

/// JSON extractor with optional record path
///
/// An array at the path yields its elements, `null` or a missing path yields
/// nothing, and any other value is a single record.
#[derive(Debug, Clone, Default)]
pub struct JsonExtractor {
    pub(super) record_path: Option<String>,
}

impl JsonExtractor {
    /// Create an extractor treating the whole body as the records
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor reading records at a dot path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            record_path: Some(path.into()),
        }
    }
}

impl RecordExtractor for JsonExtractor {
    fn extract_records(&self, response: &HttpResponse) -> Result<Vec<JsonValue>> {
        let body = response.json()?;
        let selected = match &self.record_path {
            Some(path) => lookup_path(&body, path),
            None => Some(&body),
        };

        Ok(match selected {
            Some(JsonValue::Array(items)) => items.clone(),
            Some(JsonValue::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        })
    }
}

// ============================================================================
// JSONL Extractor
// ============================================================================

/// JSON Lines extractor (one JSON value per line)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonlExtractor;

impl RecordExtractor for JsonlExtractor {
    fn extract_records(&self, response: &HttpResponse) -> Result<Vec<JsonValue>> {
        let body = response.text();
        let mut records = Vec::new();

        for (line_num, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: JsonValue = serde_json::from_str(line).map_err(|e| {
                Error::decode(format!("Failed to parse JSONL at line {}: {e}", line_num + 1))
            })?;
            records.push(value);
        }

        Ok(records)
    }
}
