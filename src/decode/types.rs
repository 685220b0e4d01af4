//! Extractor types and traits

use super::extractors::{JsonExtractor, JsonlExtractor};
use crate::error::Result;
use crate::http::HttpResponse;
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};

/// Format of the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// JSON Lines format (one JSON object per line)
    Jsonl,
}

/// Configuration for extracting records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Response format
    #[serde(default)]
    pub format: DecoderFormat,
    /// Dot path to the records array (JSON only)
    #[serde(default)]
    pub record_path: Option<String>,
}

impl DecoderConfig {
    /// Create a JSON decoder config
    pub fn json() -> Self {
        Self::default()
    }

    /// Create a JSON decoder config with a record path
    pub fn json_with_path(path: impl Into<String>) -> Self {
        Self {
            format: DecoderFormat::Json,
            record_path: Some(path.into()),
        }
    }

    /// Create a JSONL decoder config
    pub fn jsonl() -> Self {
        Self {
            format: DecoderFormat::Jsonl,
            record_path: None,
        }
    }

    /// Build the extractor
    pub fn build(&self) -> Box<dyn RecordExtractor> {
        match self.format {
            DecoderFormat::Json => Box::new(JsonExtractor {
                record_path: self.record_path.clone(),
            }),
            DecoderFormat::Jsonl => Box::new(JsonlExtractor),
        }
    }
}

/// Turns a raw response into raw record values
pub trait RecordExtractor: Send + Sync {
    /// Extract the page's records, in response order
    fn extract_records(&self, response: &HttpResponse) -> Result<Vec<JsonValue>>;
}
