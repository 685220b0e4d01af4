//! Record extraction module
//!
//! Supports: JSON (optionally under a record path), JSONL
//!
//! # Overview
//!
//! The read loop hands every page's response to a [`RecordExtractor`] and
//! treats the returned values as opaque records. Non-object values are
//! wrapped as `{"data": value}` by [`Record::from_value`](crate::slice::Record::from_value).

mod extractors;
mod types;

pub use extractors::{JsonExtractor, JsonlExtractor};
pub use types::{DecoderConfig, DecoderFormat, RecordExtractor};

#[cfg(test)]
mod tests;
