//! Cursor trait and observation results

use crate::error::Result;
use crate::request::RequestOptionsProvider;
use crate::slice::{Record, SliceIter, StreamSlice};
use crate::state::StreamState;
use async_trait::async_trait;
use std::fmt;

/// Outcome of feeding one record to a cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The record moved the highest observed value forward
    Advanced,
    /// The record was valid but not newer than what was already observed
    Unchanged,
    /// The record could not be used for progress tracking; it is still emitted
    Skipped(SkipReason),
}

/// Why a record did not participate in cursor tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The cursor field is absent from the record
    MissingField {
        /// Cursor field name
        field: String,
    },
    /// The cursor field value could not be interpreted
    Unparsable {
        /// Cursor field name
        field: String,
        /// Raw value found in the record
        value: String,
    },
    /// The value cannot be ordered against previously observed values
    Incomparable {
        /// Cursor field name
        field: String,
    },
    /// The value lies outside the slice the record was read under
    OutsideSlice {
        /// Cursor field name
        field: String,
    },
    /// The slice's partition was never enumerated by this cursor
    UnknownPartition,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "cursor field '{field}' is missing"),
            Self::Unparsable { field, value } => {
                write!(f, "cursor field '{field}' has unparsable value '{value}'")
            }
            Self::Incomparable { field } => {
                write!(f, "cursor field '{field}' cannot be compared with the observed value")
            }
            Self::OutsideSlice { field } => {
                write!(f, "cursor field '{field}' is outside the slice boundaries")
            }
            Self::UnknownPartition => f.write_str("partition is unknown to the cursor"),
        }
    }
}

/// Tracks replication progress for a stream
///
/// Progress only moves in `close_slice`; `observe` merely records what has
/// been seen. A checkpoint taken at any time therefore never covers a slice
/// that was not fully read.
#[async_trait]
pub trait Cursor: RequestOptionsProvider + Send + Sync {
    /// Seed progress from persisted state; an empty state leaves the cursor
    /// at its beginning-of-time default
    fn set_initial_state(&mut self, state: &StreamState) -> Result<()>;

    /// Observe one record read under `slice`
    fn observe(&mut self, slice: &StreamSlice, record: &Record) -> Observation;

    /// Mark `slice` as fully consumed
    fn close_slice(&mut self, slice: &StreamSlice) -> Result<()>;

    /// Current progress
    fn get_stream_state(&self) -> StreamState;

    /// Whether the record is at or after the current low watermark
    fn should_be_synced(&self, record: &Record) -> bool;

    /// Total order on records' cursor values
    fn is_greater_than_or_equal(&self, first: &Record, second: &Record) -> bool;

    /// The slices to read, in order
    async fn stream_slices(&mut self) -> Result<SliceIter>;
}
