//! Cursor module
//!
//! Supports: Datetime ranges, Monotonic field values, Global (shared) and
//! Per-partition composition
//!
//! # Overview
//!
//! A cursor tracks replication progress for one stream (or one partition of
//! a stream). It decides which cursor ranges to request, observes every
//! record read, advances its watermark only when a slice is closed and
//! exposes its progress as an opaque, resumable state.
//!
//! - `DatetimeBasedCursor` - Date-window slicing on a datetime cursor field
//! - `ValueCursor` - Single unbounded slice on a numeric or string field
//! - `GlobalCursor` - Many partitions sharing one underlying cursor
//! - `PerPartitionCursor` - One child cursor per partition

mod datetime;
mod field;
mod global;
mod per_partition;
mod time;
mod types;
mod value;

pub use datetime::DatetimeBasedCursor;
pub use field::ValueCursor;
pub use global::GlobalCursor;
pub use per_partition::{CursorFactory, PerPartitionCursor, DEFAULT_MAX_PARTITIONS};
pub use time::{format_datetime, parse_datetime, parse_datetime_value, parse_duration, Step};
pub use types::{Cursor, Observation, SkipReason};
pub use value::CursorValue;

#[cfg(test)]
mod tests;
