//! Stream slice module
//!
//! A slice is one unit of iteration of a stream read: a partition plus a
//! cursor sub-range. Slices may span many HTTP pages.
//!
//! # Overview
//!
//! The slice module provides:
//! - `StreamSlice` - Immutable (partition, cursor_slice) pair with structural equality
//! - `Record` - A row extracted from a response, tagged with the slice it came from
//! - `SliceGenerator` - Product of partitions and cursor ranges with last-slice flagging

mod generator;
mod types;

pub use generator::{flag_last_slice, LastSliceFlagger, SliceGenerator, SliceIter, SliceOrder};
pub use types::{Record, StreamSlice};

#[cfg(test)]
mod tests;
