//! Slice generation
//!
//! Combines partitions with cursor ranges and marks the final slice of the
//! combined sequence using one element of lookahead.

use super::types::StreamSlice;
use serde::{Deserialize, Serialize};
use std::iter::Fuse;

/// Owned, lazily evaluated sequence of slices
pub type SliceIter = Box<dyn Iterator<Item = StreamSlice> + Send>;

/// Nesting order of the partition/cursor product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceOrder {
    /// Partitions in the outer loop, cursor ranges inner
    #[default]
    PartitionFirst,
    /// Cursor ranges in the outer loop, partitions inner
    CursorFirst,
}

/// Iterator adapter that sets `last_slice` on exactly the final item
#[derive(Debug)]
pub struct LastSliceFlagger<I: Iterator<Item = StreamSlice>> {
    inner: Fuse<I>,
    pending: Option<StreamSlice>,
}

impl<I: Iterator<Item = StreamSlice>> LastSliceFlagger<I> {
    /// Wrap an iterator
    pub fn new(inner: I) -> Self {
        Self {
            inner: inner.fuse(),
            pending: None,
        }
    }
}

impl<I: Iterator<Item = StreamSlice>> Iterator for LastSliceFlagger<I> {
    type Item = StreamSlice;

    fn next(&mut self) -> Option<StreamSlice> {
        let current = match self.pending.take() {
            Some(slice) => slice,
            None => self.inner.next()?,
        };

        match self.inner.next() {
            Some(next) => {
                self.pending = Some(next);
                Some(current.with_last_slice(false))
            }
            None => Some(current.with_last_slice(true)),
        }
    }
}

/// Flag the final slice of any slice sequence
pub fn flag_last_slice<I>(slices: I) -> LastSliceFlagger<I::IntoIter>
where
    I: IntoIterator<Item = StreamSlice>,
{
    LastSliceFlagger::new(slices.into_iter())
}

/// Ordered sequence of slices a sync iterates
///
/// Built either from the product of partitions and cursor ranges or from an
/// arbitrary slice sequence. Either way exactly the last slice produced has
/// `last_slice == true`.
pub struct SliceGenerator {
    inner: LastSliceFlagger<SliceIter>,
}

impl SliceGenerator {
    /// Wrap an existing slice sequence
    pub fn from_slices(slices: SliceIter) -> Self {
        Self {
            inner: LastSliceFlagger::new(slices),
        }
    }

    /// Cartesian product of partitions and cursor ranges
    ///
    /// Each output slice takes `partition` from the partition side and
    /// `cursor_slice` from the cursor side.
    pub fn product(
        partitions: Vec<StreamSlice>,
        cursor_slices: Vec<StreamSlice>,
        order: SliceOrder,
    ) -> Self {
        let combined: SliceIter = match order {
            SliceOrder::PartitionFirst => Box::new(partitions.into_iter().flat_map(move |p| {
                cursor_slices
                    .clone()
                    .into_iter()
                    .map(move |c| StreamSlice::new(p.partition.clone(), c.cursor_slice))
            })),
            SliceOrder::CursorFirst => Box::new(cursor_slices.into_iter().flat_map(move |c| {
                partitions
                    .clone()
                    .into_iter()
                    .map(move |p| StreamSlice::new(p.partition, c.cursor_slice.clone()))
            })),
        };
        Self::from_slices(combined)
    }

    /// Box this generator as a plain slice iterator
    pub fn boxed(self) -> SliceIter {
        Box::new(self)
    }
}

impl Iterator for SliceGenerator {
    type Item = StreamSlice;

    fn next(&mut self) -> Option<StreamSlice> {
        self.inner.next()
    }
}

impl std::fmt::Debug for SliceGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceGenerator").finish_non_exhaustive()
    }
}
