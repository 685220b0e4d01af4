//! Cursor shared by every partition of a stream

use super::types::{Cursor, Observation};
use crate::error::{Error, Result};
use crate::partition::PartitionRouter;
use crate::request::{combine_options, RequestOptions, RequestOptionsProvider};
use crate::slice::{Record, SliceGenerator, SliceIter, SliceOrder, StreamSlice};
use crate::state::StreamState;
use crate::types::JsonObject;
use async_trait::async_trait;
use tracing::debug;

/// One shared cursor across all partitions of a router
///
/// State stays constant-size regardless of the number of partitions. The
/// trade-off: the shared watermark only moves once the final slice of the
/// whole partition x range product is closed, so an interrupted sync
/// re-reads every partition from the previous watermark. Parent state
/// moves at the same point.
pub struct GlobalCursor {
    stream_cursor: Box<dyn Cursor>,
    partition_router: Box<dyn PartitionRouter>,
    order: SliceOrder,
}

impl GlobalCursor {
    /// Compose a router with a shared cursor (partitions in the outer loop)
    pub fn new(stream_cursor: Box<dyn Cursor>, partition_router: Box<dyn PartitionRouter>) -> Self {
        Self {
            stream_cursor,
            partition_router,
            order: SliceOrder::PartitionFirst,
        }
    }

    /// Nesting order of the partition x range product
    #[must_use]
    pub fn with_order(mut self, order: SliceOrder) -> Self {
        self.order = order;
        self
    }

    /// Underlying shared cursor
    pub fn stream_cursor(&self) -> &dyn Cursor {
        self.stream_cursor.as_ref()
    }
}

impl std::fmt::Debug for GlobalCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalCursor")
            .field("order", &self.order)
            .field("state", &self.get_stream_state())
            .finish_non_exhaustive()
    }
}

impl RequestOptionsProvider for GlobalCursor {
    fn request_options(
        &self,
        slice: Option<&StreamSlice>,
        next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        let slice = slice.ok_or_else(|| Error::missing_slice("GlobalCursor"))?;
        let from_router = self
            .partition_router
            .request_options(Some(&slice.without_cursor_slice()), next_page_token)?;
        let from_cursor = self
            .stream_cursor
            .request_options(Some(&slice.without_partition()), next_page_token)?;
        combine_options([from_router, from_cursor])
    }
}

#[async_trait]
impl Cursor for GlobalCursor {
    fn set_initial_state(&mut self, state: &StreamState) -> Result<()> {
        // Nested form `{"state": {...}}` and flat legacy form both land in `state.state`.
        self.stream_cursor
            .set_initial_state(&StreamState::new(state.state.clone()))?;
        self.partition_router.set_initial_state(&state.parent_state)
    }

    fn observe(&mut self, slice: &StreamSlice, record: &Record) -> Observation {
        self.stream_cursor
            .observe(&slice.without_partition(), &record.without_partition())
    }

    fn close_slice(&mut self, slice: &StreamSlice) -> Result<()> {
        if !slice.last_slice {
            return Ok(());
        }
        debug!(%slice, "Closing shared cursor on the final slice");
        self.stream_cursor.close_slice(&slice.without_partition())?;
        self.partition_router.commit_parent_state();
        Ok(())
    }

    fn get_stream_state(&self) -> StreamState {
        StreamState {
            state: self.stream_cursor.get_stream_state().state,
            parent_state: self.partition_router.get_stream_state(),
        }
    }

    fn should_be_synced(&self, record: &Record) -> bool {
        self.stream_cursor
            .should_be_synced(&record.without_partition())
    }

    fn is_greater_than_or_equal(&self, first: &Record, second: &Record) -> bool {
        self.stream_cursor
            .is_greater_than_or_equal(&first.without_partition(), &second.without_partition())
    }

    async fn stream_slices(&mut self) -> Result<SliceIter> {
        let partitions: Vec<StreamSlice> = self.partition_router.stream_slices().await?.collect();
        let ranges: Vec<StreamSlice> = self.stream_cursor.stream_slices().await?.collect();
        debug!(
            partitions = partitions.len(),
            ranges = ranges.len(),
            "Generating global cursor slices"
        );
        // Nothing to read, so no partition can lose records
        if partitions.is_empty() || ranges.is_empty() {
            self.partition_router.commit_parent_state();
        }
        Ok(SliceGenerator::product(partitions, ranges, self.order).boxed())
    }
}
