//! One cursor per partition

use super::types::{Cursor, Observation, SkipReason};
use crate::error::{Error, Result};
use crate::partition::PartitionRouter;
use crate::request::{combine_options, RequestOptions, RequestOptionsProvider};
use crate::slice::{Record, SliceGenerator, SliceIter, StreamSlice};
use crate::state::StreamState;
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, warn};

/// Builds a fresh child cursor for a newly seen partition
pub type CursorFactory = Box<dyn Fn() -> Result<Box<dyn Cursor>> + Send + Sync>;

/// Partitions kept before the oldest closed ones are folded into the
/// shared fallback state
pub const DEFAULT_MAX_PARTITIONS: usize = 10_000;

const STATES_KEY: &str = "states";
const GLOBAL_KEY: &str = "state";
const PARTITION_KEY: &str = "partition";
const CURSOR_KEY: &str = "cursor";

struct PartitionEntry {
    partition: JsonObject,
    cursor: Box<dyn Cursor>,
}

/// Cursor that keeps independent progress for every partition
///
/// State has the shape
/// `{"states": [{"partition": {...}, "cursor": {...}}, ...], "state": {...}}`.
/// At most `max_partitions` entries are kept: beyond that the oldest
/// closed partitions are dropped and their progress folded into the
/// `state` fallback, which seeds any partition without an entry. The
/// fallback keeps the lowest watermark it absorbed, so a returning
/// partition re-reads rather than skips.
///
/// Parent state is committed once every slice of an enumeration has been
/// closed.
pub struct PerPartitionCursor {
    factory: CursorFactory,
    partition_router: Box<dyn PartitionRouter>,
    cursors: HashMap<String, PartitionEntry>,
    /// Partition keys, oldest first
    order: VecDeque<String>,
    /// Unclosed slices per partition of the current enumeration
    open: HashMap<String, usize>,
    max_partitions: usize,
    /// Applied to partitions that have no state of their own
    global_state: Option<StreamState>,
    comparator: Box<dyn Cursor>,
}

impl PerPartitionCursor {
    /// Compose a router with a per-partition cursor factory
    pub fn new(factory: CursorFactory, partition_router: Box<dyn PartitionRouter>) -> Result<Self> {
        let comparator = factory()?;
        Ok(Self {
            factory,
            partition_router,
            cursors: HashMap::new(),
            order: VecDeque::new(),
            open: HashMap::new(),
            max_partitions: DEFAULT_MAX_PARTITIONS,
            global_state: None,
            comparator,
        })
    }

    /// Cap the number of partitions kept in state
    pub fn with_max_partitions(mut self, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::invalid_value(
                "max_partitions",
                "at least one partition must be kept",
            ));
        }
        self.max_partitions = limit;
        Ok(self)
    }

    /// Number of partitions with a cursor
    pub fn partition_count(&self) -> usize {
        self.cursors.len()
    }

    /// State applied to partitions without an entry of their own
    pub fn global_state(&self) -> Option<&StreamState> {
        self.global_state.as_ref()
    }

    fn new_cursor(&self) -> Result<Box<dyn Cursor>> {
        let mut cursor = (self.factory)()?;
        if let Some(state) = &self.global_state {
            cursor.set_initial_state(state)?;
        }
        Ok(cursor)
    }

    fn cursor_for(&self, partition: &JsonObject) -> Option<&dyn Cursor> {
        self.cursors
            .get(&partition_key(partition))
            .map(|entry| entry.cursor.as_ref())
    }

    fn insert(&mut self, key: String, entry: PartitionEntry) {
        if self.cursors.insert(key.clone(), entry).is_none() {
            self.order.push_back(key);
        }
    }

    /// Drop the oldest closed partitions until the limit holds
    ///
    /// Open partitions are never dropped; their slices still need a cursor.
    fn enforce_partition_limit(&mut self) {
        while self.cursors.len() > self.max_partitions {
            let Some(index) = self.order.iter().position(|key| !self.open.contains_key(key))
            else {
                warn!(
                    partitions = self.cursors.len(),
                    limit = self.max_partitions,
                    "Partition limit exceeded by partitions still being read"
                );
                return;
            };
            let Some(key) = self.order.remove(index) else {
                return;
            };
            if let Some(entry) = self.cursors.remove(&key) {
                debug!(partition = %key, "Partition limit reached; dropping oldest closed partition");
                self.fold_into_global(entry.cursor.get_stream_state());
            }
        }
    }

    fn fold_into_global(&mut self, evicted: StreamState) {
        let merged = match self.global_state.take() {
            Some(current) => self.lower_state(current, evicted),
            None => evicted,
        };
        self.global_state = Some(merged);
    }

    /// The less advanced of two child states; empty when they cannot be ordered
    fn lower_state(&self, first: StreamState, second: StreamState) -> StreamState {
        let a = Record::new(first.state.clone(), None);
        let b = Record::new(second.state.clone(), None);
        if self.comparator.is_greater_than_or_equal(&a, &b) {
            second
        } else if self.comparator.is_greater_than_or_equal(&b, &a) {
            first
        } else {
            StreamState::default()
        }
    }

    /// Mark one slice of `key` closed; commit parent state when none remain
    fn release(&mut self, key: &str) {
        let Some(remaining) = self.open.get_mut(key) else {
            return;
        };
        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            return;
        }
        self.open.remove(key);
        self.enforce_partition_limit();
        if self.open.is_empty() {
            self.partition_router.commit_parent_state();
        }
    }
}

/// Canonical, order-independent key for a partition
fn partition_key(partition: &JsonObject) -> String {
    let sorted: BTreeMap<&String, &JsonValue> = partition.iter().collect();
    serde_json::to_string(&sorted).unwrap_or_default()
}

impl std::fmt::Debug for PerPartitionCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerPartitionCursor")
            .field("partitions", &self.order)
            .field("open", &self.open.len())
            .field("max_partitions", &self.max_partitions)
            .finish_non_exhaustive()
    }
}

impl RequestOptionsProvider for PerPartitionCursor {
    fn request_options(
        &self,
        slice: Option<&StreamSlice>,
        next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        let slice = slice.ok_or_else(|| Error::missing_slice("PerPartitionCursor"))?;
        let cursor = self.cursor_for(&slice.partition).ok_or_else(|| {
            Error::cursor(format!("no cursor for partition of slice {slice}"))
        })?;
        let from_router = self
            .partition_router
            .request_options(Some(&slice.without_cursor_slice()), next_page_token)?;
        let from_cursor = cursor.request_options(Some(&slice.without_partition()), next_page_token)?;
        combine_options([from_router, from_cursor])
    }
}

#[async_trait]
impl Cursor for PerPartitionCursor {
    fn set_initial_state(&mut self, state: &StreamState) -> Result<()> {
        self.cursors.clear();
        self.order.clear();
        self.open.clear();
        self.global_state = None;

        match state.state.get(STATES_KEY) {
            Some(JsonValue::Array(entries)) => {
                for entry in entries {
                    let partition = match entry.get(PARTITION_KEY) {
                        Some(JsonValue::Object(p)) => p.clone(),
                        _ => {
                            return Err(Error::state(format!(
                                "per-partition state entry without a partition: {entry}"
                            )))
                        }
                    };
                    let cursor_state = match entry.get(CURSOR_KEY) {
                        Some(JsonValue::Object(c)) => c.clone(),
                        None | Some(JsonValue::Null) => JsonObject::new(),
                        Some(other) => {
                            return Err(Error::state(format!(
                                "per-partition cursor state must be an object, got {other}"
                            )))
                        }
                    };

                    let mut cursor = (self.factory)()?;
                    cursor.set_initial_state(&StreamState::new(cursor_state))?;
                    self.insert(partition_key(&partition), PartitionEntry { partition, cursor });
                }
                match state.state.get(GLOBAL_KEY) {
                    Some(JsonValue::Object(global)) => {
                        self.global_state = Some(StreamState::new(global.clone()));
                    }
                    None | Some(JsonValue::Null) => {}
                    Some(other) => {
                        return Err(Error::state(format!(
                            "per-partition fallback state must be an object, got {other}"
                        )));
                    }
                }
                self.enforce_partition_limit();
            }
            Some(other) => {
                return Err(Error::state(format!("'states' must be an array, got {other}")));
            }
            // A single state shared by every partition, e.g. after switching from a global cursor
            None if !state.state.is_empty() => {
                self.global_state = Some(StreamState::new(state.state.clone()));
            }
            None => {}
        }

        self.partition_router.set_initial_state(&state.parent_state)
    }

    fn observe(&mut self, slice: &StreamSlice, record: &Record) -> Observation {
        match self.cursors.get_mut(&partition_key(&slice.partition)) {
            Some(entry) => entry
                .cursor
                .observe(&slice.without_partition(), &record.without_partition()),
            None => Observation::Skipped(SkipReason::UnknownPartition),
        }
    }

    fn close_slice(&mut self, slice: &StreamSlice) -> Result<()> {
        let key = partition_key(&slice.partition);
        let entry = self
            .cursors
            .get_mut(&key)
            .ok_or_else(|| Error::cursor(format!("cannot close unknown partition: {slice}")))?;
        entry.cursor.close_slice(&slice.without_partition())?;
        self.release(&key);
        Ok(())
    }

    fn get_stream_state(&self) -> StreamState {
        let states: Vec<JsonValue> = self
            .order
            .iter()
            .filter_map(|key| self.cursors.get(key))
            .map(|entry| {
                let mut item = JsonObject::new();
                item.insert(
                    PARTITION_KEY.to_string(),
                    JsonValue::Object(entry.partition.clone()),
                );
                item.insert(
                    CURSOR_KEY.to_string(),
                    JsonValue::Object(entry.cursor.get_stream_state().state),
                );
                JsonValue::Object(item)
            })
            .collect();

        let mut state = JsonObject::new();
        state.insert(STATES_KEY.to_string(), JsonValue::Array(states));
        if let Some(global) = self.global_state.as_ref().filter(|g| !g.state.is_empty()) {
            state.insert(GLOBAL_KEY.to_string(), JsonValue::Object(global.state.clone()));
        }
        StreamState {
            state,
            parent_state: self.partition_router.get_stream_state(),
        }
    }

    fn should_be_synced(&self, record: &Record) -> bool {
        let partition = record
            .associated_slice
            .as_ref()
            .map(|slice| &slice.partition);
        match partition.and_then(|p| self.cursor_for(p)) {
            Some(cursor) => cursor.should_be_synced(&record.without_partition()),
            None => {
                warn!("Record belongs to no known partition; syncing it anyway");
                true
            }
        }
    }

    fn is_greater_than_or_equal(&self, first: &Record, second: &Record) -> bool {
        self.comparator
            .is_greater_than_or_equal(&first.without_partition(), &second.without_partition())
    }

    async fn stream_slices(&mut self) -> Result<SliceIter> {
        let partitions: Vec<StreamSlice> = self.partition_router.stream_slices().await?.collect();
        self.open.clear();
        let mut slices = Vec::new();

        for partition_slice in partitions {
            let key = partition_key(&partition_slice.partition);
            if !self.cursors.contains_key(&key) {
                let cursor = self.new_cursor()?;
                self.insert(
                    key.clone(),
                    PartitionEntry {
                        partition: partition_slice.partition.clone(),
                        cursor,
                    },
                );
            }
            let Some(entry) = self.cursors.get_mut(&key) else {
                continue;
            };
            let before = slices.len();
            for range in entry.cursor.stream_slices().await? {
                slices.push(StreamSlice::new(
                    partition_slice.partition.clone(),
                    range.cursor_slice,
                ));
            }
            let added = slices.len() - before;
            if added > 0 {
                *self.open.entry(key).or_default() += added;
            }
        }

        self.enforce_partition_limit();
        if self.open.is_empty() {
            self.partition_router.commit_parent_state();
        }

        debug!(
            partitions = self.cursors.len(),
            slices = slices.len(),
            "Generated per-partition slices"
        );
        Ok(SliceGenerator::from_slices(Box::new(slices.into_iter())).boxed())
    }
}
