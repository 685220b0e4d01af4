//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use super::types::{ParentStates, ParentStream, PartitionRouter};
use crate::error::{Error, Result};
use crate::request::{combine_options, RequestOption, RequestOptions, RequestOptionsProvider};
use crate::slice::{SliceIter, StreamSlice};
use crate::types::{lookup_path, value_to_string, JsonObject, JsonValue};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, warn};

// ============================================================================
// Single Partition Router
// ============================================================================

/// Router for unpartitioned streams: one empty partition
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePartitionRouter;

impl RequestOptionsProvider for SinglePartitionRouter {}

#[async_trait]
impl PartitionRouter for SinglePartitionRouter {
    async fn stream_slices(&mut self) -> Result<SliceIter> {
        Ok(Box::new(std::iter::once(StreamSlice::default())))
    }
}

// ============================================================================
// List Partition Router
// ============================================================================

/// List-based partition router
///
/// Creates one partition per static value.
#[derive(Debug, Clone)]
pub struct ListPartitionRouter {
    /// Partition values
    values: Vec<JsonValue>,
    /// Key the value is stored under in the partition
    cursor_field: String,
    /// Optional injection of the value into requests
    request_option: Option<RequestOption>,
}

impl ListPartitionRouter {
    /// Create a new list router
    pub fn new<V: Into<JsonValue>>(values: Vec<V>, cursor_field: impl Into<String>) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            cursor_field: cursor_field.into(),
            request_option: None,
        }
    }

    /// Inject the partition value into requests
    #[must_use]
    pub fn with_request_option(mut self, option: RequestOption) -> Self {
        self.request_option = Some(option);
        self
    }
}

impl RequestOptionsProvider for ListPartitionRouter {
    fn request_options(
        &self,
        slice: Option<&StreamSlice>,
        _next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();
        if let (Some(option), Some(value)) = (
            &self.request_option,
            slice.and_then(|s| s.partition.get(&self.cursor_field)),
        ) {
            options.inject(option, value);
        }
        Ok(options)
    }
}

#[async_trait]
impl PartitionRouter for ListPartitionRouter {
    async fn stream_slices(&mut self) -> Result<SliceIter> {
        let field = self.cursor_field.clone();
        let slices: Vec<StreamSlice> = self
            .values
            .iter()
            .map(|value| {
                let mut partition = JsonObject::new();
                partition.insert(field.clone(), value.clone());
                StreamSlice::from_partition(partition)
            })
            .collect();
        Ok(Box::new(slices.into_iter()))
    }
}

// ============================================================================
// Substream Partition Router
// ============================================================================

/// How one parent stream's records become partitions
pub struct ParentStreamConfig {
    /// Parent stream to read
    pub stream: Box<dyn ParentStream>,
    /// Field in parent records (dot path, e.g. `data.id`)
    pub parent_key: String,
    /// Key the parent value is stored under in the partition
    pub partition_field: String,
    /// Optional injection of the partition value into child requests
    pub request_option: Option<RequestOption>,
    /// Read the parent incrementally and persist its state
    pub incremental_dependency: bool,
}

impl ParentStreamConfig {
    /// Create a config mapping `parent_key` to `partition_field`
    pub fn new(
        stream: Box<dyn ParentStream>,
        parent_key: impl Into<String>,
        partition_field: impl Into<String>,
    ) -> Self {
        Self {
            stream,
            parent_key: parent_key.into(),
            partition_field: partition_field.into(),
            request_option: None,
            incremental_dependency: false,
        }
    }

    /// Inject the partition value into child requests
    #[must_use]
    pub fn with_request_option(mut self, option: RequestOption) -> Self {
        self.request_option = Some(option);
        self
    }

    /// Track the parent's state alongside the child's
    #[must_use]
    pub fn with_incremental_dependency(mut self, enabled: bool) -> Self {
        self.incremental_dependency = enabled;
        self
    }
}

impl std::fmt::Debug for ParentStreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentStreamConfig")
            .field("stream", &self.stream.name())
            .field("parent_key", &self.parent_key)
            .field("partition_field", &self.partition_field)
            .field("request_option", &self.request_option)
            .field("incremental_dependency", &self.incremental_dependency)
            .finish()
    }
}

/// Parent stream-based partition router
///
/// Creates one partition per distinct parent key value, in the order the
/// parents yield them.
///
/// Reading a parent advances its state before any child partition has been
/// read, so that state is held back as pending until the owning cursor
/// commits it.
#[derive(Debug)]
pub struct SubstreamPartitionRouter {
    parents: Vec<ParentStreamConfig>,
    committed: ParentStates,
    pending: Option<ParentStates>,
}

impl SubstreamPartitionRouter {
    /// Create a router over one or more parents
    pub fn new(parents: Vec<ParentStreamConfig>) -> Self {
        Self {
            parents,
            committed: ParentStates::new(),
            pending: None,
        }
    }

    /// Live state of the incremental parents
    fn current_parent_state(&self) -> ParentStates {
        self.parents
            .iter()
            .filter(|parent| parent.incremental_dependency)
            .filter_map(|parent| {
                let state = parent.stream.as_stateful()?.get_stream_state();
                Some((parent.stream.name().to_string(), state))
            })
            .collect()
    }
}

/// Extract a partition value from a parent record by dot path
pub fn extract_parent_key(record: &JsonObject, key: &str) -> Option<JsonValue> {
    let value = match record.get(key) {
        Some(v) => v,
        None => {
            let mut parts = key.split('.');
            let first = record.get(parts.next()?)?;
            lookup_path(first, &parts.collect::<Vec<_>>().join("."))?
        }
    };

    match value {
        JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_) => Some(value.clone()),
        _ => None,
    }
}

impl RequestOptionsProvider for SubstreamPartitionRouter {
    fn request_options(
        &self,
        slice: Option<&StreamSlice>,
        _next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        let Some(slice) = slice else {
            return Ok(RequestOptions::new());
        };
        let parts = self.parents.iter().filter_map(|parent| {
            let option = parent.request_option.as_ref()?;
            let value = slice.partition.get(&parent.partition_field)?;
            Some(RequestOptions::new().with(option, value.clone()))
        });
        combine_options(parts)
    }
}

#[async_trait]
impl PartitionRouter for SubstreamPartitionRouter {
    async fn stream_slices(&mut self) -> Result<SliceIter> {
        let mut slices = Vec::new();

        for parent in &mut self.parents {
            let name = parent.stream.name().to_string();
            let records = parent.stream.read_records().await?;
            let mut seen = HashSet::new();
            let mut skipped = 0usize;

            for record in &records {
                let Some(value) = extract_parent_key(&record.data, &parent.parent_key) else {
                    skipped += 1;
                    continue;
                };
                // Deduplicate
                if seen.insert(value_to_string(&value)) {
                    let mut partition = JsonObject::new();
                    partition.insert(parent.partition_field.clone(), value);
                    slices.push(StreamSlice::from_partition(partition));
                }
            }

            if skipped > 0 {
                warn!(
                    parent = %name,
                    parent_key = %parent.parent_key,
                    skipped,
                    "Parent records without a partition key were ignored"
                );
            }
            debug!(parent = %name, partitions = seen.len(), "Enumerated parent partitions");
        }

        self.pending = Some(self.current_parent_state());
        Ok(Box::new(slices.into_iter()))
    }

    fn set_initial_state(&mut self, parent_state: &ParentStates) -> Result<()> {
        for parent in &mut self.parents {
            if !parent.incremental_dependency {
                continue;
            }
            let name = parent.stream.name().to_string();
            let Some(state) = parent_state.get(&name) else {
                continue;
            };
            let stateful = parent.stream.as_stateful_mut().ok_or_else(|| {
                Error::partition(
                    name.clone(),
                    "incremental_dependency requires a parent stream that tracks state",
                )
            })?;
            stateful.set_stream_state(state)?;
        }
        self.committed = self.current_parent_state();
        self.pending = None;
        Ok(())
    }

    fn get_stream_state(&self) -> ParentStates {
        self.committed.clone()
    }

    fn commit_parent_state(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(parents = pending.len(), "Committing parent state");
            self.committed = pending;
        }
    }
}

// ============================================================================
// Cartesian Product Router
// ============================================================================

/// Router yielding every combination of its children's partitions
///
/// Partitions are merged; children must use disjoint partition keys.
pub struct CartesianProductRouter {
    routers: Vec<Box<dyn PartitionRouter>>,
}

impl CartesianProductRouter {
    /// Combine several routers; the first one forms the outer loop
    pub fn new(routers: Vec<Box<dyn PartitionRouter>>) -> Self {
        Self { routers }
    }
}

impl std::fmt::Debug for CartesianProductRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartesianProductRouter")
            .field("routers", &self.routers.len())
            .finish()
    }
}

impl RequestOptionsProvider for CartesianProductRouter {
    fn request_options(
        &self,
        slice: Option<&StreamSlice>,
        next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        let mut parts = Vec::with_capacity(self.routers.len());
        for router in &self.routers {
            parts.push(router.request_options(slice, next_page_token)?);
        }
        combine_options(parts)
    }
}

#[async_trait]
impl PartitionRouter for CartesianProductRouter {
    async fn stream_slices(&mut self) -> Result<SliceIter> {
        let mut combined = vec![JsonObject::new()];

        for router in &mut self.routers {
            let partitions: Vec<StreamSlice> = router.stream_slices().await?.collect();
            let mut next = Vec::with_capacity(combined.len() * partitions.len());
            for prefix in &combined {
                for slice in &partitions {
                    let mut merged = prefix.clone();
                    for (key, value) in &slice.partition {
                        if merged.insert(key.clone(), value.clone()).is_some() {
                            return Err(Error::config(format!(
                                "partition key '{key}' is produced by more than one router"
                            )));
                        }
                    }
                    next.push(merged);
                }
            }
            combined = next;
        }

        if self.routers.is_empty() {
            combined.clear();
        }
        Ok(Box::new(combined.into_iter().map(StreamSlice::from_partition)))
    }

    fn set_initial_state(&mut self, parent_state: &ParentStates) -> Result<()> {
        for router in &mut self.routers {
            router.set_initial_state(parent_state)?;
        }
        Ok(())
    }

    fn get_stream_state(&self) -> ParentStates {
        let mut states = ParentStates::new();
        for router in &self.routers {
            states.extend(router.get_stream_state());
        }
        states
    }

    fn commit_parent_state(&mut self) {
        for router in &mut self.routers {
            router.commit_parent_state();
        }
    }
}
