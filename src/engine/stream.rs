//! Declarative stream: one endpoint plus the components that slice,
//! paginate and track it

use crate::cursor::{Cursor, Observation};
use crate::decode::{JsonExtractor, RecordExtractor};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::pagination::{NoPagination, Paginator};
use crate::partition::{ParentStream, PartitionRouter, SinglePartitionRouter, StatefulStream};
use crate::request::{combine_options, RequestOptions};
use crate::slice::{Record, SliceIter, StreamSlice};
use crate::state::StreamState;
use crate::template::{self, TemplateContext};
use crate::types::{JsonObject, JsonValue, Method, StringMap};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What enumerates a stream's slices and shapes requests per slice
///
/// A cursor that needs partitions composes its own router
/// ([`GlobalCursor`](crate::cursor::GlobalCursor),
/// [`PerPartitionCursor`](crate::cursor::PerPartitionCursor)).
pub enum StreamSlicer {
    /// Partitions only; the stream cannot be read incrementally
    Router(Box<dyn PartitionRouter>),
    /// Cursor-driven slices and state
    Cursor(Box<dyn Cursor>),
}

impl StreamSlicer {
    async fn stream_slices(&mut self) -> Result<SliceIter> {
        match self {
            Self::Router(router) => router.stream_slices().await,
            Self::Cursor(cursor) => cursor.stream_slices().await,
        }
    }

    fn request_options(
        &self,
        slice: &StreamSlice,
        next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        match self {
            Self::Router(router) => router.request_options(Some(slice), next_page_token),
            Self::Cursor(cursor) => cursor.request_options(Some(slice), next_page_token),
        }
    }
}

/// Progress through the pages of one slice
#[derive(Debug)]
pub struct SlicePager {
    slice: StreamSlice,
    token: Option<JsonObject>,
    pages: usize,
    done: bool,
}

impl SlicePager {
    /// The slice being paged
    pub fn slice(&self) -> &StreamSlice {
        &self.slice
    }

    /// Pages fetched so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Token the next request will carry
    pub fn next_page_token(&self) -> Option<&JsonObject> {
        self.token.as_ref()
    }
}

/// Result of asking for the next page
#[derive(Debug)]
pub enum PageOutcome {
    /// Records of a fetched page, tagged with the slice
    Page(Vec<Record>),
    /// The paginator reported no further pages
    Done,
    /// Cancellation was requested before the page arrived
    Cancelled,
}

/// A stream read from one HTTP endpoint
pub struct DeclarativeStream {
    name: String,
    path: String,
    method: Method,
    params: StringMap,
    headers: StringMap,
    config: JsonValue,
    client_side_incremental: bool,
    transport: Arc<dyn HttpTransport>,
    extractor: Box<dyn RecordExtractor>,
    paginator: Box<dyn Paginator>,
    slicer: StreamSlicer,
}

impl DeclarativeStream {
    /// Create a stream reading `path` through `transport`
    ///
    /// Defaults: GET, whole body as records, no pagination, one empty slice.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            method: Method::GET,
            params: StringMap::new(),
            headers: StringMap::new(),
            config: JsonValue::Null,
            client_side_incremental: false,
            transport,
            extractor: Box::new(JsonExtractor::new()),
            paginator: Box::new(NoPagination),
            slicer: StreamSlicer::Router(Box::new(SinglePartitionRouter)),
        }
    }

    /// Set the HTTP method
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a static (optionally templated) query parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a static (optionally templated) header
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Values exposed to templates as `config`
    #[must_use]
    pub fn with_config(mut self, config: JsonValue) -> Self {
        self.config = config;
        self
    }

    /// Set the record extractor
    #[must_use]
    pub fn with_extractor(mut self, extractor: Box<dyn RecordExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Set the paginator
    #[must_use]
    pub fn with_paginator(mut self, paginator: Box<dyn Paginator>) -> Self {
        self.paginator = paginator;
        self
    }

    /// Slice by partitions only
    #[must_use]
    pub fn with_partition_router(mut self, router: Box<dyn PartitionRouter>) -> Self {
        self.slicer = StreamSlicer::Router(router);
        self
    }

    /// Slice and track state with a cursor
    #[must_use]
    pub fn with_cursor(mut self, cursor: Box<dyn Cursor>) -> Self {
        self.slicer = StreamSlicer::Cursor(cursor);
        self
    }

    /// Drop incremental records the cursor says were already synced
    #[must_use]
    pub fn with_client_side_incremental(mut self, enabled: bool) -> Self {
        self.client_side_incremental = enabled;
        self
    }

    /// Stream name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether records are filtered through `should_be_synced`
    pub fn is_client_side_incremental(&self) -> bool {
        self.client_side_incremental
    }

    /// The cursor, if the stream has one
    pub fn cursor(&self) -> Option<&dyn Cursor> {
        match &self.slicer {
            StreamSlicer::Cursor(cursor) => Some(cursor.as_ref()),
            StreamSlicer::Router(_) => None,
        }
    }

    fn cursor_mut(&mut self) -> Option<&mut Box<dyn Cursor>> {
        match &mut self.slicer {
            StreamSlicer::Cursor(cursor) => Some(cursor),
            StreamSlicer::Router(_) => None,
        }
    }

    /// Whether the stream can be read incrementally
    pub fn supports_incremental(&self) -> bool {
        self.cursor().is_some()
    }

    /// Seed the cursor from persisted state
    pub fn set_initial_state(&mut self, state: &StreamState) -> Result<()> {
        let name = self.name.clone();
        match &mut self.slicer {
            StreamSlicer::Cursor(cursor) => cursor.set_initial_state(state),
            StreamSlicer::Router(router) => router
                .set_initial_state(&state.parent_state)
                .map_err(|e| Error::partition(name, e.to_string())),
        }
    }

    /// Current state; empty for streams without a cursor
    pub fn get_stream_state(&self) -> StreamState {
        self.cursor()
            .map(|cursor| cursor.get_stream_state())
            .unwrap_or_default()
    }

    /// Enumerate this read's slices
    pub async fn stream_slices(&mut self) -> Result<SliceIter> {
        self.slicer.stream_slices().await
    }

    /// Feed a record to the cursor
    pub fn observe(&mut self, slice: &StreamSlice, record: &Record) -> Option<Observation> {
        self.cursor_mut().map(|cursor| cursor.observe(slice, record))
    }

    /// Mark a slice fully read
    pub fn close_slice(&mut self, slice: &StreamSlice) -> Result<()> {
        match self.cursor_mut() {
            Some(cursor) => cursor.close_slice(slice),
            None => Ok(()),
        }
    }

    /// Whether a record is at or after the cursor's watermark
    pub fn should_be_synced(&self, record: &Record) -> bool {
        self.cursor().map_or(true, |cursor| cursor.should_be_synced(record))
    }

    /// Shape the request for one page of one slice
    ///
    /// Static params and headers, paginator options and slicer options are
    /// merged; any key set by two of them is a configuration error. A path
    /// supplied by the paginator replaces the stream path.
    pub fn build_request(
        &self,
        slice: &StreamSlice,
        next_page_token: Option<&JsonObject>,
    ) -> Result<HttpRequest> {
        let ctx = TemplateContext::with_config(self.config.clone())
            .for_request(Some(slice), next_page_token);

        let path = match self.paginator.path(next_page_token) {
            Some(path) => path,
            None => template::render(&self.path, &ctx)?,
        };

        let base = RequestOptions {
            params: template::render_map(&self.params, &ctx)?.into_iter().collect(),
            headers: template::render_map(&self.headers, &ctx)?.into_iter().collect(),
            ..RequestOptions::default()
        };
        let options = combine_options([
            base,
            self.paginator.request_options(Some(slice), next_page_token)?,
            self.slicer.request_options(slice, next_page_token)?,
        ])?;

        Ok(HttpRequest::new(self.method, path).with_options(options))
    }

    /// Begin paging through a slice
    ///
    /// Resets the paginator so no page position leaks from a previous slice.
    pub fn start_slice(&mut self, slice: StreamSlice) -> SlicePager {
        self.paginator.reset();
        SlicePager {
            slice,
            token: self.paginator.initial_token(),
            pages: 0,
            done: false,
        }
    }

    /// Fetch the next page of a slice
    pub async fn next_page(
        &mut self,
        pager: &mut SlicePager,
        cancel: &CancellationToken,
    ) -> Result<PageOutcome> {
        if pager.done {
            return Ok(PageOutcome::Done);
        }

        let request = self.build_request(&pager.slice, pager.token.as_ref())?;
        debug!(
            "Stream '{}': requesting page {} of {}",
            self.name,
            pager.pages + 1,
            pager.slice
        );

        let response: HttpResponse = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(PageOutcome::Cancelled),
            response = self.transport.send(&request) => response?,
        };

        let records: Vec<Record> = self
            .extractor
            .extract_records(&response)?
            .into_iter()
            .map(|value| Record::from_value(value, Some(pager.slice.clone())))
            .collect();
        pager.pages += 1;

        pager.token = self
            .paginator
            .next_page_token(&response, records.len(), records.last())?;
        pager.done = pager.token.is_none();

        Ok(PageOutcome::Page(records))
    }
}

impl std::fmt::Debug for DeclarativeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclarativeStream")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("incremental", &self.supports_incremental())
            .finish_non_exhaustive()
    }
}

impl StatefulStream for DeclarativeStream {
    fn get_stream_state(&self) -> StreamState {
        DeclarativeStream::get_stream_state(self)
    }

    fn set_stream_state(&mut self, state: &StreamState) -> Result<()> {
        self.set_initial_state(state)
    }
}

#[async_trait]
impl ParentStream for DeclarativeStream {
    fn name(&self) -> &str {
        &self.name
    }

    /// Read every slice to completion, advancing the cursor if there is one
    async fn read_records(&mut self) -> Result<Vec<Record>> {
        let never = CancellationToken::new();
        let mut records = Vec::new();

        let slices = self.stream_slices().await?;
        for slice in slices {
            let mut pager = self.start_slice(slice);
            while let PageOutcome::Page(page) = self.next_page(&mut pager, &never).await? {
                for record in page {
                    self.observe(pager.slice(), &record);
                    records.push(record);
                }
            }
            self.close_slice(pager.slice())?;
        }

        debug!("Parent stream '{}' yielded {} records", self.name, records.len());
        Ok(records)
    }

    fn as_stateful(&self) -> Option<&dyn StatefulStream> {
        self.supports_incremental().then_some(self as &dyn StatefulStream)
    }

    fn as_stateful_mut(&mut self) -> Option<&mut dyn StatefulStream> {
        if self.supports_incremental() {
            Some(self)
        } else {
            None
        }
    }
}
