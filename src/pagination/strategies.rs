//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{PaginationStrategy, StopCondition, StopTracker};
use crate::error::Result;
use crate::http::HttpResponse;
use crate::slice::Record;
use crate::types::{lookup_path, JsonValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Where a cursor strategy reads its continuation value from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorSource {
    /// Dot path into the decoded response body
    ResponsePath(String),
    /// Response header (e.g. `X-Next-Cursor`)
    Header(String),
    /// Field of the last record on the page (e.g. Stripe's `starting_after`)
    LastRecord(String),
}

/// Cursor-based pagination (e.g., Stripe, Slack)
///
/// Uses a cursor value from the response to fetch the next page.
/// A missing, null or empty cursor ends pagination.
#[derive(Debug, Clone)]
pub struct CursorPaginationStrategy {
    source: CursorSource,
    page_size: Option<usize>,
    stop: Option<StopTracker>,
}

impl CursorPaginationStrategy {
    /// Create a new cursor strategy
    pub fn new(source: CursorSource) -> Self {
        Self {
            source,
            page_size: None,
            stop: None,
        }
    }

    /// Read the cursor from a body path
    pub fn from_response_path(path: impl Into<String>) -> Self {
        Self::new(CursorSource::ResponsePath(path.into()))
    }

    /// Read the cursor from a header
    pub fn from_header(name: impl Into<String>) -> Self {
        Self::new(CursorSource::Header(name.into()))
    }

    /// Set page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set a stop condition checked before the cursor is read
    #[must_use]
    pub fn with_stop_condition(mut self, condition: StopCondition) -> Self {
        self.stop = Some(StopTracker::new(condition));
        self
    }

    fn extract(&self, response: &HttpResponse, last_record: Option<&Record>) -> Result<Option<JsonValue>> {
        let value = match &self.source {
            CursorSource::ResponsePath(path) => lookup_path(&response.json()?, path).cloned(),
            CursorSource::Header(name) => response
                .header(name)
                .map(|v| JsonValue::String(v.to_string())),
            CursorSource::LastRecord(field) => last_record.and_then(|r| r.get(field)).cloned(),
        };

        Ok(value.filter(|v| match v {
            JsonValue::Null => false,
            JsonValue::String(s) => !s.is_empty(),
            _ => true,
        }))
    }
}

impl PaginationStrategy for CursorPaginationStrategy {
    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        if let Some(stop) = &mut self.stop {
            if stop.should_stop(response, last_page_size)? {
                debug!("Stop condition {:?} met", stop.condition());
                return Ok(None);
            }
        }
        self.extract(response, last_record)
    }

    fn reset(&mut self) {
        if let Some(stop) = &mut self.stop {
            stop.reset();
        }
    }

    fn page_size(&self) -> Option<usize> {
        self.page_size
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination (e.g., SQL-style pagination)
///
/// The offset advances by the number of records on the last page. A short
/// page (fewer records than the page size) ends pagination; without a page
/// size only an empty page does.
#[derive(Debug, Clone)]
pub struct OffsetIncrement {
    page_size: Option<usize>,
    inject_on_first_request: bool,
    offset: usize,
}

impl OffsetIncrement {
    /// Create a new offset strategy
    pub fn new(page_size: Option<usize>) -> Self {
        Self {
            page_size,
            inject_on_first_request: false,
            offset: 0,
        }
    }

    /// Send `offset=0` with the first request
    #[must_use]
    pub fn inject_on_first_request(mut self, inject: bool) -> Self {
        self.inject_on_first_request = inject;
        self
    }
}

impl PaginationStrategy for OffsetIncrement {
    fn initial_token(&self) -> Option<JsonValue> {
        self.inject_on_first_request.then(|| JsonValue::from(0))
    }

    fn next_page_token(
        &mut self,
        _response: &HttpResponse,
        last_page_size: usize,
        _last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        if is_last_page(self.page_size, last_page_size) {
            return Ok(None);
        }
        self.offset += last_page_size;
        Ok(Some(JsonValue::from(self.offset)))
    }

    fn reset(&mut self) {
        self.offset = 0;
    }

    fn page_size(&self) -> Option<usize> {
        self.page_size
    }
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Page number pagination (e.g., traditional web pagination)
#[derive(Debug, Clone)]
pub struct PageIncrement {
    page_size: Option<usize>,
    start_from_page: u64,
    inject_on_first_request: bool,
    page: u64,
}

impl PageIncrement {
    /// Create a new page strategy counting from `start_from_page`
    pub fn new(page_size: Option<usize>, start_from_page: u64) -> Self {
        Self {
            page_size,
            start_from_page,
            inject_on_first_request: false,
            page: start_from_page,
        }
    }

    /// Send the start page with the first request
    #[must_use]
    pub fn inject_on_first_request(mut self, inject: bool) -> Self {
        self.inject_on_first_request = inject;
        self
    }
}

impl PaginationStrategy for PageIncrement {
    fn initial_token(&self) -> Option<JsonValue> {
        self.inject_on_first_request
            .then(|| JsonValue::from(self.start_from_page))
    }

    fn next_page_token(
        &mut self,
        _response: &HttpResponse,
        last_page_size: usize,
        _last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        if is_last_page(self.page_size, last_page_size) {
            return Ok(None);
        }
        self.page += 1;
        Ok(Some(JsonValue::from(self.page)))
    }

    fn reset(&mut self) {
        self.page = self.start_from_page;
    }

    fn page_size(&self) -> Option<usize> {
        self.page_size
    }
}

fn is_last_page(page_size: Option<usize>, last_page_size: usize) -> bool {
    match page_size {
        Some(size) => last_page_size < size,
        None => last_page_size == 0,
    }
}

// ============================================================================
// Link Header Pagination
// ============================================================================

/// Link header pagination (RFC 5988)
///
/// Extracts next page URL from the Link header.
/// Common in GitHub, GitLab APIs.
/// Format: `Link: <https://api.github.com/...?page=2>; rel="next", ...`
#[derive(Debug, Clone)]
pub struct LinkHeaderStrategy {
    rel: String,
    page_size: Option<usize>,
}

impl Default for LinkHeaderStrategy {
    fn default() -> Self {
        Self::new("next")
    }
}

impl LinkHeaderStrategy {
    /// Follow links with the given rel
    pub fn new(rel: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            page_size: None,
        }
    }

    /// Set page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

impl PaginationStrategy for LinkHeaderStrategy {
    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        _last_page_size: usize,
        _last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        Ok(response
            .header("link")
            .and_then(|header| parse_link_header(header, &self.rel))
            .map(JsonValue::String))
    }

    fn reset(&mut self) {}

    fn page_size(&self) -> Option<usize> {
        self.page_size
    }
}

/// Parse a Link header and extract the URL for the given rel
pub(crate) fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // <url>; rel="next", <url>; rel="prev"
    for part in header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(stripped) = segment.strip_prefix("rel=") {
                rel = Some(stripped.trim_matches('"').trim_matches('\''));
            }
        }

        if let (Some(u), Some(r)) = (url, rel) {
            if r.split_whitespace().any(|r| r == target_rel) {
                return Some(u.to_string());
            }
        }
    }

    None
}

// ============================================================================
// Stop Condition Decorator
// ============================================================================

/// Layers a stop condition over another strategy
///
/// The condition is evaluated first; the wrapped strategy only runs while it
/// says to continue.
pub struct StopConditionStrategy {
    inner: Box<dyn PaginationStrategy>,
    stop: StopTracker,
}

impl StopConditionStrategy {
    /// Wrap `inner` with `condition`
    pub fn new(inner: Box<dyn PaginationStrategy>, condition: StopCondition) -> Self {
        Self {
            inner,
            stop: StopTracker::new(condition),
        }
    }
}

impl PaginationStrategy for StopConditionStrategy {
    fn initial_token(&self) -> Option<JsonValue> {
        self.inner.initial_token()
    }

    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>> {
        if self.stop.should_stop(response, last_page_size)? {
            debug!("Stop condition {:?} met", self.stop.condition());
            return Ok(None);
        }
        self.inner
            .next_page_token(response, last_page_size, last_record)
    }

    fn reset(&mut self) {
        self.stop.reset();
        self.inner.reset();
    }

    fn page_size(&self) -> Option<usize> {
        self.inner.page_size()
    }
}

impl std::fmt::Debug for StopConditionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopConditionStrategy")
            .field("condition", self.stop.condition())
            .finish_non_exhaustive()
    }
}
