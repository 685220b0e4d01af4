//! Pagination types and traits
//!
//! Defines the two layers every paginator is built from: a
//! [`PaginationStrategy`] that computes the raw continuation value from a
//! response, and a [`Paginator`] that decides where that value goes in the
//! next request.

use crate::error::Result;
use crate::http::HttpResponse;
use crate::request::RequestOptionsProvider;
use crate::slice::Record;
use crate::types::{lookup_path, JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

/// Key under which a paginator wraps its continuation value
pub const NEXT_PAGE_TOKEN: &str = "next_page_token";

/// Wrap a raw token in the `{"next_page_token": token}` mapping
pub fn wrap_token(token: JsonValue) -> JsonObject {
    let mut map = JsonObject::new();
    map.insert(NEXT_PAGE_TOKEN.to_string(), token);
    map
}

/// Computes the next page's continuation value from the last response
///
/// Strategies are stateful (offsets, page numbers) and must return to their
/// construction state on [`reset`](Self::reset).
pub trait PaginationStrategy: Send + Sync {
    /// Token sent with the very first request, if any
    fn initial_token(&self) -> Option<JsonValue> {
        None
    }

    /// Derive the next token; `None` means the slice has no more pages
    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonValue>>;

    /// Return to the pre-first-request condition
    fn reset(&mut self);

    /// Number of records requested per page
    fn page_size(&self) -> Option<usize> {
        None
    }
}

/// Drives pagination for one slice and shapes requests with its token
///
/// The request-shaping hooks inject the token passed as `next_page_token`,
/// falling back to the last token this paginator produced.
pub trait Paginator: RequestOptionsProvider + Send + Sync {
    /// Token mapping for the first request, if the strategy injects one
    fn initial_token(&self) -> Option<JsonObject> {
        None
    }

    /// Inspect the last page and return `{"next_page_token": ..}` or `None`
    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonObject>>;

    /// Path override for the next request when the token is a path
    fn path(&self, _next_page_token: Option<&JsonObject>) -> Option<String> {
        None
    }

    /// Return to the pre-first-request condition
    fn reset(&mut self);
}

/// Stop conditions for pagination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopCondition {
    /// Stop when page is empty (no records)
    #[default]
    EmptyPage,

    /// Stop when a field has a specific value
    Field {
        /// Dot path to the field
        path: String,
        /// Expected value to stop
        value: JsonValue,
    },

    /// Stop when the records fetched reach the reported total
    TotalCount {
        /// Dot path to total count field
        path: String,
    },

    /// Stop when the pages fetched reach the reported page count
    TotalPages {
        /// Dot path to total pages field
        path: String,
    },
}

impl StopCondition {
    /// Create a field-based stop condition
    pub fn field(path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::Field {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Create a total count stop condition
    pub fn total_count(path: impl Into<String>) -> Self {
        Self::TotalCount { path: path.into() }
    }

    /// Create a total pages stop condition
    pub fn total_pages(path: impl Into<String>) -> Self {
        Self::TotalPages { path: path.into() }
    }

    /// Whether evaluating this condition needs the decoded body
    pub fn needs_body(&self) -> bool {
        !matches!(self, Self::EmptyPage)
    }
}

/// Result of checking a stop condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopResult {
    /// Continue pagination
    Continue,
    /// Stop pagination
    Stop,
}

impl StopResult {
    /// Check if we should continue
    pub fn should_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Check if we should stop
    pub fn should_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Running totals a stop condition is evaluated against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCounters {
    /// Pages seen so far, including the current one
    pub pages: u64,
    /// Records seen so far, including the current page
    pub records: u64,
}

impl PageCounters {
    /// Account for one more page
    pub fn record_page(&mut self, page_size: usize) {
        self.pages += 1;
        self.records += page_size as u64;
    }
}

/// Check a stop condition against a decoded response body
pub fn check_stop_condition(
    condition: &StopCondition,
    body: &JsonValue,
    last_page_size: usize,
    counters: PageCounters,
) -> StopResult {
    let stop = match condition {
        StopCondition::EmptyPage => last_page_size == 0,
        StopCondition::Field { path, value } => lookup_path(body, path) == Some(value),
        StopCondition::TotalCount { path } => {
            read_u64(body, path).is_some_and(|total| counters.records >= total)
        }
        StopCondition::TotalPages { path } => {
            read_u64(body, path).is_some_and(|total| counters.pages >= total)
        }
    };

    if stop {
        StopResult::Stop
    } else {
        StopResult::Continue
    }
}

/// Read a count that may be encoded as a number or a numeric string
fn read_u64(body: &JsonValue, path: &str) -> Option<u64> {
    match lookup_path(body, path)? {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A stop condition plus the counters it needs across pages
#[derive(Debug, Clone, Default)]
pub struct StopTracker {
    condition: StopCondition,
    counters: PageCounters,
}

impl StopTracker {
    /// Track a condition from a clean slate
    pub fn new(condition: StopCondition) -> Self {
        Self {
            condition,
            counters: PageCounters::default(),
        }
    }

    /// The tracked condition
    pub fn condition(&self) -> &StopCondition {
        &self.condition
    }

    /// Account for the page and evaluate the condition
    pub fn should_stop(&mut self, response: &HttpResponse, last_page_size: usize) -> Result<bool> {
        self.counters.record_page(last_page_size);
        let body = if self.condition.needs_body() {
            response.json()?
        } else {
            JsonValue::Null
        };
        Ok(check_stop_condition(&self.condition, &body, last_page_size, self.counters).should_stop())
    }

    /// Forget every page seen so far
    pub fn reset(&mut self) {
        self.counters = PageCounters::default();
    }
}
