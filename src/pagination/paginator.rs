//! Paginators: where the continuation token goes

use super::types::{wrap_token, PaginationStrategy, Paginator, NEXT_PAGE_TOKEN};
use crate::error::{Error, Result};
use crate::http::HttpResponse;
use crate::request::{RequestOption, RequestOptions, RequestOptionsProvider};
use crate::slice::{Record, StreamSlice};
use crate::types::{value_to_string, JsonObject, JsonValue};
use tracing::debug;

/// Location the page token is injected into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTokenOption {
    /// The token replaces the request path
    Path,
    /// The token is injected as a param, header or body field
    Request(RequestOption),
}

/// Paginator combining a strategy with token and page-size injection
pub struct DefaultPaginator {
    strategy: Box<dyn PaginationStrategy>,
    page_token_option: PageTokenOption,
    page_size_option: Option<RequestOption>,
    url_base: Option<String>,
    token: Option<JsonValue>,
}

impl DefaultPaginator {
    /// Create a paginator
    pub fn new(strategy: Box<dyn PaginationStrategy>, page_token_option: PageTokenOption) -> Self {
        Self {
            strategy,
            page_token_option,
            page_size_option: None,
            url_base: None,
            token: None,
        }
    }

    /// Inject the strategy's page size at this option on every request
    #[must_use]
    pub fn with_page_size_option(mut self, option: RequestOption) -> Self {
        self.page_size_option = Some(option);
        self
    }

    /// Base URL stripped from path tokens so they resolve against the transport
    #[must_use]
    pub fn with_url_base(mut self, url_base: impl Into<String>) -> Self {
        self.url_base = Some(url_base.into());
        self
    }

    /// Reject a page size option whose strategy has no page size
    pub fn validate(&self) -> Result<()> {
        if self.page_size_option.is_some() && self.strategy.page_size().is_none() {
            return Err(Error::config(
                "page_size_option is set but the pagination strategy has no page_size",
            ));
        }
        Ok(())
    }

    fn current_token<'a>(&'a self, next_page_token: Option<&'a JsonObject>) -> Option<&'a JsonValue> {
        match next_page_token {
            Some(token) => token.get(NEXT_PAGE_TOKEN),
            None => self.token.as_ref(),
        }
        .filter(|t| !t.is_null())
    }
}

impl Paginator for DefaultPaginator {
    fn initial_token(&self) -> Option<JsonObject> {
        self.strategy.initial_token().map(wrap_token)
    }

    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonObject>> {
        self.token = self
            .strategy
            .next_page_token(response, last_page_size, last_record)?;
        debug!("Next page token: {:?}", self.token);
        Ok(self.token.clone().map(wrap_token))
    }

    fn path(&self, next_page_token: Option<&JsonObject>) -> Option<String> {
        if self.page_token_option != PageTokenOption::Path {
            return None;
        }
        let token = value_to_string(self.current_token(next_page_token)?);
        let path = match &self.url_base {
            Some(base) => token
                .strip_prefix(base.trim_end_matches('/'))
                .map(str::to_string)
                .unwrap_or(token),
            None => token,
        };
        Some(path)
    }

    fn reset(&mut self) {
        self.token = None;
        self.strategy.reset();
    }
}

impl RequestOptionsProvider for DefaultPaginator {
    fn request_options(
        &self,
        _slice: Option<&StreamSlice>,
        next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();
        if let PageTokenOption::Request(option) = &self.page_token_option {
            if let Some(token) = self.current_token(next_page_token) {
                options.inject(option, token);
            }
        }
        if let (Some(option), Some(size)) = (&self.page_size_option, self.strategy.page_size()) {
            options.inject(option, &JsonValue::from(size));
        }
        Ok(options)
    }
}

impl std::fmt::Debug for DefaultPaginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPaginator")
            .field("page_token_option", &self.page_token_option)
            .field("page_size_option", &self.page_size_option)
            .field("url_base", &self.url_base)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// No pagination - single request per slice
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPagination;

impl Paginator for NoPagination {
    fn next_page_token(
        &mut self,
        _response: &HttpResponse,
        _last_page_size: usize,
        _last_record: Option<&Record>,
    ) -> Result<Option<JsonObject>> {
        Ok(None)
    }

    fn reset(&mut self) {}
}

impl RequestOptionsProvider for NoPagination {}

/// Caps the number of pages read per slice
///
/// Layered over a real paginator: its stop signal still ends pagination
/// early, the cap only ends it late.
pub struct PaginatorTestReadDecorator {
    inner: Box<dyn Paginator>,
    maximum_number_of_pages: usize,
    pages_read: usize,
}

impl PaginatorTestReadDecorator {
    /// Default cap
    pub const DEFAULT_MAX_PAGES: usize = 5;

    /// Wrap `inner`, stopping after `maximum_number_of_pages` pages
    pub fn new(inner: Box<dyn Paginator>, maximum_number_of_pages: usize) -> Result<Self> {
        if maximum_number_of_pages == 0 {
            return Err(Error::invalid_value(
                "maximum_number_of_pages",
                "must be greater than 0",
            ));
        }
        Ok(Self {
            inner,
            maximum_number_of_pages,
            pages_read: 1,
        })
    }

    /// Pages read in the current slice
    pub fn pages_read(&self) -> usize {
        self.pages_read
    }
}

impl Paginator for PaginatorTestReadDecorator {
    fn initial_token(&self) -> Option<JsonObject> {
        self.inner.initial_token()
    }

    fn next_page_token(
        &mut self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
    ) -> Result<Option<JsonObject>> {
        if self.pages_read >= self.maximum_number_of_pages {
            debug!("Page limit {} reached", self.maximum_number_of_pages);
            return Ok(None);
        }
        self.pages_read += 1;
        self.inner
            .next_page_token(response, last_page_size, last_record)
    }

    fn path(&self, next_page_token: Option<&JsonObject>) -> Option<String> {
        self.inner.path(next_page_token)
    }

    fn reset(&mut self) {
        self.pages_read = 1;
        self.inner.reset();
    }
}

impl RequestOptionsProvider for PaginatorTestReadDecorator {
    fn request_options(
        &self,
        slice: Option<&StreamSlice>,
        next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        self.inner.request_options(slice, next_page_token)
    }
}

impl std::fmt::Debug for PaginatorTestReadDecorator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatorTestReadDecorator")
            .field("maximum_number_of_pages", &self.maximum_number_of_pages)
            .field("pages_read", &self.pages_read)
            .finish_non_exhaustive()
    }
}
