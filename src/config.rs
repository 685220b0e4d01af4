//! Declarative stream definitions
//!
//! YAML (or JSON) documents describing streams are deserialised into the
//! types below and then built into runtime components. Values in `path`,
//! `params`, `headers` and the datetime cursor bounds may use
//! `{{ config.x }}` placeholders.
//!
//! ```yaml
//! base_url: https://api.example.com
//! streams:
//!   - name: orders
//!     path: /customers/{{ stream_partition.customer_id }}/orders
//!     record_selector:
//!       record_path: data
//!     paginator:
//!       strategy:
//!         type: cursor
//!         cursor_value:
//!           response_path: meta.next
//!       page_token_option:
//!         type: request_option
//!         field_name: after
//!         inject_into: request_parameter
//!     incremental:
//!       type: datetime
//!       cursor_field: updated_at
//!       start_datetime: "{{ config.start_date }}"
//!       step: P1D
//!       cursor_granularity: PT1S
//!     partition_router:
//!       type: substream
//!       parents:
//!         - stream: customers
//!           parent_key: id
//!           partition_field: customer_id
//! ```

use crate::cursor::{
    parse_datetime, parse_duration, Cursor, CursorFactory, DatetimeBasedCursor, GlobalCursor,
    PerPartitionCursor, Step, ValueCursor,
};
use crate::decode::DecoderConfig;
use crate::engine::DeclarativeStream;
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClient, HttpClientConfig, HttpTransport};
use crate::pagination::{
    CursorPaginationStrategy, CursorSource, DefaultPaginator, LinkHeaderStrategy,
    OffsetIncrement, PageIncrement, PageTokenOption, PaginationStrategy, Paginator,
    PaginatorTestReadDecorator, StopCondition, StopConditionStrategy,
};
use crate::partition::{
    CartesianProductRouter, ListPartitionRouter, ParentStreamConfig, PartitionRouter,
    SubstreamPartitionRouter,
};
use crate::request::RequestOption;
use crate::template::{self, TemplateContext};
use crate::types::{BackoffType, JsonValue, Method, StringMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Connector Definition
// ============================================================================

/// A set of streams sharing one API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorDefinition {
    /// Base URL request paths are resolved against
    pub base_url: String,
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpDefinition,
    /// Stream definitions
    pub streams: Vec<StreamDefinition>,
}

impl ConnectorDefinition {
    /// Parse a definition from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let definition: Self = serde_yaml::from_str(yaml)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Load a definition from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading connector definition {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Check stream names and parent references
    pub fn validate(&self) -> Result<()> {
        let mut seen = Vec::new();
        for stream in &self.streams {
            if stream.name.is_empty() {
                return Err(Error::missing_field("streams[].name"));
            }
            if seen.contains(&stream.name.as_str()) {
                return Err(Error::config(format!(
                    "stream '{}' is defined twice",
                    stream.name
                )));
            }
            seen.push(stream.name.as_str());
        }

        for stream in &self.streams {
            for parent in stream.parent_names() {
                if self.stream(parent).is_none() {
                    return Err(Error::config(format!(
                        "stream '{}' depends on unknown parent stream '{parent}'",
                        stream.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Find a stream definition by name
    pub fn stream(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Build an HTTP client for this connector
    pub fn build_client(&self) -> Result<HttpClient> {
        HttpClient::with_config(self.http.to_client_config(&self.base_url))
    }

    /// Build one stream, together with any parent streams it reads
    pub fn build_stream(
        &self,
        name: &str,
        transport: Arc<dyn HttpTransport>,
        config: &JsonValue,
    ) -> Result<DeclarativeStream> {
        let mut visiting = Vec::new();
        self.build_stream_inner(name, &transport, config, &mut visiting)
    }

    fn build_stream_inner(
        &self,
        name: &str,
        transport: &Arc<dyn HttpTransport>,
        config: &JsonValue,
        visiting: &mut Vec<String>,
    ) -> Result<DeclarativeStream> {
        if visiting.iter().any(|v| v == name) {
            return Err(Error::config(format!(
                "parent streams form a cycle: {} -> {name}",
                visiting.join(" -> ")
            )));
        }
        let definition = self
            .stream(name)
            .ok_or_else(|| Error::config(format!("unknown stream '{name}'")))?;

        visiting.push(name.to_string());
        let mut build_parent = |parent: &str| -> Result<DeclarativeStream> {
            self.build_stream_inner(parent, transport, config, visiting)
        };
        let stream = definition.build_with(Arc::clone(transport), config, &mut build_parent);
        visiting.pop();
        stream
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpDefinition {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for retryable statuses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff between retries
    #[serde(default)]
    pub backoff: BackoffType,
    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Headers sent with every request
    #[serde(default)]
    pub headers: StringMap,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            headers: StringMap::new(),
        }
    }
}

impl HttpDefinition {
    /// Client configuration for `base_url`
    pub fn to_client_config(&self, base_url: &str) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries)
            .backoff(
                self.backoff,
                Duration::from_millis(self.initial_backoff_ms),
                Duration::from_millis(self.max_backoff_ms),
            );
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }
        builder.build()
    }
}

// ============================================================================
// Stream Definition
// ============================================================================

/// One stream: endpoint, extraction, pagination and incremental settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// Request path; may contain placeholders
    pub path: String,
    /// HTTP method
    #[serde(default)]
    pub method: Method,
    /// Static query parameters
    #[serde(default)]
    pub params: StringMap,
    /// Static headers
    #[serde(default)]
    pub headers: StringMap,
    /// Where records live in the response
    #[serde(default)]
    pub record_selector: DecoderConfig,
    /// Pagination; absent means a single page
    #[serde(default)]
    pub paginator: Option<PaginatorDefinition>,
    /// Incremental cursor
    #[serde(default)]
    pub incremental: Option<CursorDefinition>,
    /// Partition router
    #[serde(default)]
    pub partition_router: Option<PartitionRouterDefinition>,
    /// Share one cursor across all partitions instead of one per partition
    #[serde(default)]
    pub global_cursor: bool,
    /// Cap on partitions kept by a per-partition cursor
    #[serde(default)]
    pub max_partitions: Option<usize>,
    /// Drop records older than the persisted cursor value
    #[serde(default)]
    pub client_side_incremental: bool,
}

impl StreamDefinition {
    /// Build the stream; substream routers are rejected since their parents
    /// live in the connector definition
    pub fn build(
        &self,
        transport: Arc<dyn HttpTransport>,
        config: &JsonValue,
    ) -> Result<DeclarativeStream> {
        let name = self.name.clone();
        self.build_with(transport, config, &mut |parent: &str| -> Result<DeclarativeStream> {
            Err(Error::config(format!(
                "stream '{name}' reads parent '{parent}'; build it through its connector definition"
            )))
        })
    }

    fn build_with(
        &self,
        transport: Arc<dyn HttpTransport>,
        config: &JsonValue,
        build_parent: &mut dyn FnMut(&str) -> Result<DeclarativeStream>,
    ) -> Result<DeclarativeStream> {
        let mut stream = DeclarativeStream::new(&self.name, &self.path, transport)
            .with_method(self.method)
            .with_config(config.clone())
            .with_extractor(self.record_selector.build())
            .with_client_side_incremental(self.client_side_incremental);
        for (key, value) in &self.params {
            stream = stream.with_param(key, value);
        }
        for (key, value) in &self.headers {
            stream = stream.with_header(key, value);
        }

        if let Some(paginator) = &self.paginator {
            stream = stream.with_paginator(paginator.build()?);
        }

        let router = self
            .partition_router
            .as_ref()
            .map(|def| def.build(&mut *build_parent))
            .transpose()?;

        stream = match (&self.incremental, router) {
            (None, None) => stream,
            (None, Some(router)) => stream.with_partition_router(router),
            (Some(cursor), None) => stream.with_cursor(cursor.build(config)?),
            (Some(cursor), Some(router)) if self.global_cursor => {
                stream.with_cursor(Box::new(GlobalCursor::new(cursor.build(config)?, router)))
            }
            (Some(cursor), Some(router)) => {
                let definition = cursor.clone();
                let config = config.clone();
                let factory: CursorFactory = Box::new(move || definition.build(&config));
                let mut cursor = PerPartitionCursor::new(factory, router)?;
                if let Some(limit) = self.max_partitions {
                    cursor = cursor.with_max_partitions(limit)?;
                }
                stream.with_cursor(Box::new(cursor))
            }
        };

        debug!("Built stream {:?}", stream);
        Ok(stream)
    }

    fn parent_names(&self) -> Vec<&str> {
        self.partition_router
            .as_ref()
            .map(PartitionRouterDefinition::parent_names)
            .unwrap_or_default()
    }
}

// ============================================================================
// Cursor Definitions
// ============================================================================

/// Incremental cursor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CursorDefinition {
    /// Date-window cursor
    Datetime {
        /// Record field holding the cursor value
        cursor_field: String,
        /// Start of the sync window; may contain placeholders
        start_datetime: String,
        /// End of the sync window; defaults to now
        #[serde(default)]
        end_datetime: Option<String>,
        /// Slice width (`P1D`, `1d`)
        #[serde(default)]
        step: Option<String>,
        /// Smallest distinguishable cursor increment (`PT1S`)
        #[serde(default)]
        cursor_granularity: Option<String>,
        /// Re-read window subtracted from the persisted state
        #[serde(default)]
        lookback_window: Option<String>,
        /// Output format for slice bounds and state
        #[serde(default)]
        datetime_format: Option<String>,
        /// Extra formats accepted when parsing record values
        #[serde(default)]
        cursor_datetime_formats: Vec<String>,
        /// Inject the slice start into requests
        #[serde(default)]
        start_time_option: Option<RequestOption>,
        /// Inject the slice end into requests
        #[serde(default)]
        end_time_option: Option<RequestOption>,
    },
    /// Monotonic numeric or string field
    Value {
        /// Record field holding the cursor value
        cursor_field: String,
        /// Inject the watermark into requests
        #[serde(default)]
        request_option: Option<RequestOption>,
    },
}

impl CursorDefinition {
    /// Build a fresh cursor
    pub fn build(&self, config: &JsonValue) -> Result<Box<dyn Cursor>> {
        match self {
            Self::Datetime {
                cursor_field,
                start_datetime,
                end_datetime,
                step,
                cursor_granularity,
                lookback_window,
                datetime_format,
                cursor_datetime_formats,
                start_time_option,
                end_time_option,
            } => {
                let ctx = TemplateContext::with_config(config.clone());
                let mut cursor = DatetimeBasedCursor::new(
                    cursor_field,
                    render_datetime("start_datetime", start_datetime, &ctx)?,
                )
                .with_cursor_datetime_formats(cursor_datetime_formats.clone());

                if let Some(end) = end_datetime {
                    cursor = cursor.with_end_datetime(render_datetime("end_datetime", end, &ctx)?);
                }
                if let Some(step) = step {
                    cursor = cursor.with_step(Step::parse(step)?);
                }
                if let Some(granularity) = cursor_granularity {
                    cursor = cursor.with_cursor_granularity(parse_duration(granularity)?);
                }
                if let Some(lookback) = lookback_window {
                    cursor = cursor.with_lookback_window(parse_duration(lookback)?);
                }
                if let Some(format) = datetime_format {
                    cursor = cursor.with_datetime_format(format);
                }
                if let Some(option) = start_time_option {
                    cursor = cursor.with_start_time_option(option.clone());
                }
                if let Some(option) = end_time_option {
                    cursor = cursor.with_end_time_option(option.clone());
                }
                cursor.validate()?;
                Ok(Box::new(cursor))
            }
            Self::Value {
                cursor_field,
                request_option,
            } => {
                let mut cursor = ValueCursor::new(cursor_field);
                if let Some(option) = request_option {
                    cursor = cursor.with_request_option(option.clone());
                }
                Ok(Box::new(cursor))
            }
        }
    }
}

fn render_datetime(field: &str, value: &str, ctx: &TemplateContext) -> Result<DateTime<Utc>> {
    let rendered = template::render(value, ctx)?;
    parse_datetime(&rendered, &[])
        .ok_or_else(|| Error::invalid_value(field, format!("'{rendered}' is not a datetime")))
}

// ============================================================================
// Partition Router Definitions
// ============================================================================

/// Partition router settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionRouterDefinition {
    /// Static list of values
    List {
        /// Partition values
        values: Vec<JsonValue>,
        /// Key the value is stored under in the partition
        cursor_field: String,
        /// Inject the value into requests
        #[serde(default)]
        request_option: Option<RequestOption>,
    },
    /// Partitions taken from parent stream records
    Substream {
        /// Parent streams
        parents: Vec<ParentDefinition>,
    },
    /// Every combination of several routers' partitions
    CartesianProduct {
        /// Routers to combine
        routers: Vec<PartitionRouterDefinition>,
    },
}

/// One parent of a substream router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentDefinition {
    /// Name of the parent stream in the same connector
    pub stream: String,
    /// Dot path of the value in parent records
    pub parent_key: String,
    /// Partition key for the value
    pub partition_field: String,
    /// Inject the value into child requests
    #[serde(default)]
    pub request_option: Option<RequestOption>,
    /// Read the parent incrementally and persist its state
    #[serde(default)]
    pub incremental_dependency: bool,
}

impl PartitionRouterDefinition {
    fn build(
        &self,
        build_parent: &mut dyn FnMut(&str) -> Result<DeclarativeStream>,
    ) -> Result<Box<dyn PartitionRouter>> {
        Ok(match self {
            Self::List {
                values,
                cursor_field,
                request_option,
            } => {
                let mut router = ListPartitionRouter::new(values.clone(), cursor_field);
                if let Some(option) = request_option {
                    router = router.with_request_option(option.clone());
                }
                Box::new(router)
            }
            Self::Substream { parents } => {
                let parents = parents
                    .iter()
                    .map(|parent| {
                        let stream = build_parent(&parent.stream)?;
                        let mut config = ParentStreamConfig::new(
                            Box::new(stream),
                            &parent.parent_key,
                            &parent.partition_field,
                        )
                        .with_incremental_dependency(parent.incremental_dependency);
                        if let Some(option) = &parent.request_option {
                            config = config.with_request_option(option.clone());
                        }
                        Ok(config)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Box::new(SubstreamPartitionRouter::new(parents))
            }
            Self::CartesianProduct { routers } => {
                let routers = routers
                    .iter()
                    .map(|router| router.build(&mut *build_parent))
                    .collect::<Result<Vec<_>>>()?;
                Box::new(CartesianProductRouter::new(routers))
            }
        })
    }

    fn parent_names(&self) -> Vec<&str> {
        match self {
            Self::List { .. } => Vec::new(),
            Self::Substream { parents } => parents.iter().map(|p| p.stream.as_str()).collect(),
            Self::CartesianProduct { routers } => {
                routers.iter().flat_map(Self::parent_names).collect()
            }
        }
    }
}

// ============================================================================
// Paginator Definitions
// ============================================================================

/// Pagination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatorDefinition {
    /// How the next token is computed
    pub strategy: StrategyDefinition,
    /// Where the token goes
    pub page_token_option: PageTokenDefinition,
    /// Where the page size goes
    #[serde(default)]
    pub page_size_option: Option<RequestOption>,
    /// Prefix stripped from path tokens
    #[serde(default)]
    pub url_base: Option<String>,
    /// Extra stop condition layered over the strategy
    #[serde(default)]
    pub stop_condition: Option<StopCondition>,
    /// Stop after this many pages regardless of the API (test reads)
    #[serde(default)]
    pub maximum_pages: Option<usize>,
}

/// Pagination strategy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyDefinition {
    /// Token read from the response or the last record
    Cursor {
        /// Source of the token
        cursor_value: CursorSource,
        /// Page size sent with every request
        #[serde(default)]
        page_size: Option<usize>,
    },
    /// Record offset
    Offset {
        /// Page size
        #[serde(default)]
        page_size: Option<usize>,
        /// Send offset 0 on the first request
        #[serde(default)]
        inject_on_first_request: bool,
    },
    /// Page number
    Page {
        /// Page size
        #[serde(default)]
        page_size: Option<usize>,
        /// First page number
        #[serde(default = "default_start_page")]
        start_from_page: u64,
        /// Send the first page number on the first request
        #[serde(default)]
        inject_on_first_request: bool,
    },
    /// RFC 8288 `Link` header
    LinkHeader {
        /// Relation to follow
        #[serde(default = "default_link_rel")]
        rel: String,
        /// Page size
        #[serde(default)]
        page_size: Option<usize>,
    },
}

fn default_start_page() -> u64 {
    1
}

fn default_link_rel() -> String {
    "next".to_string()
}

/// Location of the page token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageTokenDefinition {
    /// The token is the next request path
    Path,
    /// The token is a request option
    RequestOption(RequestOption),
}

impl StrategyDefinition {
    fn build(&self) -> Box<dyn PaginationStrategy> {
        match self {
            Self::Cursor {
                cursor_value,
                page_size,
            } => {
                let mut strategy = CursorPaginationStrategy::new(cursor_value.clone());
                if let Some(size) = page_size {
                    strategy = strategy.with_page_size(*size);
                }
                Box::new(strategy)
            }
            Self::Offset {
                page_size,
                inject_on_first_request,
            } => Box::new(
                OffsetIncrement::new(*page_size).inject_on_first_request(*inject_on_first_request),
            ),
            Self::Page {
                page_size,
                start_from_page,
                inject_on_first_request,
            } => Box::new(
                PageIncrement::new(*page_size, *start_from_page)
                    .inject_on_first_request(*inject_on_first_request),
            ),
            Self::LinkHeader { rel, page_size } => {
                let mut strategy = LinkHeaderStrategy::new(rel);
                if let Some(size) = page_size {
                    strategy = strategy.with_page_size(*size);
                }
                Box::new(strategy)
            }
        }
    }
}

impl PaginatorDefinition {
    /// Build the paginator
    pub fn build(&self) -> Result<Box<dyn Paginator>> {
        let mut strategy = self.strategy.build();
        if let Some(condition) = &self.stop_condition {
            strategy = Box::new(StopConditionStrategy::new(strategy, condition.clone()));
        }

        let option = match &self.page_token_option {
            PageTokenDefinition::Path => PageTokenOption::Path,
            PageTokenDefinition::RequestOption(option) => PageTokenOption::Request(option.clone()),
        };
        let mut paginator = DefaultPaginator::new(strategy, option);
        if let Some(option) = &self.page_size_option {
            paginator = paginator.with_page_size_option(option.clone());
        }
        if let Some(base) = &self.url_base {
            paginator = paginator.with_url_base(base);
        }
        paginator.validate()?;

        Ok(match self.maximum_pages {
            Some(max) => Box::new(PaginatorTestReadDecorator::new(Box::new(paginator), max)?),
            None => Box::new(paginator),
        })
    }
}
