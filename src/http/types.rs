//! Request/response descriptors and the transport boundary

use crate::error::{Error, Result};
use crate::request::RequestOptions;
use crate::types::{JsonObject, JsonValue, Method, StringMap};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// A fully shaped outgoing request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the transport's base URL, or an absolute URL
    pub path: String,
    /// Query parameters
    pub params: StringMap,
    /// Headers
    pub headers: StringMap,
    /// Form body fields
    pub body_data: StringMap,
    /// JSON body fields
    pub body_json: JsonObject,
}

impl HttpRequest {
    /// Create a request with no options
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Apply merged request options
    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.params.extend(options.params);
        self.headers.extend(options.headers);
        self.body_data.extend(options.body_data);
        self.body_json.extend(options.body_json);
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// JSON body, if any fields were set
    pub fn json_body(&self) -> Option<JsonValue> {
        (!self.body_json.is_empty()).then(|| JsonValue::Object(self.body_json.clone()))
    }
}

/// A received response
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response with an empty body
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Create a 200 response with a JSON body
    pub fn json_body(value: &JsonValue) -> Self {
        Self::new(200).with_body(value.to_string())
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header; invalid names or values are ignored
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header value as a string (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as UTF-8 text (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON; an empty body is `null`
    pub fn json(&self) -> Result<JsonValue> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonValue::Null);
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::decode(format!("response body is not valid JSON: {e}")))
    }
}

/// Sends shaped requests
///
/// Retries, backoff and authentication are the transport's concern; the
/// read loop treats whatever it returns as final for that page.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one request
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}
