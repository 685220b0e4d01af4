//! HTTP transport module
//!
//! Defines the request/response descriptors the read loop exchanges with the
//! transport, and a reqwest-backed client implementing it.
//!
//! # Features
//!
//! - **Descriptors**: `HttpRequest` built from merged request options,
//!   `HttpResponse` exposing status, headers and body bytes/JSON
//! - **Automatic Retries**: Configurable retry logic with backoff
//! - **Backoff Strategies**: Constant, linear, and exponential backoff

mod client;
mod types;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use types::{HttpRequest, HttpResponse, HttpTransport};

#[cfg(test)]
mod tests;
