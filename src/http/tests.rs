//! Tests for the HTTP transport module

use super::*;
use crate::error::Error;
use crate::request::{RequestOption, RequestOptions};
use crate::types::{BackoffType, Method};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_client(server: &MockServer, retries: u32) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(retries)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .build();
    HttpClient::with_config(config).unwrap()
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 3);
    assert!(config.base_url.is_none());
    assert!(config.user_agent.starts_with("incremental-cdk/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.example.com")
        .timeout(Duration::from_secs(60))
        .max_retries(5)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .header("X-Custom", "value")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.base_url, Some("https://api.example.com".to_string()));
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(config.initial_backoff, Duration::from_millis(200));
    assert_eq!(config.max_backoff, Duration::from_secs(30));
    assert_eq!(
        config.default_headers.get("X-Custom"),
        Some(&"value".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

// ============================================================================
// Descriptor Tests
// ============================================================================

#[test]
fn test_request_with_options() {
    let options = RequestOptions::new()
        .with(&RequestOption::param("page"), "2")
        .with(&RequestOption::header("X-Token"), "abc")
        .with(&RequestOption::body_json("filter"), json!({"a": 1}));
    let request = HttpRequest::get("/items").param("limit", "10").with_options(options);

    assert_eq!(request.method, Method::GET);
    assert_eq!(request.params["page"], "2");
    assert_eq!(request.params["limit"], "10");
    assert_eq!(request.headers["X-Token"], "abc");
    assert_eq!(request.json_body(), Some(json!({"filter": {"a": 1}})));
}

#[test]
fn test_response_accessors() {
    let response = HttpResponse::json_body(&json!({"next": "abc"}))
        .with_header("Link", "<https://x/2>; rel=\"next\"");

    assert!(response.is_success());
    assert_eq!(response.json().unwrap()["next"], "abc");
    assert_eq!(response.header("link"), Some("<https://x/2>; rel=\"next\""));
    assert!(response.header("missing").is_none());
}

#[test]
fn test_response_json_errors_and_empty_body() {
    assert_eq!(HttpResponse::new(204).json().unwrap(), json!(null));
    let err = HttpResponse::new(200).with_body("not json").json().unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

// ============================================================================
// Transport Tests
// ============================================================================

#[tokio::test]
async fn test_send_get_with_params_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("page", "1"))
        .and(header("X-Request-Id", "abc123"))
        .and(header("X-Default", "yes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"id": 1, "name": "Alice"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .header("X-Default", "yes")
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let request = HttpRequest::get("/api/users")
        .param("page", "1")
        .header("X-Request-Id", "abc123");
    let response = client.send(&request).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.json().unwrap()["users"][0]["name"], "Alice");
}

#[tokio::test]
async fn test_send_post_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search"))
        .and(body_json(json!({"cursor": "c1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 123})))
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server, 0);
    let request = HttpRequest::new(Method::POST, "/api/search").with_options(
        RequestOptions::new().with(&RequestOption::body_json("cursor"), "c1"),
    );
    let response = client.send(&request).await.unwrap();
    assert_eq!(response.status, 201);
}

#[tokio::test]
async fn test_send_form_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/form"))
        .and(body_string_contains("offset=20"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server, 0);
    let request = HttpRequest::new(Method::POST, "/api/form").with_options(
        RequestOptions::new().with(&RequestOption::body_data("offset"), 20),
    );
    assert_eq!(client.send(&request).await.unwrap().status, 200);
}

#[tokio::test]
async fn test_send_rejects_mixed_bodies() {
    let mock_server = MockServer::start().await;
    let client = fast_client(&mock_server, 0);
    let request = HttpRequest::new(Method::POST, "/x").with_options(
        RequestOptions::new()
            .with(&RequestOption::body_data("a"), "1")
            .with(&RequestOption::body_json("b"), "2"),
    );
    assert!(client.send(&request).await.unwrap_err().is_configuration());
}

#[tokio::test]
async fn test_send_404_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server, 3);
    let err = client.send(&HttpRequest::get("/api/missing")).await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 404, ref body } if body == "Not found"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_send_retry_on_500() {
    let mock_server = MockServer::start().await;

    // First two calls return 500, third succeeds
    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server, 3);
    let response = client.send(&HttpRequest::get("/api/flaky")).await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_send_rate_limit_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_string("Rate limited"),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server, 2);
    let response = client.send(&HttpRequest::get("/api/limited")).await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_send_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/always-fail"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = fast_client(&mock_server, 2);
    let err = client
        .send(&HttpRequest::get("/api/always-fail"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_send_absolute_url_bypasses_base() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/next_url"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = HttpClient::for_base_url("http://unused.invalid/api").unwrap();
    let url = format!("{}/next_url", mock_server.uri());
    assert_eq!(client.send(&HttpRequest::get(url)).await.unwrap().status, 200);
}

// ============================================================================
// URL / Backoff Tests
// ============================================================================

#[test]
fn test_build_url() {
    let client = HttpClient::for_base_url("https://api.example.com/v1/").unwrap();
    assert_eq!(
        client.build_url("/users").unwrap().as_str(),
        "https://api.example.com/v1/users"
    );
    assert_eq!(
        client.build_url("users").unwrap().as_str(),
        "https://api.example.com/v1/users"
    );
    assert_eq!(
        client.build_url("https://other.example.com/x").unwrap().as_str(),
        "https://other.example.com/x"
    );
}

#[test]
fn test_build_url_without_base_requires_absolute() {
    let client = HttpClient::with_config(HttpClientConfig::default()).unwrap();
    assert!(matches!(
        client.build_url("/relative"),
        Err(Error::InvalidUrl(_))
    ));
}

#[test]
fn test_calculate_backoff_constant() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(5), Duration::from_millis(100));
}

#[test]
fn test_calculate_backoff_linear() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(300));
}

#[test]
fn test_calculate_backoff_exponential_respects_max() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_millis(500),
        )
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(400));
    assert_eq!(client.calculate_backoff(10), Duration::from_millis(500));
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::for_base_url("https://api.example.com").unwrap();
    let debug = format!("{client:?}");
    assert!(debug.contains("HttpClient"));
    assert!(debug.contains("api.example.com"));
}
