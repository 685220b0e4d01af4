//! Tests for record extraction

use super::*;
use crate::error::Error;
use crate::http::HttpResponse;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

fn body(value: Value) -> HttpResponse {
    HttpResponse::json_body(&value)
}

#[test_case(json!([{"id": 1}, {"id": 2}]), None, 2 ; "top level array")]
#[test_case(json!({"data": [{"id": 1}, {"id": 2}, {"id": 3}]}), Some("data"), 3 ; "record path")]
#[test_case(json!({"response": {"items": [{"id": 1}]}}), Some("$.response.items"), 1 ; "nested path")]
#[test_case(json!({"data": {"id": 1}}), Some("data"), 1 ; "single object")]
#[test_case(json!({"data": null}), Some("data"), 0 ; "null records")]
#[test_case(json!({"other": []}), Some("data"), 0 ; "missing path")]
fn test_json_extractor(response: Value, path: Option<&str>, expected: usize) {
    let extractor = match path {
        Some(path) => JsonExtractor::with_path(path),
        None => JsonExtractor::new(),
    };
    assert_eq!(extractor.extract_records(&body(response)).unwrap().len(), expected);
}

#[test]
fn test_json_extractor_preserves_order() {
    let extractor = JsonExtractor::with_path("data");
    let records = extractor
        .extract_records(&body(json!({"data": [{"id": "b"}, {"id": "a"}]})))
        .unwrap();
    assert_eq!(records, vec![json!({"id": "b"}), json!({"id": "a"})]);
}

#[test]
fn test_json_extractor_empty_body() {
    let records = JsonExtractor::new()
        .extract_records(&HttpResponse::new(204))
        .unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_json_extractor_invalid_json() {
    let response = HttpResponse::new(200).with_body("{not json");
    let err = JsonExtractor::new().extract_records(&response).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[test]
fn test_jsonl_extractor() {
    let response = HttpResponse::new(200).with_body("{\"id\": 1}\n\n{\"id\": 2}\n  {\"id\": 3}  \n");
    let records = JsonlExtractor.extract_records(&response).unwrap();
    assert_eq!(records, vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
}

#[test]
fn test_jsonl_extractor_reports_line() {
    let response = HttpResponse::new(200).with_body("{\"id\": 1}\nbroken\n");
    let err = JsonlExtractor.extract_records(&response).unwrap_err();
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn test_decoder_config_build() {
    let config: DecoderConfig =
        serde_json::from_value(json!({"format": "json", "record_path": "items"})).unwrap();
    assert_eq!(config, DecoderConfig::json_with_path("items"));
    let records = config
        .build()
        .extract_records(&body(json!({"items": [1, 2]})))
        .unwrap();
    assert_eq!(records.len(), 2);

    let jsonl = DecoderConfig::jsonl().build();
    let response = HttpResponse::new(200).with_body("1\n2\n");
    assert_eq!(jsonl.extract_records(&response).unwrap(), vec![json!(1), json!(2)]);
}
