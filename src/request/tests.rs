//! Tests for request module

use super::*;
use crate::error::Error;
use crate::slice::StreamSlice;
use crate::types::JsonObject;
use serde_json::json;

#[test]
fn test_inject_into_each_location() {
    let options = RequestOptions::new()
        .with(&RequestOption::param("page"), 2)
        .with(&RequestOption::header("X-Cursor"), "abc")
        .with(&RequestOption::body_data("after"), "c1")
        .with(&RequestOption::body_json("filter"), json!({"since": 1}));

    assert_eq!(options.params.get("page"), Some(&"2".to_string()));
    assert_eq!(options.headers.get("X-Cursor"), Some(&"abc".to_string()));
    assert_eq!(options.body_data.get("after"), Some(&"c1".to_string()));
    assert_eq!(options.body_json.get("filter"), Some(&json!({"since": 1})));
    assert!(!options.is_empty());
}

#[test]
fn test_merge_disjoint_options() {
    let router = RequestOptions::new().with(&RequestOption::param("parent_id"), "1");
    let cursor = RequestOptions::new()
        .with(&RequestOption::param("since"), "2024-01-01")
        .with(&RequestOption::header("X-Range"), "r");

    let combined = combine_options([router, cursor]).unwrap();
    assert_eq!(combined.params.len(), 2);
    assert_eq!(combined.headers.len(), 1);
}

#[test]
fn test_merge_colliding_param_is_rejected() {
    let router = RequestOptions::new().with(&RequestOption::param("id"), "1");
    let cursor = RequestOptions::new().with(&RequestOption::param("id"), "2");

    let err = combine_options([router, cursor]).unwrap_err();
    assert!(matches!(
        err,
        Error::RequestOptionConflict { ref key, .. } if key == "id"
    ));
    assert!(err.is_configuration());
}

#[test]
fn test_same_key_in_different_locations_is_allowed() {
    let a = RequestOptions::new().with(&RequestOption::param("id"), "1");
    let b = RequestOptions::new().with(&RequestOption::header("id"), "2");
    assert!(combine_options([a, b]).is_ok());
}

#[test]
fn test_merge_colliding_body_json_is_rejected() {
    let a = RequestOptions::new().with(&RequestOption::body_json("q"), 1);
    let b = RequestOptions::new().with(&RequestOption::body_json("q"), 2);
    assert!(matches!(
        combine_options([a, b]),
        Err(Error::RequestOptionConflict { .. })
    ));
}

struct FixedProvider;

impl RequestOptionsProvider for FixedProvider {
    fn request_options(
        &self,
        slice: Option<&StreamSlice>,
        _next_page_token: Option<&JsonObject>,
    ) -> crate::error::Result<RequestOptions> {
        let id = slice.and_then(|s| s.get("id")).cloned().unwrap_or(json!("none"));
        Ok(RequestOptions::new()
            .with(&RequestOption::param("id"), id.clone())
            .with(&RequestOption::body_json("id"), id))
    }
}

#[test]
fn test_provider_hooks_project_locations() {
    let slice = StreamSlice::from_partition(json!({"id": "7"}).as_object().cloned().unwrap());
    let provider = FixedProvider;

    let params = provider.get_request_params(Some(&slice), None).unwrap();
    assert_eq!(params.get("id"), Some(&"7".to_string()));
    assert!(provider.get_request_headers(Some(&slice), None).unwrap().is_empty());
    assert!(provider.get_request_body_data(Some(&slice), None).unwrap().is_empty());
    assert_eq!(
        provider.get_request_body_json(Some(&slice), None).unwrap().get("id"),
        Some(&json!("7"))
    );
}
