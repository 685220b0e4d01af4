//! Placeholder rendering for request paths and static request values
//!
//! Handles `{{ variable }}` placeholders such as `{{ stream_partition.id }}`,
//! `{{ stream_slice.start_time }}`, `{{ next_page_token.next_page_token }}`
//! and `{{ config.account_id }}`. There are no filters or expressions: a
//! placeholder is a dot path into one of the context roots.

use crate::error::{Error, Result};
use crate::slice::StreamSlice;
use crate::types::{lookup_path, value_to_string, JsonObject, JsonValue};
use regex::Regex;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z0-9_]+)*)\s*\}\}")
        .expect("template regex is valid")
});

/// Values a placeholder can refer to
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Connector configuration values
    pub config: JsonValue,
    /// Partition half of the current slice
    pub stream_partition: JsonValue,
    /// Both halves of the current slice, merged
    pub stream_slice: JsonValue,
    /// Token mapping of the page being requested
    pub next_page_token: JsonValue,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with config values
    pub fn with_config(config: JsonValue) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Context for one request of one slice
    #[must_use]
    pub fn for_request(
        mut self,
        slice: Option<&StreamSlice>,
        next_page_token: Option<&JsonObject>,
    ) -> Self {
        if let Some(slice) = slice {
            self.stream_partition = JsonValue::Object(slice.partition.clone());
            self.stream_slice = JsonValue::Object(slice.to_object());
        }
        if let Some(token) = next_page_token {
            self.next_page_token = JsonValue::Object(token.clone());
        }
        self
    }

    /// Get a value by path (e.g., "stream_partition.id")
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let (root, rest) = match path.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (path, None),
        };

        let root = match root {
            "config" => &self.config,
            "stream_partition" => &self.stream_partition,
            "stream_slice" => &self.stream_slice,
            "next_page_token" => &self.next_page_token,
            _ => return None,
        };

        match rest {
            Some(rest) => lookup_path(root, rest),
            None => Some(root),
        }
    }
}

/// Render a template string with the given context
///
/// Every undefined placeholder is reported in a single error.
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut errors = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        let var_path = &cap[1];
        match ctx.get(var_path) {
            Some(value) => value_to_string(value),
            None => {
                errors.push(var_path.to_string());
                String::new()
            }
        }
    });

    if errors.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(errors.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Render every template in a string map's values
pub fn render_map<'a, I>(entries: I, ctx: &TemplateContext) -> Result<Vec<(String, String)>>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    entries
        .into_iter()
        .map(|(key, value)| {
            if has_templates(value) {
                Ok((key.clone(), render(value, ctx)?))
            } else {
                Ok((key.clone(), value.clone()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StringMap;
    use serde_json::json;

    fn obj(value: JsonValue) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_partition_path() {
        let slice = StreamSlice::from_partition(obj(json!({"customer_id": 42})));
        let ctx = TemplateContext::new().for_request(Some(&slice), None);

        let result = render("/customers/{{ stream_partition.customer_id }}/orders", &ctx).unwrap();
        assert_eq!(result, "/customers/42/orders");
    }

    #[test]
    fn test_stream_slice_merges_both_halves() {
        let slice = StreamSlice::new(
            obj(json!({"region": "eu"})),
            obj(json!({"start_time": "2024-01-01"})),
        );
        let ctx = TemplateContext::new().for_request(Some(&slice), None);

        let result = render(
            "/{{ stream_slice.region }}/since/{{ stream_slice.start_time }}",
            &ctx,
        )
        .unwrap();
        assert_eq!(result, "/eu/since/2024-01-01");
    }

    #[test]
    fn test_next_page_token() {
        let token = obj(json!({"next_page_token": "abc"}));
        let ctx = TemplateContext::new().for_request(None, Some(&token));
        assert_eq!(
            render("/items?after={{ next_page_token.next_page_token }}", &ctx).unwrap(),
            "/items?after=abc"
        );
    }

    #[test]
    fn test_config_values() {
        let ctx = TemplateContext::with_config(json!({
            "account": {"id": "acc_1"},
            "limit": 100
        }));
        assert_eq!(
            render("/accounts/{{ config.account.id }}?limit={{config.limit}}", &ctx).unwrap(),
            "/accounts/acc_1?limit=100"
        );
    }

    #[test]
    fn test_undefined_variables_are_all_reported() {
        let ctx = TemplateContext::new();
        let err = render("{{ stream_partition.id }}/{{ unknown.x }}", &ctx).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("stream_partition.id"));
        assert!(message.contains("unknown.x"));
    }

    #[test]
    fn test_no_templates() {
        let ctx = TemplateContext::new();
        let result = render("plain string without templates", &ctx).unwrap();
        assert_eq!(result, "plain string without templates");
    }

    #[test]
    fn test_has_templates() {
        assert!(has_templates("{{ config.key }}"));
        assert!(has_templates("prefix {{ stream_slice.x }} suffix"));
        assert!(!has_templates("no templates here"));
        assert!(!has_templates("{ not a template }"));
    }

    #[test]
    fn test_extract_variables() {
        let vars = extract_variables("{{ config.a }} and {{ stream_partition.b }}");
        assert_eq!(vars, vec!["config.a", "stream_partition.b"]);
    }

    #[test]
    fn test_render_map() {
        let slice = StreamSlice::from_partition(obj(json!({"id": 7})));
        let ctx = TemplateContext::new().for_request(Some(&slice), None);
        let mut params = StringMap::new();
        params.insert("static".to_string(), "x".to_string());
        params.insert("parent".to_string(), "{{ stream_partition.id }}".to_string());

        let rendered: StringMap = render_map(&params, &ctx).unwrap().into_iter().collect();
        assert_eq!(rendered["static"], "x");
        assert_eq!(rendered["parent"], "7");
    }
}
