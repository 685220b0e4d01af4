//! Request option types and merging

use crate::error::{Error, Result};
use crate::slice::StreamSlice;
use crate::types::{value_to_string, JsonObject, JsonValue, StringMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location a request option is injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOptionType {
    /// Query string parameter
    RequestParameter,
    /// HTTP header
    Header,
    /// Form-encoded body field
    BodyData,
    /// JSON body field
    BodyJson,
}

impl fmt::Display for RequestOptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RequestParameter => "request parameters",
            Self::Header => "headers",
            Self::BodyData => "body data",
            Self::BodyJson => "body json",
        };
        f.write_str(name)
    }
}

/// A named field and the location it is injected into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOption {
    /// Field name in the target location
    pub field_name: String,
    /// Target location
    pub inject_into: RequestOptionType,
}

impl RequestOption {
    /// Create a request option
    pub fn new(field_name: impl Into<String>, inject_into: RequestOptionType) -> Self {
        Self {
            field_name: field_name.into(),
            inject_into,
        }
    }

    /// Query parameter option
    pub fn param(field_name: impl Into<String>) -> Self {
        Self::new(field_name, RequestOptionType::RequestParameter)
    }

    /// Header option
    pub fn header(field_name: impl Into<String>) -> Self {
        Self::new(field_name, RequestOptionType::Header)
    }

    /// Form body option
    pub fn body_data(field_name: impl Into<String>) -> Self {
        Self::new(field_name, RequestOptionType::BodyData)
    }

    /// JSON body option
    pub fn body_json(field_name: impl Into<String>) -> Self {
        Self::new(field_name, RequestOptionType::BodyJson)
    }
}

/// Everything one component contributes to an outgoing request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Query parameters
    pub params: StringMap,
    /// Headers
    pub headers: StringMap,
    /// Form body fields
    pub body_data: StringMap,
    /// JSON body fields
    pub body_json: JsonObject,
}

impl RequestOptions {
    /// Create an empty set of options
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing is contributed
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
            && self.headers.is_empty()
            && self.body_data.is_empty()
            && self.body_json.is_empty()
    }

    /// Inject a value at the option's location, replacing any previous value
    pub fn inject(&mut self, option: &RequestOption, value: &JsonValue) {
        let key = option.field_name.clone();
        match option.inject_into {
            RequestOptionType::RequestParameter => {
                self.params.insert(key, value_to_string(value));
            }
            RequestOptionType::Header => {
                self.headers.insert(key, value_to_string(value));
            }
            RequestOptionType::BodyData => {
                self.body_data.insert(key, value_to_string(value));
            }
            RequestOptionType::BodyJson => {
                self.body_json.insert(key, value.clone());
            }
        }
    }

    /// Builder-style [`inject`](Self::inject)
    #[must_use]
    pub fn with(mut self, option: &RequestOption, value: impl Into<JsonValue>) -> Self {
        self.inject(option, &value.into());
        self
    }

    /// Merge another component's options into this one
    ///
    /// Fails with [`Error::RequestOptionConflict`] when both sides set the
    /// same key in the same location.
    pub fn merge(&mut self, other: RequestOptions) -> Result<()> {
        merge_strings(
            &mut self.params,
            other.params,
            RequestOptionType::RequestParameter,
        )?;
        merge_strings(&mut self.headers, other.headers, RequestOptionType::Header)?;
        merge_strings(
            &mut self.body_data,
            other.body_data,
            RequestOptionType::BodyData,
        )?;
        for (key, value) in other.body_json {
            if self.body_json.contains_key(&key) {
                return Err(Error::option_conflict(
                    key,
                    RequestOptionType::BodyJson.to_string(),
                ));
            }
            self.body_json.insert(key, value);
        }
        Ok(())
    }
}

fn merge_strings(target: &mut StringMap, source: StringMap, location: RequestOptionType) -> Result<()> {
    for (key, value) in source {
        if target.contains_key(&key) {
            return Err(Error::option_conflict(key, location.to_string()));
        }
        target.insert(key, value);
    }
    Ok(())
}

/// Merge the contributions of several components, rejecting collisions
pub fn combine_options<I>(parts: I) -> Result<RequestOptions>
where
    I: IntoIterator<Item = RequestOptions>,
{
    let mut combined = RequestOptions::new();
    for part in parts {
        combined.merge(part)?;
    }
    Ok(combined)
}

/// A component that shapes outgoing requests
///
/// Implementors override [`request_options`](Self::request_options); the
/// per-location hooks project from it.
pub trait RequestOptionsProvider {
    /// All options this component contributes for the given slice and page token
    fn request_options(
        &self,
        _slice: Option<&StreamSlice>,
        _next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        Ok(RequestOptions::new())
    }

    /// Query parameters for the request
    fn get_request_params(
        &self,
        slice: Option<&StreamSlice>,
        next_page_token: Option<&JsonObject>,
    ) -> Result<StringMap> {
        Ok(self.request_options(slice, next_page_token)?.params)
    }

    /// Headers for the request
    fn get_request_headers(
        &self,
        slice: Option<&StreamSlice>,
        next_page_token: Option<&JsonObject>,
    ) -> Result<StringMap> {
        Ok(self.request_options(slice, next_page_token)?.headers)
    }

    /// Form body fields for the request
    fn get_request_body_data(
        &self,
        slice: Option<&StreamSlice>,
        next_page_token: Option<&JsonObject>,
    ) -> Result<StringMap> {
        Ok(self.request_options(slice, next_page_token)?.body_data)
    }

    /// JSON body fields for the request
    fn get_request_body_json(
        &self,
        slice: Option<&StreamSlice>,
        next_page_token: Option<&JsonObject>,
    ) -> Result<JsonObject> {
        Ok(self.request_options(slice, next_page_token)?.body_json)
    }
}
