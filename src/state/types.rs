//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Checkpoint of a single stream
///
/// Serialized as `{"state": {...}, "parent_state": {"parent": {...}}}` with
/// `parent_state` omitted when there are no parents. A flat object without
/// either key deserializes as the cursor state itself, which keeps states
/// written by non-partitioned streams readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamState {
    /// The cursor's own progress marker
    pub state: JsonObject,
    /// Parent stream name -> that parent's own state
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parent_state: BTreeMap<String, StreamState>,
}

impl StreamState {
    /// Create a state with no parents
    pub fn new(state: JsonObject) -> Self {
        Self {
            state,
            parent_state: BTreeMap::new(),
        }
    }

    /// Add a parent stream's state
    #[must_use]
    pub fn with_parent(mut self, name: impl Into<String>, state: StreamState) -> Self {
        self.parent_state.insert(name.into(), state);
        self
    }

    /// Whether neither the cursor nor any parent has recorded progress
    pub fn is_empty(&self) -> bool {
        self.state.is_empty() && self.parent_state.values().all(StreamState::is_empty)
    }

    /// Parse a state from JSON, accepting both the structured and flat shapes
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let mut map = match value {
            JsonValue::Null => return Ok(Self::default()),
            JsonValue::Object(map) => map,
            other => {
                return Err(Error::state(format!(
                    "stream state must be an object, got {other}"
                )))
            }
        };

        let mut parent_state = BTreeMap::new();
        match map.remove("parent_state") {
            Some(JsonValue::Object(parents)) => {
                for (name, parent) in parents {
                    parent_state.insert(name, Self::from_value(parent)?);
                }
            }
            Some(JsonValue::Null) | None => {}
            Some(other) => {
                return Err(Error::state(format!(
                    "'parent_state' must be an object, got {other}"
                )))
            }
        }

        // Only a lone `state` object is the structured form; cursor states
        // may carry a `state` key of their own next to other keys
        let state = match map.remove("state") {
            Some(JsonValue::Object(state)) if map.is_empty() => state,
            Some(JsonValue::Null) if map.is_empty() => JsonObject::new(),
            Some(other) => {
                map.insert("state".to_string(), other);
                map
            }
            None => map,
        };

        Ok(Self {
            state,
            parent_state,
        })
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> JsonValue {
        let mut map = JsonObject::new();
        map.insert("state".to_string(), JsonValue::Object(self.state.clone()));
        if !self.parent_state.is_empty() {
            let parents = self
                .parent_state
                .iter()
                .map(|(name, state)| (name.clone(), state.to_value()))
                .collect();
            map.insert("parent_state".to_string(), JsonValue::Object(parents));
        }
        JsonValue::Object(map)
    }
}

impl<'de> Deserialize<'de> for StreamState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Complete state for a connector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorState {
    /// Per-stream state
    #[serde(default)]
    pub streams: BTreeMap<String, StreamState>,
}

impl ConnectorState {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.streams.get(stream)
    }

    /// Replace state for a stream
    pub fn set_stream(&mut self, stream: &str, state: StreamState) {
        self.streams.insert(stream.to_string(), state);
    }
}
