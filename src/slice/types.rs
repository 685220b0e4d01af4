//! Slice and record types

use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// One unit of iteration: a partition plus a cursor sub-range
///
/// Equality and hashing are structural over `partition` and `cursor_slice`;
/// `last_slice` is iteration metadata and never participates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamSlice {
    /// Partition-identifying key/value pairs (empty = no partitioning)
    #[serde(default)]
    pub partition: JsonObject,
    /// Sub-range to request, e.g. a date window (empty = no sub-ranging)
    #[serde(default)]
    pub cursor_slice: JsonObject,
    /// True only for the final slice of an iteration
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub last_slice: bool,
}

impl StreamSlice {
    /// Create a slice from both halves
    pub fn new(partition: JsonObject, cursor_slice: JsonObject) -> Self {
        Self {
            partition,
            cursor_slice,
            last_slice: false,
        }
    }

    /// Create a slice carrying only a partition
    pub fn from_partition(partition: JsonObject) -> Self {
        Self::new(partition, JsonObject::new())
    }

    /// Create a slice carrying only a cursor range
    pub fn from_cursor_slice(cursor_slice: JsonObject) -> Self {
        Self::new(JsonObject::new(), cursor_slice)
    }

    /// Set the last-slice flag
    #[must_use]
    pub fn with_last_slice(mut self, last_slice: bool) -> Self {
        self.last_slice = last_slice;
        self
    }

    /// Copy of this slice with the partition removed
    pub fn without_partition(&self) -> Self {
        Self {
            partition: JsonObject::new(),
            cursor_slice: self.cursor_slice.clone(),
            last_slice: self.last_slice,
        }
    }

    /// Copy of this slice with the cursor range removed
    pub fn without_cursor_slice(&self) -> Self {
        Self {
            partition: self.partition.clone(),
            cursor_slice: JsonObject::new(),
            last_slice: self.last_slice,
        }
    }

    /// Whether both halves are empty
    pub fn is_empty(&self) -> bool {
        self.partition.is_empty() && self.cursor_slice.is_empty()
    }

    /// Look up a key, partition first
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.partition
            .get(key)
            .or_else(|| self.cursor_slice.get(key))
    }

    /// Look up a string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(JsonValue::as_str)
    }

    /// Merge both halves into one mapping (cursor keys win on overlap)
    pub fn to_object(&self) -> JsonObject {
        let mut merged = self.partition.clone();
        for (k, v) in &self.cursor_slice {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }
}

impl PartialEq for StreamSlice {
    fn eq(&self, other: &Self) -> bool {
        self.partition == other.partition && self.cursor_slice == other.cursor_slice
    }
}

impl Eq for StreamSlice {}

impl Hash for StreamSlice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_object(&self.partition, state);
        hash_object(&self.cursor_slice, state);
    }
}

impl fmt::Display for StreamSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StreamSlice(partition={}, cursor_slice={})",
            JsonValue::Object(self.partition.clone()),
            JsonValue::Object(self.cursor_slice.clone())
        )
    }
}

// Keys are hashed in sorted order so the hash agrees with `Map` equality
// even when serde_json is built with `preserve_order`.
fn hash_object<H: Hasher>(object: &JsonObject, state: &mut H) {
    let mut entries: Vec<_> = object.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    entries.len().hash(state);
    for (key, value) in entries {
        key.hash(state);
        hash_value(value, state);
    }
}

fn hash_value<H: Hasher>(value: &JsonValue, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        JsonValue::Null => {}
        JsonValue::Bool(b) => b.hash(state),
        JsonValue::Number(n) => n.to_string().hash(state),
        JsonValue::String(s) => s.hash(state),
        JsonValue::Array(items) => {
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        JsonValue::Object(map) => hash_object(map, state),
    }
}

/// A row extracted from a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record fields
    pub data: JsonObject,
    /// Slice the record was read under
    #[serde(default)]
    pub associated_slice: Option<StreamSlice>,
}

impl Record {
    /// Create a record tagged with a slice
    pub fn new(data: JsonObject, associated_slice: Option<StreamSlice>) -> Self {
        Self {
            data,
            associated_slice,
        }
    }

    /// Create a record from a JSON value; non-objects are wrapped as `{"data": value}`
    pub fn from_value(value: JsonValue, associated_slice: Option<StreamSlice>) -> Self {
        let data = match value {
            JsonValue::Object(map) => map,
            other => {
                let mut map = JsonObject::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        Self::new(data, associated_slice)
    }

    /// Get a field by name, following dots into nested objects
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        if let Some(value) = self.data.get(field) {
            return Some(value);
        }
        let mut parts = field.split('.');
        let mut current = self.data.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Copy of this record whose slice has the partition stripped
    pub fn without_partition(&self) -> Self {
        Self {
            data: self.data.clone(),
            associated_slice: self.associated_slice.as_ref().map(StreamSlice::without_partition),
        }
    }

    /// The cursor half of the associated slice, if any
    pub fn cursor_slice(&self) -> Option<&JsonObject> {
        self.associated_slice.as_ref().map(|s| &s.cursor_slice)
    }
}
