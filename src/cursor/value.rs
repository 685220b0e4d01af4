//! Typed cursor values

use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A value read from a record's cursor field
///
/// Values of the same kind are totally ordered. Integers and floats compare
/// numerically with each other; any other mix is incomparable.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorValue {
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Lexicographically ordered string
    String(String),
    /// Parsed datetime
    Datetime(DateTime<Utc>),
}

impl CursorValue {
    /// Interpret a JSON value; `None` for null, bool, arrays and objects
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            JsonValue::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }

    /// Convert back to JSON for state and request options
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Integer(i) => JsonValue::from(*i),
            Self::Float(f) => JsonValue::from(*f),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Datetime(dt) => JsonValue::String(dt.to_rfc3339()),
        }
    }

    /// Compare two values, `None` when they cannot be ordered
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Integer(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Datetime(a), Self::Datetime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialOrd for CursorValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}
