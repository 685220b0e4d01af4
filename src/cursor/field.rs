//! Monotonic field cursor

use super::types::{Cursor, Observation, SkipReason};
use super::value::CursorValue;
use crate::error::{Error, Result};
use crate::request::{RequestOption, RequestOptions, RequestOptionsProvider};
use crate::slice::{Record, SliceIter, StreamSlice};
use crate::state::StreamState;
use crate::types::{value_to_string, JsonObject, JsonValue};
use async_trait::async_trait;
use std::cmp::Ordering;
use tracing::debug;

/// Cursor over a numeric or string field with no sub-ranging
///
/// Produces one slice per read. When a watermark exists the slice carries it
/// under the cursor field name so it can be injected as a lower bound.
#[derive(Debug, Clone)]
pub struct ValueCursor {
    cursor_field: String,
    request_option: Option<RequestOption>,
    watermark: Option<CursorValue>,
    highest_observed: Option<CursorValue>,
}

impl ValueCursor {
    /// Create a cursor on `cursor_field`
    pub fn new(cursor_field: impl Into<String>) -> Self {
        Self {
            cursor_field: cursor_field.into(),
            request_option: None,
            watermark: None,
            highest_observed: None,
        }
    }

    /// Inject the watermark into requests
    #[must_use]
    pub fn with_request_option(mut self, option: RequestOption) -> Self {
        self.request_option = Some(option);
        self
    }

    /// Cursor field name
    pub fn cursor_field(&self) -> &str {
        &self.cursor_field
    }

    /// Current low watermark
    pub fn watermark(&self) -> Option<&CursorValue> {
        self.watermark.as_ref()
    }

    fn record_value(&self, record: &Record) -> Option<CursorValue> {
        record.get(&self.cursor_field).and_then(CursorValue::from_json)
    }
}

impl RequestOptionsProvider for ValueCursor {
    fn request_options(
        &self,
        slice: Option<&StreamSlice>,
        _next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();
        if let (Some(option), Some(value)) = (
            &self.request_option,
            slice.and_then(|s| s.cursor_slice.get(&self.cursor_field)),
        ) {
            options.inject(option, value);
        }
        Ok(options)
    }
}

#[async_trait]
impl Cursor for ValueCursor {
    fn set_initial_state(&mut self, state: &StreamState) -> Result<()> {
        self.highest_observed = None;
        self.watermark = match state.state.get(&self.cursor_field) {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(CursorValue::from_json(value).ok_or_else(|| {
                Error::state(format!(
                    "persisted value {value} for cursor field '{}' is not a number or string",
                    self.cursor_field
                ))
            })?),
        };
        Ok(())
    }

    fn observe(&mut self, _slice: &StreamSlice, record: &Record) -> Observation {
        let field = &self.cursor_field;
        let Some(raw) = record.get(field) else {
            return Observation::Skipped(SkipReason::MissingField {
                field: field.clone(),
            });
        };
        let Some(value) = CursorValue::from_json(raw) else {
            return Observation::Skipped(SkipReason::Unparsable {
                field: field.clone(),
                value: value_to_string(raw),
            });
        };

        let baseline = self.highest_observed.as_ref().or(self.watermark.as_ref());
        match baseline.map(|b| value.compare(b)) {
            None | Some(Some(Ordering::Greater)) => {
                self.highest_observed = Some(value);
                Observation::Advanced
            }
            Some(Some(_)) => Observation::Unchanged,
            Some(None) => Observation::Skipped(SkipReason::Incomparable {
                field: field.clone(),
            }),
        }
    }

    fn close_slice(&mut self, _slice: &StreamSlice) -> Result<()> {
        if let Some(highest) = self.highest_observed.take() {
            let advance = self
                .watermark
                .as_ref()
                .map_or(true, |current| highest.compare(current) == Some(Ordering::Greater));
            if advance {
                self.watermark = Some(highest);
            }
        }
        debug!(cursor_field = %self.cursor_field, watermark = ?self.watermark, "Closed slice");
        Ok(())
    }

    fn get_stream_state(&self) -> StreamState {
        let mut state = JsonObject::new();
        if let Some(watermark) = &self.watermark {
            state.insert(self.cursor_field.clone(), watermark.to_json());
        }
        StreamState::new(state)
    }

    fn should_be_synced(&self, record: &Record) -> bool {
        let (Some(value), Some(watermark)) = (self.record_value(record), &self.watermark) else {
            return true;
        };
        !matches!(value.compare(watermark), Some(Ordering::Less))
    }

    fn is_greater_than_or_equal(&self, first: &Record, second: &Record) -> bool {
        match (self.record_value(first), self.record_value(second)) {
            (Some(a), Some(b)) => matches!(
                a.compare(&b),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            (None, _) => false,
            (Some(_), None) => true,
        }
    }

    async fn stream_slices(&mut self) -> Result<SliceIter> {
        let mut range = JsonObject::new();
        if let Some(watermark) = &self.watermark {
            range.insert(self.cursor_field.clone(), watermark.to_json());
        }
        Ok(Box::new(std::iter::once(StreamSlice::from_cursor_slice(
            range,
        ))))
    }
}
