//! Date-window cursor

use super::time::{format_datetime, parse_datetime_value, validate_format, Step};
use super::types::{Cursor, Observation, SkipReason};
use crate::error::{Error, Result};
use crate::request::{RequestOption, RequestOptions, RequestOptionsProvider};
use crate::slice::{Record, SliceIter, StreamSlice};
use crate::state::StreamState;
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Default output format
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Cursor over a datetime field that slices the sync window into steps
///
/// Slices are closed ranges `[start, end]`. Consecutive slices are separated
/// by `cursor_granularity` so no instant is requested twice.
#[derive(Debug, Clone)]
pub struct DatetimeBasedCursor {
    cursor_field: String,
    start_datetime: DateTime<Utc>,
    end_datetime: Option<DateTime<Utc>>,
    step: Option<Step>,
    cursor_granularity: Option<Duration>,
    lookback_window: Option<Duration>,
    datetime_format: String,
    cursor_datetime_formats: Vec<String>,
    partition_field_start: String,
    partition_field_end: String,
    start_time_option: Option<RequestOption>,
    end_time_option: Option<RequestOption>,
    watermark: Option<DateTime<Utc>>,
    highest_observed: Option<DateTime<Utc>>,
}

impl DatetimeBasedCursor {
    /// Create a cursor reading from `start_datetime` to now in one slice
    pub fn new(cursor_field: impl Into<String>, start_datetime: DateTime<Utc>) -> Self {
        Self {
            cursor_field: cursor_field.into(),
            start_datetime,
            end_datetime: None,
            step: None,
            cursor_granularity: None,
            lookback_window: None,
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            cursor_datetime_formats: Vec::new(),
            partition_field_start: "start_time".to_string(),
            partition_field_end: "end_time".to_string(),
            start_time_option: None,
            end_time_option: None,
            watermark: None,
            highest_observed: None,
        }
    }

    /// Fixed end of the sync window
    #[must_use]
    pub fn with_end_datetime(mut self, end: DateTime<Utc>) -> Self {
        self.end_datetime = Some(end);
        self
    }

    /// Slice width; requires a cursor granularity
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.step = Some(step);
        self
    }

    /// Smallest distinguishable time unit; consecutive slices are this far apart
    #[must_use]
    pub fn with_cursor_granularity(mut self, granularity: Duration) -> Self {
        self.cursor_granularity = Some(granularity);
        self
    }

    /// Re-read this much before the watermark
    #[must_use]
    pub fn with_lookback_window(mut self, lookback: Duration) -> Self {
        self.lookback_window = Some(lookback);
        self
    }

    /// Output format for slice bounds and state
    #[must_use]
    pub fn with_datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = format.into();
        self
    }

    /// Additional formats accepted when parsing record values
    #[must_use]
    pub fn with_cursor_datetime_formats(mut self, formats: Vec<String>) -> Self {
        self.cursor_datetime_formats = formats;
        self
    }

    /// Keys used for the slice bounds
    #[must_use]
    pub fn with_partition_fields(
        mut self,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        self.partition_field_start = start.into();
        self.partition_field_end = end.into();
        self
    }

    /// Inject the slice start into requests
    #[must_use]
    pub fn with_start_time_option(mut self, option: RequestOption) -> Self {
        self.start_time_option = Some(option);
        self
    }

    /// Inject the slice end into requests
    #[must_use]
    pub fn with_end_time_option(mut self, option: RequestOption) -> Self {
        self.end_time_option = Some(option);
        self
    }

    /// Check the combination of settings
    pub fn validate(&self) -> Result<()> {
        validate_format(&self.datetime_format)?;
        if let Some(step) = &self.step {
            if step.is_zero() {
                return Err(Error::invalid_value("step", "step must be positive"));
            }
            match self.cursor_granularity {
                None => return Err(Error::missing_field("cursor_granularity")),
                Some(g) if g < Duration::zero() => {
                    return Err(Error::invalid_value(
                        "cursor_granularity",
                        "granularity must not be negative",
                    ))
                }
                // A wider granularity would end slices before they start
                Some(g) if g > step.shortest() => {
                    return Err(Error::invalid_value(
                        "cursor_granularity",
                        "granularity must not exceed the step",
                    ))
                }
                Some(_) => {}
            }
        } else if self.cursor_granularity.is_some() {
            return Err(Error::config(
                "cursor_granularity is only meaningful together with step",
            ));
        }
        Ok(())
    }

    /// Cursor field name
    pub fn cursor_field(&self) -> &str {
        &self.cursor_field
    }

    /// Current low watermark
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    /// Format a datetime the way this cursor writes state and slices
    pub fn format(&self, dt: DateTime<Utc>) -> String {
        format_datetime(dt, &self.datetime_format)
    }

    /// Parse a value with the configured formats
    pub fn parse(&self, value: &JsonValue) -> Option<DateTime<Utc>> {
        parse_datetime_value(value, &self.parse_formats())
    }

    fn parse_formats(&self) -> Vec<String> {
        let mut formats = self.cursor_datetime_formats.clone();
        formats.push(self.datetime_format.clone());
        formats
    }

    /// Start of the next read: the configured start, or the watermark minus lookback
    fn effective_start(&self) -> DateTime<Utc> {
        match self.watermark {
            Some(watermark) => {
                let lookback = self.lookback_window.unwrap_or_else(Duration::zero);
                let resumed = watermark.checked_sub_signed(lookback).unwrap_or(watermark);
                resumed.max(self.start_datetime)
            }
            None => self.start_datetime,
        }
    }

    fn effective_end(&self) -> DateTime<Utc> {
        self.end_datetime.unwrap_or_else(Utc::now)
    }

    fn make_slice(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StreamSlice {
        let mut range = JsonObject::new();
        range.insert(
            self.partition_field_start.clone(),
            JsonValue::String(self.format(start)),
        );
        range.insert(
            self.partition_field_end.clone(),
            JsonValue::String(self.format(end)),
        );
        StreamSlice::from_cursor_slice(range)
    }

    /// Compute the date windows between the effective start and end
    pub fn partition_daterange(&self) -> Result<Vec<StreamSlice>> {
        self.validate()?;
        let start = self.effective_start();
        let end = self.effective_end();

        let mut slices = Vec::new();
        let Some(step) = self.step else {
            if start <= end {
                slices.push(self.make_slice(start, end));
            }
            return Ok(slices);
        };
        let granularity = self.cursor_granularity.unwrap_or_else(Duration::zero);

        let mut current = start;
        while current <= end {
            let next = step
                .add_to(current)
                .ok_or_else(|| Error::cursor("datetime overflow while slicing"))?;
            if next <= current {
                break;
            }
            let slice_end = (next - granularity).min(end);
            slices.push(self.make_slice(current, slice_end));
            current = next;
        }
        Ok(slices)
    }

    fn slice_bound(&self, slice: &StreamSlice, key: &str) -> Option<DateTime<Utc>> {
        slice.cursor_slice.get(key).and_then(|v| self.parse(v))
    }

    fn within_slice(&self, slice: &StreamSlice, value: DateTime<Utc>) -> bool {
        let after_start = self
            .slice_bound(slice, &self.partition_field_start)
            .map_or(true, |start| value >= start);
        let before_end = self
            .slice_bound(slice, &self.partition_field_end)
            .map_or(true, |end| value <= end);
        after_start && before_end
    }

    fn record_value(&self, record: &Record) -> Option<DateTime<Utc>> {
        record.get(&self.cursor_field).and_then(|v| self.parse(v))
    }
}

impl RequestOptionsProvider for DatetimeBasedCursor {
    fn request_options(
        &self,
        slice: Option<&StreamSlice>,
        _next_page_token: Option<&JsonObject>,
    ) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();
        let Some(slice) = slice else {
            return Ok(options);
        };
        if let (Some(option), Some(start)) = (
            &self.start_time_option,
            slice.cursor_slice.get(&self.partition_field_start),
        ) {
            options.inject(option, start);
        }
        if let (Some(option), Some(end)) = (
            &self.end_time_option,
            slice.cursor_slice.get(&self.partition_field_end),
        ) {
            options.inject(option, end);
        }
        Ok(options)
    }
}

#[async_trait]
impl Cursor for DatetimeBasedCursor {
    fn set_initial_state(&mut self, state: &StreamState) -> Result<()> {
        self.highest_observed = None;
        self.watermark = match state.state.get(&self.cursor_field) {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(self.parse(value).ok_or_else(|| {
                Error::state(format!(
                    "cannot parse persisted value {value} for cursor field '{}'",
                    self.cursor_field
                ))
            })?),
        };
        Ok(())
    }

    fn observe(&mut self, slice: &StreamSlice, record: &Record) -> Observation {
        let field = &self.cursor_field;
        let Some(raw) = record.get(field) else {
            return Observation::Skipped(SkipReason::MissingField {
                field: field.clone(),
            });
        };
        let Some(value) = self.parse(raw) else {
            return Observation::Skipped(SkipReason::Unparsable {
                field: field.clone(),
                value: crate::types::value_to_string(raw),
            });
        };
        if !self.within_slice(slice, value) {
            return Observation::Skipped(SkipReason::OutsideSlice {
                field: field.clone(),
            });
        }

        match self.highest_observed {
            Some(highest) if value <= highest => Observation::Unchanged,
            _ => {
                self.highest_observed = Some(value);
                Observation::Advanced
            }
        }
    }

    fn close_slice(&mut self, slice: &StreamSlice) -> Result<()> {
        if !slice.partition.is_empty() {
            return Err(Error::cursor(format!(
                "datetime cursor on '{}' does not accept partitioned slices: {slice}",
                self.cursor_field
            )));
        }

        let slice_end = self.slice_bound(slice, &self.partition_field_end);
        let candidates = [self.watermark, self.highest_observed.take(), slice_end];
        self.watermark = candidates.into_iter().flatten().max();

        debug!(
            cursor_field = %self.cursor_field,
            watermark = ?self.watermark,
            "Closed datetime slice"
        );
        Ok(())
    }

    fn get_stream_state(&self) -> StreamState {
        let mut state = JsonObject::new();
        if let Some(watermark) = self.watermark {
            state.insert(
                self.cursor_field.clone(),
                JsonValue::String(self.format(watermark)),
            );
        }
        StreamState::new(state)
    }

    fn should_be_synced(&self, record: &Record) -> bool {
        let Some(value) = self.record_value(record) else {
            tracing::warn!(
                cursor_field = %self.cursor_field,
                "Record has no usable cursor value; syncing it anyway"
            );
            return true;
        };
        let earliest = self.effective_start();
        let latest = self.effective_end();
        earliest <= value && value <= latest
    }

    fn is_greater_than_or_equal(&self, first: &Record, second: &Record) -> bool {
        match (self.record_value(first), self.record_value(second)) {
            (Some(a), Some(b)) => a >= b,
            (None, _) => false,
            (Some(_), None) => true,
        }
    }

    async fn stream_slices(&mut self) -> Result<SliceIter> {
        let slices = self.partition_daterange()?;
        debug!(
            cursor_field = %self.cursor_field,
            count = slices.len(),
            "Generated datetime slices"
        );
        Ok(Box::new(slices.into_iter()))
    }
}
