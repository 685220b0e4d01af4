//! Tests for datetime and value cursors

use super::*;
use crate::error::Error;
use crate::request::{RequestOption, RequestOptionsProvider};
use crate::slice::{Record, StreamSlice};
use crate::state::StreamState;
use crate::types::JsonObject;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

fn dt(s: &str) -> DateTime<Utc> {
    parse_datetime(s, &[]).unwrap()
}

fn obj(value: Value) -> JsonObject {
    value.as_object().cloned().unwrap()
}

fn range(start: &str, end: &str) -> StreamSlice {
    StreamSlice::from_cursor_slice(obj(json!({"start_time": start, "end_time": end})))
}

fn record(value: Value, slice: &StreamSlice) -> Record {
    Record::from_value(value, Some(slice.clone()))
}

fn state(value: Value) -> StreamState {
    StreamState::from_value(value).unwrap()
}

fn daily_cursor() -> DatetimeBasedCursor {
    DatetimeBasedCursor::new("updated_at", dt("2021-01-01T00:00:00Z"))
        .with_end_datetime(dt("2021-01-05T00:00:00Z"))
        .with_step(Step::parse("P1D").unwrap())
        .with_cursor_granularity(Duration::seconds(1))
        .with_datetime_format("%Y-%m-%dT%H:%M:%SZ")
}

fn bounds(slices: &[StreamSlice]) -> Vec<(String, String)> {
    slices
        .iter()
        .map(|s| {
            (
                s.cursor_slice["start_time"].as_str().unwrap().to_string(),
                s.cursor_slice["end_time"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

// ============================================================================
// Time Helper Tests
// ============================================================================

#[test_case("P1D", 0, Duration::days(1); "one day")]
#[test_case("PT1H", 0, Duration::hours(1); "one hour")]
#[test_case("P1M", 1, Duration::zero(); "one month")]
#[test_case("P1Y2M", 14, Duration::zero(); "year and months")]
#[test_case("P1W", 0, Duration::weeks(1); "one week")]
#[test_case("PT0.5S", 0, Duration::milliseconds(500); "fractional seconds")]
#[test_case("2h", 0, Duration::hours(2); "shorthand hours")]
#[test_case("3", 0, Duration::days(3); "bare number is days")]
fn test_step_parse(input: &str, months: u32, duration: Duration) {
    assert_eq!(Step::parse(input).unwrap(), Step { months, duration });
}

#[test_case("P0D"; "zero")]
#[test_case("P"; "empty")]
#[test_case("1x"; "unknown suffix")]
#[test_case("0d"; "zero shorthand")]
fn test_step_parse_rejects(input: &str) {
    assert!(Step::parse(input).is_err());
}

#[test]
fn test_parse_duration_rejects_months() {
    assert!(parse_duration("P1M").is_err());
    assert_eq!(parse_duration("P2D").unwrap(), Duration::days(2));
    assert_eq!(parse_duration("30m").unwrap(), Duration::minutes(30));
}

#[test]
fn test_step_month_arithmetic_is_calendar_aware() {
    let step = Step::parse("P1M").unwrap();
    assert_eq!(
        step.add_to(dt("2021-01-31T00:00:00Z")).unwrap(),
        dt("2021-02-28T00:00:00Z")
    );
}

#[test_case("2021-01-01T00:00:00.000000+0000", "%Y-%m-%dT%H:%M:%S%.f%z"; "iso with offset")]
#[test_case("1609459200", "%s"; "epoch seconds")]
#[test_case("1609459200000", "%ms"; "epoch millis")]
#[test_case("20210101", "%Y%m%d"; "compact date")]
fn test_parse_datetime_formats(input: &str, format: &str) {
    let parsed = parse_datetime(input, &[format.to_string()]).unwrap();
    assert_eq!(parsed, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
}

#[test]
fn test_parse_datetime_fallbacks() {
    let expected = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(parse_datetime("2021-01-01T00:00:00Z", &[]), Some(expected));
    assert_eq!(parse_datetime("2021-01-01", &[]), Some(expected));
    assert_eq!(parse_datetime("2021/01/01", &[]), Some(expected));
    assert_eq!(parse_datetime("not a date", &[]), None);
}

#[test]
fn test_parse_datetime_value_numbers() {
    let expected = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(parse_datetime_value(&json!(1_609_459_200), &[]), Some(expected));
    assert_eq!(
        parse_datetime_value(&json!(1_609_459_200_000_i64), &["%ms".to_string()]),
        Some(expected)
    );
    assert_eq!(parse_datetime_value(&json!(true), &[]), None);
}

#[test_case("%s", "1609459200"; "epoch seconds")]
#[test_case("%ms", "1609459200000"; "epoch millis")]
#[test_case("%Y-%m-%d", "2021-01-01"; "date")]
#[test_case("%Y%m%d", "20210101"; "compact date")]
fn test_format_datetime(format: &str, expected: &str) {
    let input = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(format_datetime(input, format), expected);
}

// ============================================================================
// DatetimeBasedCursor Slicing Tests
// ============================================================================

#[tokio::test]
async fn test_daily_slices_end_one_granule_before_next_start() {
    let mut cursor = daily_cursor();
    let slices: Vec<_> = cursor.stream_slices().await.unwrap().collect();

    assert_eq!(
        bounds(&slices),
        vec![
            ("2021-01-01T00:00:00Z".into(), "2021-01-01T23:59:59Z".into()),
            ("2021-01-02T00:00:00Z".into(), "2021-01-02T23:59:59Z".into()),
            ("2021-01-03T00:00:00Z".into(), "2021-01-03T23:59:59Z".into()),
            ("2021-01-04T00:00:00Z".into(), "2021-01-04T23:59:59Z".into()),
            ("2021-01-05T00:00:00Z".into(), "2021-01-05T00:00:00Z".into()),
        ]
    );
    assert!(slices.iter().all(|s| s.partition.is_empty()));
}

#[tokio::test]
async fn test_monthly_slices_follow_calendar() {
    let mut cursor = DatetimeBasedCursor::new("updated_at", dt("2021-01-01T00:00:00Z"))
        .with_end_datetime(dt("2021-03-15T00:00:00Z"))
        .with_step(Step::parse("P1M").unwrap())
        .with_cursor_granularity(Duration::days(1))
        .with_datetime_format("%Y-%m-%d");
    let slices: Vec<_> = cursor.stream_slices().await.unwrap().collect();

    assert_eq!(
        bounds(&slices),
        vec![
            ("2021-01-01".into(), "2021-01-31".into()),
            ("2021-02-01".into(), "2021-02-28".into()),
            ("2021-03-01".into(), "2021-03-15".into()),
        ]
    );
}

#[tokio::test]
async fn test_no_step_yields_single_slice() {
    let mut cursor = DatetimeBasedCursor::new("updated_at", dt("2021-01-01"))
        .with_end_datetime(dt("2023-01-01"))
        .with_datetime_format("%Y-%m-%d");
    let slices: Vec<_> = cursor.stream_slices().await.unwrap().collect();
    assert_eq!(
        bounds(&slices),
        vec![("2021-01-01".into(), "2023-01-01".into())]
    );
}

#[tokio::test]
async fn test_no_end_datetime_defaults_to_now() {
    let mut cursor =
        DatetimeBasedCursor::new("updated_at", dt("2021-01-01")).with_datetime_format("%Y-%m-%d");
    let slices: Vec<_> = cursor.stream_slices().await.unwrap().collect();
    assert_eq!(slices.len(), 1);
    let end = slices[0].cursor_slice["end_time"].as_str().unwrap();
    assert_eq!(end, Utc::now().format("%Y-%m-%d").to_string());
}

#[tokio::test]
async fn test_start_after_end_yields_nothing() {
    let mut cursor = DatetimeBasedCursor::new("updated_at", dt("2021-02-01"))
        .with_end_datetime(dt("2021-01-01"));
    assert_eq!(cursor.stream_slices().await.unwrap().count(), 0);
}

#[tokio::test]
async fn test_state_and_lookback_move_start() {
    let mut cursor = daily_cursor().with_lookback_window(Duration::days(1));
    cursor
        .set_initial_state(&state(json!({"updated_at": "2021-01-04T00:00:00Z"})))
        .unwrap();
    let slices: Vec<_> = cursor.stream_slices().await.unwrap().collect();

    assert_eq!(
        bounds(&slices),
        vec![
            ("2021-01-03T00:00:00Z".into(), "2021-01-03T23:59:59Z".into()),
            ("2021-01-04T00:00:00Z".into(), "2021-01-04T23:59:59Z".into()),
            ("2021-01-05T00:00:00Z".into(), "2021-01-05T00:00:00Z".into()),
        ]
    );
}

#[tokio::test]
async fn test_state_before_start_uses_start() {
    let mut cursor = daily_cursor();
    cursor
        .set_initial_state(&state(json!({"updated_at": "2020-06-01T00:00:00Z"})))
        .unwrap();
    let first = cursor.stream_slices().await.unwrap().next().unwrap();
    assert_eq!(first.cursor_slice["start_time"], json!("2021-01-01T00:00:00Z"));
}

#[tokio::test]
async fn test_step_without_granularity_is_config_error() {
    let mut cursor = DatetimeBasedCursor::new("updated_at", dt("2021-01-01"))
        .with_step(Step::parse("P1D").unwrap());
    let err = cursor.stream_slices().await.err().unwrap();
    assert!(err.is_configuration());
}

#[test]
fn test_granularity_without_step_is_config_error() {
    let cursor = DatetimeBasedCursor::new("updated_at", dt("2021-01-01"))
        .with_cursor_granularity(Duration::days(1));
    assert!(cursor.validate().unwrap_err().is_configuration());
}

#[test_case("P1D", Duration::days(1), true; "equal to step")]
#[test_case("P1D", Duration::seconds(1), true; "finer than step")]
#[test_case("P1D", Duration::days(2), false; "wider than step")]
#[test_case("P1M", Duration::days(28), true; "month at shortest")]
#[test_case("P1M", Duration::days(29), false; "wider than shortest month")]
fn test_granularity_is_bounded_by_step(step: &str, granularity: Duration, valid: bool) {
    let cursor = DatetimeBasedCursor::new("updated_at", dt("2021-01-01"))
        .with_step(Step::parse(step).unwrap())
        .with_cursor_granularity(granularity);
    assert_eq!(cursor.validate().is_ok(), valid);
}

#[tokio::test]
async fn test_wide_granularity_never_yields_inverted_slices() {
    let mut cursor = DatetimeBasedCursor::new("updated_at", dt("2021-01-01"))
        .with_end_datetime(dt("2021-01-05"))
        .with_step(Step::parse("P1D").unwrap())
        .with_cursor_granularity(Duration::days(3));
    let err = cursor.stream_slices().await.err().unwrap();
    assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "cursor_granularity"));
}

#[test]
fn test_invalid_format_is_rejected() {
    let cursor = daily_cursor().with_datetime_format("%Y-%Q");
    assert!(cursor.validate().is_err());
}

// ============================================================================
// DatetimeBasedCursor Progress Tests
// ============================================================================

#[test]
fn test_observe_and_close_advance_watermark() {
    let mut cursor = daily_cursor();
    let slice = range("2021-01-01T00:00:00Z", "2021-01-01T23:59:59Z");

    assert_eq!(
        cursor.observe(&slice, &record(json!({"updated_at": "2021-01-01T10:00:00Z"}), &slice)),
        Observation::Advanced
    );
    assert_eq!(
        cursor.observe(&slice, &record(json!({"updated_at": "2021-01-01T05:00:00Z"}), &slice)),
        Observation::Unchanged
    );
    // Nothing moves before the slice is closed
    assert!(cursor.get_stream_state().is_empty());

    cursor.close_slice(&slice).unwrap();
    assert_eq!(
        cursor.get_stream_state(),
        state(json!({"updated_at": "2021-01-01T23:59:59Z"}))
    );
}

#[test]
fn test_close_empty_slice_advances_to_slice_end() {
    let mut cursor = daily_cursor();
    cursor
        .close_slice(&range("2021-01-02T00:00:00Z", "2021-01-02T23:59:59Z"))
        .unwrap();
    assert_eq!(
        cursor.get_stream_state(),
        state(json!({"updated_at": "2021-01-02T23:59:59Z"}))
    );
}

#[test]
fn test_close_never_regresses() {
    let mut cursor = daily_cursor();
    cursor
        .set_initial_state(&state(json!({"updated_at": "2021-01-03T00:00:00Z"})))
        .unwrap();
    cursor
        .close_slice(&range("2021-01-01T00:00:00Z", "2021-01-01T23:59:59Z"))
        .unwrap();
    assert_eq!(
        cursor.get_stream_state(),
        state(json!({"updated_at": "2021-01-03T00:00:00Z"}))
    );
}

#[test]
fn test_close_rejects_partitioned_slice() {
    let mut cursor = daily_cursor();
    let slice = StreamSlice::new(
        obj(json!({"parent_id": 1})),
        obj(json!({"start_time": "2021-01-01T00:00:00Z", "end_time": "2021-01-01T23:59:59Z"})),
    );
    assert!(cursor.close_slice(&slice).is_err());
}

#[test_case(json!({"id": 1}), SkipReason::MissingField { field: "updated_at".into() }; "missing field")]
#[test_case(json!({"updated_at": "yesterday"}), SkipReason::Unparsable { field: "updated_at".into(), value: "yesterday".into() }; "unparsable")]
#[test_case(json!({"updated_at": "2021-02-01T00:00:00Z"}), SkipReason::OutsideSlice { field: "updated_at".into() }; "outside slice")]
fn test_observe_skips(data: Value, reason: SkipReason) {
    let mut cursor = daily_cursor();
    let slice = range("2021-01-01T00:00:00Z", "2021-01-01T23:59:59Z");
    assert_eq!(
        cursor.observe(&slice, &record(data, &slice)),
        Observation::Skipped(reason)
    );
}

#[test]
fn test_state_round_trip() {
    let mut cursor = daily_cursor();
    let original = state(json!({"updated_at": "2021-01-03T12:00:00Z"}));
    cursor.set_initial_state(&original).unwrap();
    assert_eq!(cursor.get_stream_state(), original);

    let mut fresh = daily_cursor();
    fresh.set_initial_state(&cursor.get_stream_state()).unwrap();
    assert_eq!(fresh.get_stream_state(), original);
}

#[test]
fn test_set_empty_state_is_beginning_of_time() {
    let mut cursor = daily_cursor();
    cursor.set_initial_state(&StreamState::default()).unwrap();
    assert!(cursor.watermark().is_none());
}

#[test]
fn test_unparsable_persisted_state_is_error() {
    let mut cursor = daily_cursor();
    assert!(cursor
        .set_initial_state(&state(json!({"updated_at": "garbage"})))
        .is_err());
}

#[test]
fn test_should_be_synced() {
    let mut cursor = daily_cursor();
    cursor
        .set_initial_state(&state(json!({"updated_at": "2021-01-03T00:00:00Z"})))
        .unwrap();
    let slice = StreamSlice::default();

    assert!(cursor.should_be_synced(&record(json!({"updated_at": "2021-01-03T00:00:00Z"}), &slice)));
    assert!(!cursor.should_be_synced(&record(json!({"updated_at": "2021-01-02T00:00:00Z"}), &slice)));
    assert!(!cursor.should_be_synced(&record(json!({"updated_at": "2021-02-01T00:00:00Z"}), &slice)));
    assert!(cursor.should_be_synced(&record(json!({"id": 1}), &slice)));
}

#[test]
fn test_is_greater_than_or_equal() {
    let cursor = daily_cursor();
    let slice = StreamSlice::default();
    let early = record(json!({"updated_at": "2021-01-01T00:00:00Z"}), &slice);
    let late = record(json!({"updated_at": "2021-01-02T00:00:00Z"}), &slice);
    let missing = record(json!({"id": 1}), &slice);

    assert!(cursor.is_greater_than_or_equal(&late, &early));
    assert!(cursor.is_greater_than_or_equal(&early, &early));
    assert!(!cursor.is_greater_than_or_equal(&early, &late));
    assert!(!cursor.is_greater_than_or_equal(&missing, &early));
    assert!(cursor.is_greater_than_or_equal(&early, &missing));
}

#[test_case(RequestOption::param("since"), RequestOption::param("until"); "params")]
#[test_case(RequestOption::header("since"), RequestOption::header("until"); "headers")]
#[test_case(RequestOption::body_json("since"), RequestOption::body_json("until"); "body json")]
#[test_case(RequestOption::body_data("since"), RequestOption::body_data("until"); "body data")]
fn test_slice_bounds_injection(start: RequestOption, end: RequestOption) {
    let location = start.inject_into;
    let cursor = daily_cursor()
        .with_start_time_option(start)
        .with_end_time_option(end);
    let slice = range("2021-01-01T00:00:00Z", "2021-01-04T00:00:00Z");
    let options = cursor.request_options(Some(&slice), None).unwrap();

    let expected = crate::request::RequestOptions::new()
        .with(&RequestOption::new("since", location), "2021-01-01T00:00:00Z")
        .with(&RequestOption::new("until", location), "2021-01-04T00:00:00Z");
    assert_eq!(options, expected);
}

#[test]
fn test_no_injection_without_options() {
    let cursor = daily_cursor();
    let slice = range("2021-01-01T00:00:00Z", "2021-01-04T00:00:00Z");
    assert!(cursor.request_options(Some(&slice), None).unwrap().is_empty());
    assert!(cursor.get_request_params(None, None).unwrap().is_empty());
}

#[test]
fn test_epoch_state_format() {
    let mut cursor = DatetimeBasedCursor::new("ts", dt("2021-01-01"))
        .with_end_datetime(dt("2021-01-02"))
        .with_datetime_format("%s");
    cursor
        .close_slice(&range("1609459200", "1609545600"))
        .unwrap();
    assert_eq!(cursor.get_stream_state(), state(json!({"ts": "1609545600"})));
}

// ============================================================================
// ValueCursor Tests
// ============================================================================

#[tokio::test]
async fn test_value_cursor_single_slice_carries_watermark() {
    let mut cursor = ValueCursor::new("id").with_request_option(RequestOption::param("since_id"));

    let first: Vec<_> = cursor.stream_slices().await.unwrap().collect();
    assert_eq!(first, vec![StreamSlice::default()]);
    assert!(cursor.get_request_params(Some(&first[0]), None).unwrap().is_empty());

    cursor.set_initial_state(&state(json!({"id": 42}))).unwrap();
    let resumed: Vec<_> = cursor.stream_slices().await.unwrap().collect();
    assert_eq!(resumed[0].cursor_slice, obj(json!({"id": 42})));
    assert_eq!(
        cursor.get_request_params(Some(&resumed[0]), None).unwrap()["since_id"],
        "42"
    );
}

#[test]
fn test_value_cursor_monotonic_over_unordered_input() {
    let mut cursor = ValueCursor::new("seq");
    let slice = StreamSlice::default();
    for value in [3, 9, 1, 7] {
        cursor.observe(&slice, &record(json!({"seq": value}), &slice));
    }
    cursor.close_slice(&slice).unwrap();
    assert_eq!(cursor.get_stream_state(), state(json!({"seq": 9})));

    cursor.observe(&slice, &record(json!({"seq": 2}), &slice));
    cursor.close_slice(&slice).unwrap();
    assert_eq!(cursor.get_stream_state(), state(json!({"seq": 9})));
}

#[test]
fn test_value_cursor_skips_incomparable() {
    let mut cursor = ValueCursor::new("seq");
    let slice = StreamSlice::default();
    cursor.observe(&slice, &record(json!({"seq": 1}), &slice));
    assert_eq!(
        cursor.observe(&slice, &record(json!({"seq": "x"}), &slice)),
        Observation::Skipped(SkipReason::Incomparable { field: "seq".into() })
    );
    assert_eq!(
        cursor.observe(&slice, &record(json!({"seq": null}), &slice)),
        Observation::Skipped(SkipReason::Unparsable {
            field: "seq".into(),
            value: String::new()
        })
    );
}

#[test]
fn test_value_cursor_should_be_synced() {
    let mut cursor = ValueCursor::new("seq");
    cursor.set_initial_state(&state(json!({"seq": 5}))).unwrap();
    let slice = StreamSlice::default();
    assert!(cursor.should_be_synced(&record(json!({"seq": 5}), &slice)));
    assert!(!cursor.should_be_synced(&record(json!({"seq": 4}), &slice)));
    assert!(cursor.should_be_synced(&record(json!({}), &slice)));
}
