//! Tests for slice module

use super::*;
use crate::types::JsonObject;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashSet;

fn obj(value: serde_json::Value) -> JsonObject {
    value.as_object().cloned().unwrap()
}

fn partition(id: &str) -> StreamSlice {
    StreamSlice::from_partition(obj(json!({ "parent_id": id })))
}

fn range(start: &str, end: &str) -> StreamSlice {
    StreamSlice::from_cursor_slice(obj(json!({ "start_time": start, "end_time": end })))
}

// ============================================================================
// StreamSlice Tests
// ============================================================================

#[test]
fn test_slice_equality_ignores_last_slice() {
    let a = StreamSlice::new(obj(json!({"p": 1})), obj(json!({"c": 2})));
    let b = a.clone().with_last_slice(true);
    assert_eq!(a, b);

    let mut set = HashSet::new();
    set.insert(a);
    assert!(set.contains(&b));
}

#[test]
fn test_slice_hash_is_structural() {
    let a = StreamSlice::new(obj(json!({"p": "1"})), JsonObject::new());
    let b = StreamSlice::new(obj(json!({"p": "1"})), JsonObject::new());
    let c = StreamSlice::new(obj(json!({"p": 1})), JsonObject::new());

    let set: HashSet<_> = [a, b, c].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn test_slice_partition_and_cursor_halves_are_distinct() {
    let as_partition = StreamSlice::new(obj(json!({"k": "v"})), JsonObject::new());
    let as_cursor = StreamSlice::new(JsonObject::new(), obj(json!({"k": "v"})));
    assert_ne!(as_partition, as_cursor);
}

#[test]
fn test_slice_get_prefers_partition() {
    let slice = StreamSlice::new(
        obj(json!({"id": "p", "parent_id": "123"})),
        obj(json!({"id": "c", "start_time": "2024-01-01"})),
    );
    assert_eq!(slice.get_str("parent_id"), Some("123"));
    assert_eq!(slice.get_str("start_time"), Some("2024-01-01"));
    assert_eq!(slice.get_str("id"), Some("p"));
    assert!(slice.get("missing").is_none());

    let merged = slice.to_object();
    assert_eq!(merged.get("id"), Some(&json!("c")));
    assert_eq!(merged.len(), 3);
}

#[test]
fn test_slice_strip_halves() {
    let slice = StreamSlice::new(obj(json!({"p": 1})), obj(json!({"c": 2}))).with_last_slice(true);

    let cursor_only = slice.without_partition();
    assert!(cursor_only.partition.is_empty());
    assert_eq!(cursor_only.cursor_slice, obj(json!({"c": 2})));
    assert!(cursor_only.last_slice);

    let partition_only = slice.without_cursor_slice();
    assert_eq!(partition_only.partition, obj(json!({"p": 1})));
    assert!(partition_only.cursor_slice.is_empty());
}

#[test]
fn test_slice_serialization_omits_false_last_slice() {
    let slice = partition("1");
    let value = serde_json::to_value(&slice).unwrap();
    assert_eq!(
        value,
        json!({"partition": {"parent_id": "1"}, "cursor_slice": {}})
    );

    let flagged = serde_json::to_value(slice.with_last_slice(true)).unwrap();
    assert_eq!(flagged["last_slice"], json!(true));
}

// ============================================================================
// Record Tests
// ============================================================================

#[test]
fn test_record_get_nested_field() {
    let record = Record::from_value(
        json!({"id": 1, "meta": {"updated_at": "2024-01-01"}}),
        None,
    );
    assert_eq!(record.get("id"), Some(&json!(1)));
    assert_eq!(record.get("meta.updated_at"), Some(&json!("2024-01-01")));
    assert!(record.get("meta.missing").is_none());
}

#[test]
fn test_record_from_scalar_is_wrapped() {
    let record = Record::from_value(json!("x"), None);
    assert_eq!(record.get("data"), Some(&json!("x")));
}

#[test]
fn test_record_without_partition() {
    let slice = StreamSlice::new(obj(json!({"p": 1})), obj(json!({"c": 2})));
    let record = Record::from_value(json!({"id": 1}), Some(slice));

    let stripped = record.without_partition();
    let stripped_slice = stripped.associated_slice.unwrap();
    assert!(stripped_slice.partition.is_empty());
    assert_eq!(stripped.data, record.data);
    assert_eq!(record.cursor_slice(), Some(&obj(json!({"c": 2}))));
}

// ============================================================================
// Generator Tests
// ============================================================================

#[test]
fn test_flag_last_slice_marks_only_final_item() {
    let slices: Vec<_> = flag_last_slice(vec![partition("1"), partition("2"), partition("3")]).collect();
    let flags: Vec<bool> = slices.iter().map(|s| s.last_slice).collect();
    assert_eq!(flags, vec![false, false, true]);
}

#[test]
fn test_flag_last_slice_single_and_empty() {
    let single: Vec<_> = flag_last_slice(vec![partition("1")]).collect();
    assert_eq!(single.len(), 1);
    assert!(single[0].last_slice);

    let mut empty = flag_last_slice(Vec::<StreamSlice>::new());
    assert!(empty.next().is_none());
    assert!(empty.next().is_none());
}

#[test]
fn test_flag_last_slice_clears_stale_flags() {
    let input = vec![partition("1").with_last_slice(true), partition("2")];
    let flags: Vec<bool> = flag_last_slice(input).map(|s| s.last_slice).collect();
    assert_eq!(flags, vec![false, true]);
}

#[test]
fn test_product_partition_first() {
    let slices: Vec<_> = SliceGenerator::product(
        vec![partition("1"), partition("2")],
        vec![range("a", "b"), range("c", "d")],
        SliceOrder::PartitionFirst,
    )
    .collect();

    let expected = vec![
        StreamSlice::new(partition("1").partition, range("a", "b").cursor_slice),
        StreamSlice::new(partition("1").partition, range("c", "d").cursor_slice),
        StreamSlice::new(partition("2").partition, range("a", "b").cursor_slice),
        StreamSlice::new(partition("2").partition, range("c", "d").cursor_slice),
    ];
    assert_eq!(slices, expected);
    assert_eq!(slices.iter().filter(|s| s.last_slice).count(), 1);
    assert!(slices[3].last_slice);
}

#[test]
fn test_product_cursor_first() {
    let slices: Vec<_> = SliceGenerator::product(
        vec![partition("1"), partition("2")],
        vec![range("a", "b"), range("c", "d")],
        SliceOrder::CursorFirst,
    )
    .collect();

    assert_eq!(slices[0].get_str("parent_id"), Some("1"));
    assert_eq!(slices[1].get_str("parent_id"), Some("2"));
    assert_eq!(slices[1].get_str("start_time"), Some("a"));
    assert_eq!(slices[2].get_str("start_time"), Some("c"));
    assert!(slices[3].last_slice);
}

#[test]
fn test_product_with_empty_side_is_empty() {
    let no_partitions =
        SliceGenerator::product(Vec::new(), vec![range("a", "b")], SliceOrder::PartitionFirst);
    assert_eq!(no_partitions.count(), 0);

    let no_ranges = SliceGenerator::product(vec![partition("1")], Vec::new(), SliceOrder::PartitionFirst);
    assert_eq!(no_ranges.count(), 0);
}

#[test]
fn test_exactly_one_last_slice_for_all_small_products() {
    for p in 1..4 {
        for c in 1..4 {
            let partitions = (0..p).map(|i| partition(&i.to_string())).collect();
            let ranges = (0..c).map(|i| range(&i.to_string(), &i.to_string())).collect();
            let slices: Vec<_> =
                SliceGenerator::product(partitions, ranges, SliceOrder::PartitionFirst).collect();
            assert_eq!(slices.len(), p * c);
            assert_eq!(slices.iter().filter(|s| s.last_slice).count(), 1);
            assert!(slices.last().unwrap().last_slice);
        }
    }
}
