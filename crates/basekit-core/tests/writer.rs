//! Streaming result writer tests for basekit-core.
// crates/basekit-core/tests/writer.rs
// =============================================================================
// Module: Result Writer Tests
// Description: State machine transitions and emitted text of the JSON writer.
// Purpose: Ensure every accepted operation sequence yields well-formed JSON.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only writer assertions."
)]

use basekit_core::JsonWriter;
use basekit_core::WriterError;
use basekit_core::WriterState;
use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;

#[test]
fn single_entry_map_has_exact_bytes() {
    let mut writer = JsonWriter::new();
    writer.open_map().unwrap().key("a").unwrap().value(&1).unwrap().close().unwrap();
    assert_eq!(writer.into_pending(), r#"{"a":1}"#);
}

#[test]
fn commas_separate_keys_and_items() {
    let mut writer = JsonWriter::new();
    writer
        .open_map()
        .unwrap()
        .key("list")
        .unwrap()
        .open_list()
        .unwrap()
        .value(&1)
        .unwrap()
        .value("two")
        .unwrap()
        .open_map()
        .unwrap()
        .close()
        .unwrap()
        .close()
        .unwrap()
        .key("flag")
        .unwrap()
        .value(&true)
        .unwrap()
        .close()
        .unwrap();
    assert_eq!(writer.into_pending(), r#"{"list":[1,"two",{}],"flag":true}"#);
}

#[test]
fn close_on_empty_stack_is_usage_error() {
    let mut writer = JsonWriter::new();
    assert_eq!(writer.close().err(), Some(WriterError::NothingToClose));
}

#[test]
fn key_while_awaiting_value_is_usage_error() {
    let mut writer = JsonWriter::new();
    writer.open_map().unwrap().key("a").unwrap();
    assert_eq!(writer.state(), WriterState::AwaitingValue);
    assert_eq!(writer.key("b").err(), Some(WriterError::DanglingKey));
}

#[test]
fn value_in_map_without_key_is_usage_error() {
    let mut writer = JsonWriter::new();
    writer.open_map().unwrap();
    assert_eq!(writer.value(&1).err(), Some(WriterError::ValueWithoutKey));
    assert_eq!(writer.raw("1").err(), Some(WriterError::ValueWithoutKey));
}

#[test]
fn key_inside_list_is_usage_error() {
    let mut writer = JsonWriter::new();
    writer.open_list().unwrap();
    assert_eq!(writer.key("a").err(), Some(WriterError::KeyOutsideMap));
}

#[test]
fn close_with_dangling_key_is_usage_error() {
    let mut writer = JsonWriter::new();
    writer.open_map().unwrap().key("a").unwrap();
    assert_eq!(writer.close().err(), Some(WriterError::DanglingKey));
}

#[test]
fn keys_are_json_escaped() {
    let mut writer = JsonWriter::new();
    writer.open_map().unwrap().key("quo\"te").unwrap().value("x").unwrap().close().unwrap();
    let parsed: Value = serde_json::from_str(&writer.into_pending()).unwrap();
    assert_eq!(parsed, json!({"quo\"te": "x"}));
}

#[test]
fn raw_forwards_preformed_items() {
    let mut writer = JsonWriter::new();
    writer.open_list().unwrap().raw(r#"{"a":1}"#).unwrap().raw("[2]").unwrap().close().unwrap();
    assert_eq!(writer.into_pending(), r#"[{"a":1},[2]]"#);
}

#[test]
fn unwind_closes_containers_and_fills_dangling_key() {
    let mut writer = JsonWriter::new();
    writer.open_map().unwrap().key("result").unwrap().open_map().unwrap().key("open").unwrap();
    writer.unwind_to(1).unwrap();
    writer.close().unwrap();
    assert_eq!(writer.into_pending(), r#"{"result":{"open":null}}"#);
}

#[test]
fn capture_retains_drained_text() {
    let mut writer = JsonWriter::with_capture();
    writer.open_map().unwrap().key("a").unwrap();
    let first = writer.take_pending();
    writer.value(&[1, 2]).unwrap().close().unwrap();
    let second = writer.take_pending();
    assert_eq!(format!("{first}{second}"), r#"{"a":[1,2]}"#);
    assert_eq!(writer.captured(), Some(r#"{"a":[1,2]}"#));
    assert_eq!(writer.pending_len(), 0);
}

#[test]
fn capture_is_disabled_by_default() {
    let mut writer = JsonWriter::new();
    writer.value(&1).unwrap();
    assert_eq!(writer.captured(), None);
}

/// Writer operation used by the property test.
#[derive(Debug, Clone)]
enum Op {
    OpenMap,
    OpenList,
    Close,
    Key(String),
    Value(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::OpenMap),
        Just(Op::OpenList),
        Just(Op::Close),
        "[a-z]{1,4}".prop_map(Op::Key),
        any::<i64>().prop_map(Op::Value),
    ]
}

proptest! {
    #[test]
    fn accepted_sequences_produce_valid_json(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let mut writer = JsonWriter::new();
        let mut started = false;
        for op in ops {
            if started && writer.depth() == 0 {
                break;
            }
            let result = match op {
                Op::OpenMap => writer.open_map().map(|_| ()),
                Op::OpenList => writer.open_list().map(|_| ()),
                Op::Close => writer.close().map(|_| ()),
                Op::Key(name) => writer.key(&name).map(|_| ()),
                Op::Value(value) => writer.value(&value).map(|_| ()),
            };
            if result.is_ok() {
                started = true;
            }
        }
        if started {
            writer.unwind_to(0).unwrap();
            let text = writer.into_pending();
            prop_assert!(serde_json::from_str::<Value>(&text).is_ok(), "invalid json: {}", text);
        }
    }
}
