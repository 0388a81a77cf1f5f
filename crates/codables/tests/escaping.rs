//! User data that looks like wire syntax is escaped and restored.

use codables::Value;
use proptest::prelude::*;
use serde_json::{json, Value as Json};

fn check(input: Json, wire: Json) {
    let value = Value::from(input.clone());
    let tree = codables::encode(&value).unwrap_or_else(|e| panic!("encode({input}) failed: {e}"));
    assert_eq!(tree.to_json().unwrap(), wire, "input: {input}");
    let back = codables::decode(&tree).unwrap();
    assert_eq!(back, value, "wire: {wire}");
}

#[test]
fn record_shaped_like_a_tag() {
    check(json!({"$$Set": [1, 2, 3]}), json!({"~$$Set": [1, 2, 3]}));
    let decoded = codables::decode(&Value::from(json!({"~$$Set": [1, 2, 3]}))).unwrap();
    assert!(decoded.as_object().is_some());
}

#[test]
fn record_shaped_like_an_alias() {
    check(json!({"$$ref": 0}), json!({"~$$ref": 0}));
    check(json!({"$$id": 4, "a": 1}), json!({"~$$id": 4, "a": 1}));
}

#[test]
fn already_escaped_keys_gain_another_sigil() {
    check(json!({"~$$Date": "x"}), json!({"~~$$Date": "x"}));
    check(json!({"~~$$": 1}), json!({"~~~$$": 1}));
}

#[test]
fn ordinary_keys_are_untouched() {
    check(
        json!({"$single": 1, "a$$b": 2, "~tilde": 3, "": 4}),
        json!({"$single": 1, "a$$b": 2, "~tilde": 3, "": 4}),
    );
}

#[test]
fn array_id_marker_strings() {
    check(json!(["$$id:0", 1]), json!(["~$$id:0", 1]));
    check(json!("$$id:12"), json!("~$$id:12"));
    check(json!("~$$id:12"), json!("~~$$id:12"));
}

#[test]
fn strings_that_merely_resemble_markers() {
    check(
        json!(["$$id:", "$$id:x", "$$ref", "$$Date", "prefix $$id:1"]),
        json!(["$$id:", "$$id:x", "$$ref", "$$Date", "prefix $$id:1"]),
    );
}

#[test]
fn escaped_record_inside_shared_value() {
    let shared = Value::from(json!({"$$Map": []}));
    let value = Value::array([shared.clone(), shared]);
    let tree = codables::encode(&value).unwrap();
    assert_eq!(
        tree.to_json().unwrap(),
        json!([{"$$id": 0, "~$$Map": []}, {"$$ref": 0}])
    );
    let decoded = codables::decode(&tree).unwrap();
    let items = decoded.as_array().unwrap();
    assert!(items.get(0).unwrap().same_ref(&items.get(1).unwrap()));
    assert_eq!(items.get(0).unwrap(), Value::from(json!({"$$Map": []})));
}

#[test]
fn encoded_trees_can_be_encoded_again() {
    let date = Value::instance(codables::Date::from_millis(0.0));
    let shared = Value::object([("x", Value::from(1))]);
    let value = Value::array([date, shared.clone(), shared]);

    let once = codables::encode(&value).unwrap();
    let twice = codables::encode(&once).unwrap();
    assert_eq!(
        twice.to_json().unwrap(),
        json!([
            {"~$$Date": "1970-01-01T00:00:00.000Z"},
            {"~$$id": 0, "x": 1},
            {"~$$ref": 0}
        ])
    );
    assert_eq!(codables::decode(&twice).unwrap(), once);
}

fn colliding() -> impl Strategy<Value = String> {
    "~{0,3}\\$\\$(id:[0-9]{1,4}|ref|id|[A-Za-z]{1,8})"
}

proptest! {
    #[test]
    fn n_fold_round_trip(s in colliding(), n in 0usize..5) {
        let value = Value::array([
            Value::from(s.as_str()),
            Value::object([(s.as_str(), Value::from(s.as_str()))]),
        ]);

        let mut tree = value.clone();
        for _ in 0..n {
            tree = codables::encode(&tree).unwrap();
        }
        for _ in 0..n {
            tree = codables::decode(&tree).unwrap();
        }
        prop_assert_eq!(tree, value);
    }

    #[test]
    fn colliding_keys_always_change(s in colliding()) {
        let value = Value::object([(s.as_str(), Value::Null)]);
        let tree = codables::encode(&value).unwrap();
        prop_assert_ne!(tree, value);
    }

    #[test]
    fn arbitrary_strings_round_trip(s in "\\PC{0,16}") {
        let value = Value::from(s.as_str());
        let tree = codables::encode(&value).unwrap();
        prop_assert_eq!(codables::decode(&tree).unwrap(), value);
    }
}
