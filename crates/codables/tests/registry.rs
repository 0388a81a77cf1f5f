//! Registration, priority dispatch and unknown data on either side.

use std::sync::Arc;

use codables::{
    CodableError, Coder, EncodeOptions, TypeHandler, TypeOptions, UnknownInputMode, Value,
};
use serde_json::json;

#[derive(Debug, PartialEq)]
struct Celsius(f64);

#[derive(Debug, PartialEq)]
struct Opaque;

fn celsius_handler(name: &str, priority: i32) -> Arc<TypeHandler> {
    let label = name.to_string();
    Arc::new(TypeHandler::new(
        name,
        |value| value.downcast_ref::<Celsius>().is_some(),
        move |_, _| Ok(Value::from(label.as_str())),
        |_, _| Ok(Value::instance(Celsius(0.0))),
        TypeOptions::new().priority(priority).flat(),
    ))
}

fn noop_handler(name: &str) -> Arc<TypeHandler> {
    Arc::new(TypeHandler::new(
        name,
        |_| false,
        |_, _| Ok(Value::Null),
        |_, _| Ok(Value::Null),
        TypeOptions::new(),
    ))
}

#[test]
fn higher_priority_handler_wins() {
    let coder = Coder::with_types([celsius_handler("Low", 5), celsius_handler("High", 10)]).unwrap();
    let tree = coder.encode(&Value::instance(Celsius(21.5))).unwrap();
    assert_eq!(tree.to_json().unwrap(), json!({"$$High": "High"}));

    // Registration order does not matter.
    let coder = Coder::with_types([celsius_handler("High", 10), celsius_handler("Low", 5)]).unwrap();
    let tree = coder.encode(&Value::instance(Celsius(21.5))).unwrap();
    assert_eq!(tree.to_json().unwrap(), json!({"$$High": "High"}));
}

#[test]
fn equal_priority_keeps_registration_order() {
    let coder = Coder::with_types([celsius_handler("First", 7), celsius_handler("Second", 7)]).unwrap();
    let tree = coder.encode(&Value::instance(Celsius(1.0))).unwrap();
    assert_eq!(tree.to_json().unwrap(), json!({"$$First": "First"}));
}

#[test]
fn class_fast_path_yields_to_higher_priority() {
    let indexed = Arc::new(TypeHandler::new(
        "Indexed",
        |value| value.downcast_ref::<Celsius>().is_some(),
        |_, _| Ok(Value::from("indexed")),
        |_, _| Ok(Value::instance(Celsius(0.0))),
        TypeOptions::new().priority(1).flat().class::<Celsius>(),
    ));
    let coder = Coder::with_types([indexed, celsius_handler("Scanned", 20)]).unwrap();
    let tree = coder.encode(&Value::instance(Celsius(1.0))).unwrap();
    assert_eq!(tree.to_json().unwrap(), json!({"$$Scanned": "Scanned"}));
}

#[test]
fn dependencies_are_registered_transitively() {
    let leaf = noop_handler("Leaf");
    let middle = {
        let leaf = Arc::clone(&leaf);
        Arc::new(TypeHandler::new(
            "Middle",
            |_| false,
            |_, _| Ok(Value::Null),
            |_, _| Ok(Value::Null),
            TypeOptions::new().depends_on(move || vec![Arc::clone(&leaf)]),
        ))
    };
    let top = {
        let middle = Arc::clone(&middle);
        Arc::new(TypeHandler::new(
            "Top",
            |_| false,
            |_, _| Ok(Value::Null),
            |_, _| Ok(Value::Null),
            TypeOptions::new().depends_on(move || vec![Arc::clone(&middle)]),
        ))
    };

    let coder = Coder::with_types([top]).unwrap();
    for name in ["Top", "Middle", "Leaf"] {
        assert!(coder.get_type(name).is_some(), "{name} not registered");
    }
    assert!(Arc::ptr_eq(coder.get_type("Leaf").unwrap(), &leaf));
}

#[test]
fn mutual_dependencies_terminate() {
    fn ping() -> Arc<TypeHandler> {
        static PING: std::sync::OnceLock<Arc<TypeHandler>> = std::sync::OnceLock::new();
        Arc::clone(PING.get_or_init(|| {
            Arc::new(TypeHandler::new(
                "Ping",
                |_| false,
                |_, _| Ok(Value::Null),
                |_, _| Ok(Value::Null),
                TypeOptions::new().depends_on(|| vec![pong()]),
            ))
        }))
    }
    fn pong() -> Arc<TypeHandler> {
        static PONG: std::sync::OnceLock<Arc<TypeHandler>> = std::sync::OnceLock::new();
        Arc::clone(PONG.get_or_init(|| {
            Arc::new(TypeHandler::new(
                "Pong",
                |_| false,
                |_, _| Ok(Value::Null),
                |_, _| Ok(Value::Null),
                TypeOptions::new().depends_on(|| vec![ping()]),
            ))
        }))
    }

    let coder = Coder::with_types([ping()]).unwrap();
    assert!(coder.get_type("Ping").is_some());
    assert!(coder.get_type("Pong").is_some());
}

#[test]
fn registering_the_same_handler_twice_is_a_no_op() {
    let handler = noop_handler("Twice");
    let mut coder = Coder::new();
    let before = coder.registry().len();
    coder.register(Arc::clone(&handler)).unwrap();
    coder.register(handler).unwrap();
    assert_eq!(coder.registry().len(), before + 1);
}

#[test]
fn duplicate_names_are_rejected() {
    let mut coder = Coder::new();
    coder.register(noop_handler("Dup")).unwrap();
    let err = coder.register(noop_handler("Dup")).unwrap_err();
    assert_eq!(err.to_string(), "Coder type \"Dup\" already registered");

    let err = coder.register(noop_handler("Date")).unwrap_err();
    assert!(matches!(err, CodableError::DuplicateType { name } if name == "Date"));
}

#[test]
fn failed_registration_leaves_registry_untouched() {
    let clash = noop_handler("Set");
    let wrapper = Arc::new(TypeHandler::new(
        "Wrapper",
        |_| false,
        |_, _| Ok(Value::Null),
        |_, _| Ok(Value::Null),
        TypeOptions::new().depends_on(move || vec![Arc::clone(&clash)]),
    ));
    let mut coder = Coder::new();
    assert!(coder.register(wrapper).is_err());
    assert!(coder.get_type("Wrapper").is_none());
}

#[test]
fn reserved_and_malformed_names_are_rejected() {
    let mut coder = Coder::new();
    for name in ["", "ref", "id", "~Thing", "$Thing"] {
        let err = coder.register(noop_handler(name)).unwrap_err();
        assert!(
            matches!(err, CodableError::InvalidTypeName { .. }),
            "{name:?} was accepted"
        );
    }
}

#[test]
fn shared_coder_is_read_only() {
    let mut shared = codables::coder().clone();
    let err = shared.register(noop_handler("Extra")).unwrap_err();
    assert!(matches!(err, CodableError::DefaultCoderImmutable));
    assert!(codables::coder().get_type("Extra").is_none());
}

#[test]
fn custom_coders_are_independent() {
    let mut first = Coder::new();
    let second = Coder::new();
    first.register(noop_handler("OnlyFirst")).unwrap();
    assert!(first.get_type("OnlyFirst").is_some());
    assert!(second.get_type("OnlyFirst").is_none());
}

#[test]
fn unknown_tag_decodes_to_its_payload() {
    let tree = Value::from(json!({"list": [{"$$Unheard": {"a": 1}}, {"$$Unheard": [1, "$$x"]}]}));
    let decoded = codables::decode(&tree).unwrap();
    assert_eq!(
        decoded,
        Value::from(json!({"list": [{"a": 1}, [1, "$$x"]]}))
    );
}

#[test]
fn unknown_tag_payload_keeps_references() {
    let tree = Value::from(json!([{"$$id": 0, "$$Later": {"v": 1}}, {"$$ref": 0}]));
    let decoded = codables::decode(&tree).unwrap();
    let items = decoded.as_array().unwrap();
    assert!(items.get(0).unwrap().same_ref(&items.get(1).unwrap()));
    assert_eq!(items.get(0).unwrap(), Value::from(json!({"v": 1})));
}

// ----------------------------------------------------------- Unknown input

fn encode_opaque(mode: UnknownInputMode) -> codables::Result<Value> {
    let options = EncodeOptions {
        unknown_input_mode: mode,
        ..EncodeOptions::default()
    };
    let value = Value::object([("thing", Value::instance(Opaque)), ("n", Value::from(1))]);
    codables::coder().encode_with(&value, &options)
}

#[test]
fn unknown_input_defaults_to_null() {
    let tree = encode_opaque(UnknownInputMode::Null).unwrap();
    assert_eq!(tree.to_json().unwrap(), json!({"thing": null, "n": 1}));
}

#[test]
fn unknown_input_can_pass_through() {
    let tree = encode_opaque(UnknownInputMode::Unchanged).unwrap();
    let thing = tree.as_object().unwrap().get("thing").unwrap();
    assert_eq!(thing.downcast_ref::<Opaque>(), Some(&Opaque));
    assert!(matches!(tree.to_json(), Err(CodableError::NotJson { .. })));
}

#[test]
fn unknown_input_can_fail() {
    let err = encode_opaque(UnknownInputMode::Throw).unwrap_err();
    assert!(matches!(err, CodableError::UnsupportedValue { .. }));
    assert!(err.to_string().contains("Opaque"), "{err}");
}

#[test]
fn add_type_builds_and_registers() {
    let mut coder = Coder::new();
    let handler = coder
        .add_type(
            "Celsius",
            |value| value.downcast_ref::<Celsius>().is_some(),
            |value, _| {
                let degrees = value.downcast_ref::<Celsius>().map_or(0.0, |c| c.0);
                Ok(Value::Number(degrees))
            },
            |payload, _| Ok(Value::instance(Celsius(payload.as_f64().unwrap_or_default()))),
            TypeOptions::new().flat(),
        )
        .unwrap();
    assert_eq!(handler.tag_key(), "$$Celsius");

    let copy = coder.copy(&Value::instance(Celsius(36.6))).unwrap();
    assert_eq!(copy.downcast_ref::<Celsius>(), Some(&Celsius(36.6)));
}
