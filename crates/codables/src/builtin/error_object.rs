use indexmap::IndexMap;

use crate::error::{CodableError, Result};
use crate::handler::{TypeHandler, TypeOptions};
use crate::value::{Object, Value};

const DEFAULT_NAME: &str = "Error";

/// An error value: message, name, optional cause, extra properties and an
/// optional stack trace.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorObject {
    pub name: String,
    pub message: String,
    pub cause: Option<Value>,
    pub properties: IndexMap<String, Value>,
    pub stack: Option<String>,
}

impl ErrorObject {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorObject {
            name: DEFAULT_NAME.to_string(),
            message: message.into(),
            cause: None,
            properties: IndexMap::new(),
            stack: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_cause(mut self, cause: impl Into<Value>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    fn has_custom_name(&self) -> bool {
        !self.name.is_empty() && self.name != DEFAULT_NAME
    }
}

fn encode(error: &ErrorObject, include_stack: bool) -> Value {
    let stack = error.stack.as_ref().filter(|_| include_stack);
    if !error.has_custom_name()
        && error.cause.is_none()
        && error.properties.is_empty()
        && stack.is_none()
    {
        return Value::String(error.message.clone());
    }

    let payload = Object::new();
    payload.insert("message", error.message.as_str());
    if error.has_custom_name() {
        payload.insert("name", error.name.as_str());
    }
    if let Some(cause) = &error.cause {
        payload.insert("cause", cause.clone());
    }
    if !error.properties.is_empty() {
        payload.insert(
            "properties",
            Value::Object(Object::from_map(error.properties.clone())),
        );
    }
    if let Some(stack) = stack {
        payload.insert("stack", stack.as_str());
    }
    Value::Object(payload)
}

fn decode(payload: Value) -> Result<ErrorObject> {
    let record = match payload {
        Value::String(message) => return Ok(ErrorObject::new(message)),
        Value::Object(record) => record,
        other => {
            return Err(CodableError::invalid_payload(
                "Error",
                format!("expected a message or a record, got {}", other.kind()),
            ))
        }
    };

    let text = |key: &str| record.get(key).and_then(|v| v.as_str().map(str::to_string));
    let mut error = ErrorObject::new(text("message").unwrap_or_default());
    if let Some(name) = text("name") {
        error.name = name;
    }
    error.cause = record.get("cause");
    error.stack = text("stack");
    if let Some(Value::Object(properties)) = record.get("properties") {
        error.properties = properties.borrow().clone();
    }
    Ok(error)
}

pub(super) fn handler() -> TypeHandler {
    TypeHandler::new(
        "Error",
        |value| value.downcast_ref::<ErrorObject>().is_some(),
        |value, ctx| {
            Ok(value
                .downcast_ref::<ErrorObject>()
                .map_or(Value::Null, |error| encode(error, ctx.include_error_stack())))
        },
        |payload, _| decode(payload).map(Value::instance),
        TypeOptions::new().class::<ErrorObject>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_error_is_just_its_message() {
        assert_eq!(
            encode(&ErrorObject::new("boom"), false),
            Value::from("boom")
        );
    }

    #[test]
    fn stack_only_when_asked() {
        let error = ErrorObject::new("boom").with_stack("at main");
        assert_eq!(encode(&error, false), Value::from("boom"));
        let encoded = encode(&error, true);
        assert_eq!(
            encoded.as_object().unwrap().get("stack"),
            Some(Value::from("at main"))
        );
    }

    #[test]
    fn custom_name_and_properties() {
        let error = ErrorObject::new("nope")
            .with_name("TypeError")
            .with_property("code", 42);
        let decoded = decode(encode(&error, false)).unwrap();
        assert_eq!(decoded, error);
    }
}
