use crate::error::{CodableError, Result};
use crate::handler::{TypeHandler, TypeOptions};
use crate::value::{Object, Value};

/// Placeholder for a value that is supplied by the caller at decode time
/// instead of being serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    key: String,
    optional: bool,
}

impl ExternalReference {
    pub fn new(key: impl Into<String>) -> Self {
        ExternalReference {
            key: key.into(),
            optional: false,
        }
    }

    /// Decodes to `undefined` instead of failing when the key is missing.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// `Value` wrapping a required [`ExternalReference`].
pub fn external_reference(key: impl Into<String>) -> Value {
    Value::instance(ExternalReference::new(key))
}

fn parse(payload: &Value) -> Result<ExternalReference> {
    let record = payload
        .as_object()
        .ok_or_else(|| CodableError::invalid_payload("external", "expected {key, isOptional}"))?;
    let key = record
        .get("key")
        .and_then(|key| key.as_str().map(str::to_string))
        .ok_or_else(|| CodableError::invalid_payload("external", "missing key"))?;
    let optional = record
        .get("isOptional")
        .and_then(|flag| flag.as_bool())
        .unwrap_or(false);
    Ok(ExternalReference { key, optional })
}

pub(super) fn handler() -> TypeHandler {
    TypeHandler::new(
        "external",
        |value| value.downcast_ref::<ExternalReference>().is_some(),
        |value, _| {
            let Some(reference) = value.downcast_ref::<ExternalReference>() else {
                return Ok(Value::Null);
            };
            let payload = Object::new();
            payload.insert("key", reference.key.as_str());
            payload.insert("isOptional", reference.optional);
            Ok(Value::Object(payload))
        },
        |payload, ctx| {
            let reference = parse(&payload)?;
            match ctx.external_reference(&reference.key) {
                Some(value) => Ok(value),
                None if reference.optional => Ok(Value::Undefined),
                None => Err(CodableError::MissingExternalReference { key: reference.key }),
            }
        },
        TypeOptions::new().flat().class::<ExternalReference>(),
    )
}
