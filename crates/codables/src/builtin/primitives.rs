//! Handlers for values JSON has no literal for: `undefined`, big integers,
//! symbols and the special numbers.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use num_bigint::BigInt;

use crate::error::{CodableError, Result};
use crate::handler::{TypeHandler, TypeOptions};
use crate::value::{Symbol, Value};

fn expect_str<'v>(type_name: &'static str, payload: &'v Value) -> Result<&'v str> {
    payload
        .as_str()
        .ok_or_else(|| CodableError::invalid_payload(type_name, "expected a string"))
}

pub(super) fn undefined_handler() -> TypeHandler {
    TypeHandler::new(
        "undefined",
        Value::is_undefined,
        |_, _| Ok(Value::Null),
        |_, _| Ok(Value::Undefined),
        TypeOptions::new().flat(),
    )
}

pub(super) fn bigint_handler() -> TypeHandler {
    TypeHandler::new(
        "BigInt",
        |value| matches!(value, Value::BigInt(_)),
        |value, _| match value {
            Value::BigInt(n) => Ok(Value::String(n.to_string())),
            _ => Ok(Value::Null),
        },
        |payload, _| {
            let digits = expect_str("BigInt", &payload)?;
            digits
                .parse::<BigInt>()
                .map(Value::BigInt)
                .map_err(|e| CodableError::invalid_payload("BigInt", e.to_string()))
        },
        TypeOptions::new().flat(),
    )
}

/// Symbols seen by the encoder, by wire key. Consulted before the global
/// registry so a local symbol decodes back to itself in this process.
fn encoded_symbols() -> &'static Mutex<HashMap<String, Symbol>> {
    static ENCODED: OnceLock<Mutex<HashMap<String, Symbol>>> = OnceLock::new();
    ENCODED.get_or_init(|| Mutex::new(HashMap::new()))
}

fn symbol_key(symbol: &Symbol) -> String {
    let key = symbol
        .key_for()
        .unwrap_or_else(|| symbol.description().unwrap_or_default().to_string());
    encoded_symbols()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key.clone(), symbol.clone());
    key
}

fn symbol_for(key: &str) -> Symbol {
    let known = encoded_symbols()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned();
    known.unwrap_or_else(|| Symbol::for_key(key))
}

pub(super) fn symbol_handler() -> TypeHandler {
    TypeHandler::new(
        "Symbol",
        |value| matches!(value, Value::Symbol(_)),
        |value, _| {
            let Value::Symbol(symbol) = value else {
                return Ok(Value::Null);
            };
            Ok(Value::String(symbol_key(symbol)))
        },
        |payload, _| {
            let key = expect_str("Symbol", &payload)?;
            Ok(Value::Symbol(symbol_for(key)))
        },
        TypeOptions::new().flat(),
    )
}

/// Wire name of a number JSON cannot hold, if it is one.
pub fn special_number_name(n: f64) -> Option<&'static str> {
    if n.is_nan() {
        Some("NaN")
    } else if n == f64::INFINITY {
        Some("Infinity")
    } else if n == f64::NEG_INFINITY {
        Some("-Infinity")
    } else if n == 0.0 && n.is_sign_negative() {
        Some("-0")
    } else {
        None
    }
}

fn special_number(name: &str) -> Option<f64> {
    match name {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        "-0" => Some(-0.0),
        _ => None,
    }
}

pub(super) fn number_handler() -> TypeHandler {
    TypeHandler::new(
        "num",
        |value| value.as_f64().and_then(special_number_name).is_some(),
        |value, _| {
            Ok(value
                .as_f64()
                .and_then(special_number_name)
                .map_or(Value::Null, Value::from))
        },
        |payload, _| {
            let name = expect_str("num", &payload)?;
            special_number(name)
                .map(Value::Number)
                .ok_or_else(|| CodableError::invalid_payload("num", format!("unknown number {name}")))
        },
        TypeOptions::new().flat(),
    )
}
