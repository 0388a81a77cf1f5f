//! The dynamic value model the codec reads and writes.
//!
//! [`Value`] covers everything the codec knows how to carry: JSON primitives,
//! `undefined`, big integers, symbols, functions, shared arrays and records,
//! and [`Instance`] handles for every other kind of object (dates, sets, maps,
//! user types, ...). Arrays, records and instances are reference counted:
//! cloning the handle yields the same object, which is what the codec tracks
//! to preserve shared and circular references.
//!
//! Values are single-threaded (`Rc` based). Comparing two distinct cyclic
//! graphs with `==` does not terminate.

mod key;
mod object;
mod symbol;

pub use key::Key;
pub use object::{Array, CustomObject, Function, Instance, Object};
pub use symbol::Symbol;

use std::any::Any;

use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::error::{CodableError, Result};

/// Largest integer a double holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Clone, Debug, Default)]
pub enum Value {
    Undefined,
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    BigInt(BigInt),
    Symbol(Symbol),
    Function(Function),
    Array(Array),
    Object(Object),
    Instance(Instance),
}

impl Value {
    /// Wraps any `Debug + PartialEq` type in an [`Instance`].
    pub fn instance<T: CustomObject>(value: T) -> Self {
        Value::Instance(Instance::new(value))
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Array::from_vec(items.into_iter().collect()))
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(Object::from_map(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::BigInt(_) => "bigint",
            Value::Symbol(_) => "symbol",
            Value::Function(_) => "function",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Instance(_) => "instance",
        }
    }

    /// Address of the referenced object for values that have identity.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(a) => Some(a.addr()),
            Value::Object(o) => Some(o.addr()),
            Value::Instance(i) => Some(i.addr()),
            Value::Symbol(s) => Some(s.addr()),
            Value::Function(f) => Some(f.addr()),
            _ => None,
        }
    }

    /// `true` when both values are the very same object.
    pub fn same_ref(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as a non-negative integer, if it is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_SAFE_INTEGER => {
                Some(*n as u64)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// Borrows the concrete type behind an [`Instance`].
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_instance()?.downcast_ref::<T>()
    }

    /// Converts a JSON-safe tree into `serde_json`.
    ///
    /// Fails on anything without a JSON form: `undefined`, non-finite
    /// numbers, big integers, symbols, functions and instances.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n)?,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(a) => serde_json::Value::Array(
                a.borrow()
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(o) => {
                let mut map = serde_json::Map::new();
                for (k, v) in o.borrow().iter() {
                    map.insert(k.clone(), v.to_json()?);
                }
                serde_json::Value::Object(map)
            }
            other => return Err(CodableError::NotJson { kind: other.kind() }),
        })
    }
}

fn number_to_json(n: f64) -> Result<serde_json::Value> {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER && !(n == 0.0 && n.is_sign_negative()) {
        return Ok(serde_json::Value::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .ok_or(CodableError::NotJson { kind: "non-finite number" })
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from))
            }
            serde_json::Value::Object(map) => Value::Object(Object::from_map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<IndexMap<_, _>>(),
            )),
        }
    }
}

/// SameValue for numbers: `NaN` equals itself, `0` and `-0` differ.
fn same_number(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a == b && a.is_sign_negative() == b.is_sign_negative()
}

/// Deep structural equality. Containers that are the same object compare
/// equal without being walked.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => same_number(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.ptr_eq(b) || *a.borrow() == *b.borrow()
            }
            (Value::Object(a), Value::Object(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|other| v == other))
            }
            (Value::Instance(a), Value::Instance(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Instance> for Value {
    fn from(i: Instance) -> Self {
        Value::Instance(i)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::BigInt(n)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Array::from_vec(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip_keeps_integers_and_order() {
        let json = json!({"b": 1, "a": [1.5, "x", null, true]});
        let value = Value::from(json.clone());
        assert_eq!(value.to_json().unwrap(), json);
    }

    #[test]
    fn non_json_values_are_rejected() {
        assert!(Value::Undefined.to_json().is_err());
        assert!(Value::Number(f64::NAN).to_json().is_err());
        assert!(Value::from(BigInt::from(1)).to_json().is_err());
    }

    #[test]
    fn numbers_compare_with_same_value() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Number(0.0), Value::Number(-0.0));
    }

    #[test]
    fn clones_share_identity() {
        let a = Value::array([Value::from(1)]);
        let b = a.clone();
        assert!(a.same_ref(&b));
        assert!(!a.same_ref(&Value::array([Value::from(1)])));
        assert_eq!(a, Value::array([Value::from(1)]));
    }
}
