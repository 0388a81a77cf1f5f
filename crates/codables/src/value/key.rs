use std::hash::{Hash, Hasher};

use super::Value;

/// A [`Value`] usable as a `Set` member or `Map` key.
///
/// Equality is SameValueZero: `NaN` equals `NaN`, `+0` equals `-0`, strings
/// and numbers compare by value, everything with identity compares by
/// reference.
#[derive(Clone, Debug)]
pub struct Key(Value);

impl Key {
    pub fn new(value: Value) -> Self {
        Key(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Key(value)
    }
}

fn normalized_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => normalized_bits(*a) == normalized_bits(*b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (a, b) => match (a.identity(), b.identity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.0).hash(state);
        match &self.0 {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => normalized_bits(*n).hash(state),
            Value::String(s) => s.hash(state),
            Value::BigInt(n) => n.hash(state),
            other => other.identity().hash(state),
        }
    }
}
