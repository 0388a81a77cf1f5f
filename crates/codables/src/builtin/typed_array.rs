use crate::error::{CodableError, Result};
use crate::handler::{TypeHandler, TypeOptions};
use crate::value::{Object, Value};

/// A fixed-width numeric array, tagged by element kind on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    Uint8(Vec<u8>),
    Uint8Clamped(Vec<u8>),
    Uint16(Vec<u16>),
    Uint32(Vec<u32>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl TypedArray {
    pub fn kind(&self) -> &'static str {
        match self {
            TypedArray::Uint8(_) => "uint8",
            TypedArray::Uint8Clamped(_) => "uint8clamped",
            TypedArray::Uint16(_) => "uint16",
            TypedArray::Uint32(_) => "uint32",
            TypedArray::Int8(_) => "int8",
            TypedArray::Int16(_) => "int16",
            TypedArray::Int32(_) => "int32",
            TypedArray::Float32(_) => "float32",
            TypedArray::Float64(_) => "float64",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedArray::Uint8(v) | TypedArray::Uint8Clamped(v) => v.len(),
            TypedArray::Uint16(v) => v.len(),
            TypedArray::Uint32(v) => v.len(),
            TypedArray::Int8(v) => v.len(),
            TypedArray::Int16(v) => v.len(),
            TypedArray::Int32(v) => v.len(),
            TypedArray::Float32(v) => v.len(),
            TypedArray::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        fn widen<T: Copy + Into<f64>>(items: &[T]) -> Vec<f64> {
            items.iter().map(|&n| n.into()).collect()
        }
        match self {
            TypedArray::Uint8(v) | TypedArray::Uint8Clamped(v) => widen(v),
            TypedArray::Uint16(v) => widen(v),
            TypedArray::Uint32(v) => widen(v),
            TypedArray::Int8(v) => widen(v),
            TypedArray::Int16(v) => widen(v),
            TypedArray::Int32(v) => widen(v),
            TypedArray::Float32(v) => widen(v),
            TypedArray::Float64(v) => v.clone(),
        }
    }

    /// Builds an array of `kind` from numbers, converting the way a typed
    /// array constructor does: clamping for `uint8clamped`, truncating and
    /// wrapping modulo the element width for the other integer kinds.
    pub fn from_f64s(kind: &str, data: &[f64]) -> Option<Self> {
        let wrapped = || data.iter().map(|&n| wrap_u32(n));
        Some(match kind {
            "uint8" => TypedArray::Uint8(wrapped().map(|n| n as u8).collect()),
            "uint8clamped" => TypedArray::Uint8Clamped(
                data.iter()
                    .map(|&n| n.round_ties_even().clamp(0.0, 255.0) as u8)
                    .collect(),
            ),
            "uint16" => TypedArray::Uint16(wrapped().map(|n| n as u16).collect()),
            "uint32" => TypedArray::Uint32(wrapped().collect()),
            "int8" => TypedArray::Int8(wrapped().map(|n| n as u8 as i8).collect()),
            "int16" => TypedArray::Int16(wrapped().map(|n| n as u16 as i16).collect()),
            "int32" => TypedArray::Int32(wrapped().map(|n| n as i32).collect()),
            "float32" => TypedArray::Float32(data.iter().map(|&n| n as f32).collect()),
            "float64" => TypedArray::Float64(data.to_vec()),
            _ => return None,
        })
    }
}

/// `n` truncated toward zero, modulo 2^32. Non-finite numbers become 0.
fn wrap_u32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

fn decode(payload: &Value) -> Result<TypedArray> {
    let invalid = |reason: &str| CodableError::invalid_payload("typedArray", reason);
    let record = payload
        .as_object()
        .ok_or_else(|| invalid("expected {type, data}"))?;
    let kind = record
        .get("type")
        .and_then(|kind| kind.as_str().map(str::to_string))
        .ok_or_else(|| invalid("missing element type"))?;
    let data = record
        .get("data")
        .and_then(|data| data.as_array().cloned())
        .ok_or_else(|| invalid("missing data array"))?
        .to_vec()
        .iter()
        .map(|n| n.as_f64().ok_or_else(|| invalid("data must be numbers")))
        .collect::<Result<Vec<f64>>>()?;
    TypedArray::from_f64s(&kind, &data).ok_or_else(|| invalid("unknown element type"))
}

pub(super) fn handler() -> TypeHandler {
    TypeHandler::new(
        "typedArray",
        |value| value.downcast_ref::<TypedArray>().is_some(),
        |value, _| {
            let Some(array) = value.downcast_ref::<TypedArray>() else {
                return Ok(Value::Null);
            };
            // Float elements may be NaN or infinite, so the payload is
            // re-encoded like any other.
            let payload = Object::new();
            payload.insert("type", array.kind());
            payload.insert(
                "data",
                Value::array(array.to_f64_vec().into_iter().map(Value::Number)),
            );
            Ok(Value::Object(payload))
        },
        |payload, _| decode(&payload).map(Value::instance),
        TypeOptions::new().class::<TypedArray>(),
    )
}
