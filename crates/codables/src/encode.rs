//! Value -> JSON-safe tree.
//!
//! Depth-first, pre-order. Every array, record and instance is remembered
//! before its children are visited; meeting it again emits `{"$$ref": id}`
//! and annotates the first occurrence with that id.

use std::collections::HashMap;

use crate::error::{CodableError, Result};
use crate::escape::{escape_key, escape_string};
use crate::format::{array_id_marker, ID_KEY, REF_KEY};
use crate::handler::TypeHandler;
use crate::registry::TypeRegistry;
use crate::security::is_forbidden_key;
use crate::value::{Array, Object, Value};

/// What to do with a value no handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownInputMode {
    /// Encode as `null` and log a warning.
    #[default]
    Null,
    /// Put the value into the tree as-is. The result may no longer be JSON.
    Unchanged,
    /// Fail with [`CodableError::UnsupportedValue`].
    Throw,
}

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub unknown_input_mode: UnknownInputMode,
    /// Track shared references. Cyclic input overflows the stack when off.
    pub preserve_references: bool,
    pub include_error_stack: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            unknown_input_mode: UnknownInputMode::Null,
            preserve_references: true,
            include_error_stack: false,
        }
    }
}

/// Where the first occurrence of an object was written.
enum OutputNode {
    Array(Array),
    Object(Object),
}

struct Seen {
    // Holds the input alive so its address cannot be reused mid-call.
    _input: Value,
    node: OutputNode,
    id: Option<u64>,
}

/// Per-call encoding state, also handed to handler `encode` functions.
pub struct EncodeContext<'a> {
    registry: &'a TypeRegistry,
    options: &'a EncodeOptions,
    seen: HashMap<usize, Seen>,
    next_id: u64,
}

fn ref_alias(id: u64) -> Value {
    Value::object([(REF_KEY, Value::Number(id as f64))])
}

fn annotate(node: &OutputNode, id: u64) {
    match node {
        OutputNode::Array(array) => array
            .borrow_mut()
            .insert(0, Value::String(array_id_marker(id))),
        OutputNode::Object(object) => {
            object
                .borrow_mut()
                .shift_insert(0, ID_KEY.to_string(), Value::Number(id as f64));
        }
    }
}

fn is_special_number(n: f64) -> bool {
    !n.is_finite() || (n == 0.0 && n.is_sign_negative())
}

impl<'a> EncodeContext<'a> {
    pub(crate) fn new(registry: &'a TypeRegistry, options: &'a EncodeOptions) -> Self {
        Self {
            registry,
            options,
            seen: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn options(&self) -> &EncodeOptions {
        self.options
    }

    pub fn include_error_stack(&self) -> bool {
        self.options.include_error_stack
    }

    pub(crate) fn encode_value(&mut self, value: &Value) -> Result<Value> {
        match value {
            Value::Null | Value::Bool(_) => Ok(value.clone()),
            Value::Number(n) if !is_special_number(*n) => Ok(value.clone()),
            Value::String(s) => Ok(Value::String(escape_string(s).into_owned())),
            Value::Function(_) => Ok(Value::Null),
            Value::Number(_) | Value::Undefined | Value::BigInt(_) | Value::Symbol(_) => {
                let registry = self.registry;
                match registry.matching_handler(value) {
                    Some(handler) => {
                        let tag = Object::new();
                        self.fill_tag(&tag, handler, value)?;
                        Ok(Value::Object(tag))
                    }
                    None => self.unknown(value),
                }
            }
            Value::Array(array) => {
                if let Some(alias) = self.alias(value) {
                    return Ok(alias);
                }
                let out = Array::new();
                self.remember(value, OutputNode::Array(out.clone()));
                for item in array.to_vec() {
                    let encoded = self.encode_value(&item)?;
                    out.push(encoded);
                }
                Ok(Value::Array(out))
            }
            Value::Object(object) => {
                if let Some(alias) = self.alias(value) {
                    return Ok(alias);
                }
                let out = Object::new();
                self.remember(value, OutputNode::Object(out.clone()));
                for (key, item) in object.entries() {
                    if is_forbidden_key(&key) {
                        continue;
                    }
                    let encoded = self.encode_value(&item)?;
                    out.insert(escape_key(&key).into_owned(), encoded);
                }
                Ok(Value::Object(out))
            }
            Value::Instance(_) => {
                if let Some(alias) = self.alias(value) {
                    return Ok(alias);
                }
                let registry = self.registry;
                let Some(handler) = registry.matching_handler(value) else {
                    return self.unknown(value);
                };
                let tag = Object::new();
                self.remember(value, OutputNode::Object(tag.clone()));
                self.fill_tag(&tag, handler, value)?;
                Ok(Value::Object(tag))
            }
        }
    }

    fn fill_tag(&mut self, tag: &Object, handler: &TypeHandler, value: &Value) -> Result<()> {
        let payload = handler.encode(value, self)?;
        let payload = if handler.is_flat() {
            payload
        } else {
            self.encode_value(&payload)?
        };
        tag.insert(handler.tag_key(), payload);
        Ok(())
    }

    fn unknown(&self, value: &Value) -> Result<Value> {
        let type_name = match value {
            Value::Instance(instance) => instance.type_name(),
            other => other.kind(),
        };
        match self.options.unknown_input_mode {
            UnknownInputMode::Null => {
                tracing::warn!(type_name, "no matching type handler, encoding as null");
                Ok(Value::Null)
            }
            UnknownInputMode::Unchanged => Ok(value.clone()),
            UnknownInputMode::Throw => Err(CodableError::UnsupportedValue {
                type_name: type_name.to_string(),
            }),
        }
    }

    fn remember(&mut self, value: &Value, node: OutputNode) {
        if !self.options.preserve_references {
            return;
        }
        if let Some(address) = value.identity() {
            self.seen.insert(
                address,
                Seen {
                    _input: value.clone(),
                    node,
                    id: None,
                },
            );
        }
    }

    /// Alias for an object already written earlier in this call.
    fn alias(&mut self, value: &Value) -> Option<Value> {
        if !self.options.preserve_references {
            return None;
        }
        let seen = self.seen.get_mut(&value.identity()?)?;
        let id = match seen.id {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                seen.id = Some(id);
                annotate(&seen.node, id);
                id
            }
        };
        Some(ref_alias(id))
    }
}

/// Encodes `value` against `registry`.
pub fn encode_with_registry(
    registry: &TypeRegistry,
    value: &Value,
    options: &EncodeOptions,
) -> Result<Value> {
    EncodeContext::new(registry, options).encode_value(value)
}
