//! JSON-safe tree -> value.
//!
//! Mirrors the encoder's traversal. Arrays and records are registered under
//! their id before their children are decoded; tags right after the handler
//! built the instance. Aliases to ids not materialized yet decode to `null`
//! and are patched in place once the id appears.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::Result;
use crate::escape::{unescape_key, unescape_string};
use crate::format::{parse_array_id_marker, tag_name, ID_KEY, REF_KEY};
use crate::handler::{SelfReference, TypeHandler};
use crate::path::{format_path, Path, PathStep};
use crate::registry::TypeRegistry;
use crate::security::is_forbidden_key;
use crate::value::{Array, Object, Value};

#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Values for `external` placeholders, by key.
    pub external_references: HashMap<String, Value>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn external_reference(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.external_references.insert(key.into(), value.into());
        self
    }
}

/// Where a decoded child is stored in its parent.
enum Slot {
    Root,
    Index(Array, usize),
    Key(Object, String),
}

struct TagFrame {
    handler: Arc<TypeHandler>,
    /// Path length at the payload root.
    base: usize,
    /// Instance and the payload it was built from, once `decode` returned.
    built: Option<(Value, Value)>,
}

struct PendingRef {
    id: u64,
    slot: Slot,
    path: Path,
    frames: Vec<Rc<RefCell<TagFrame>>>,
}

/// Per-call decoding state, also handed to handler `decode` functions.
pub struct DecodeContext<'a> {
    registry: &'a TypeRegistry,
    options: &'a DecodeOptions,
    resolved: HashMap<u64, Value>,
    pending: Vec<PendingRef>,
    frames: Vec<Rc<RefCell<TagFrame>>>,
    path: Path,
    warned: HashSet<String>,
}

impl<'a> DecodeContext<'a> {
    pub(crate) fn new(registry: &'a TypeRegistry, options: &'a DecodeOptions) -> Self {
        Self {
            registry,
            options,
            resolved: HashMap::new(),
            pending: Vec::new(),
            frames: Vec::new(),
            path: Vec::new(),
            warned: HashSet::new(),
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        self.options
    }

    /// Caller-supplied value for an external placeholder.
    pub fn external_reference(&self, key: &str) -> Option<Value> {
        self.options.external_references.get(key).cloned()
    }

    pub(crate) fn decode_root(&mut self, input: &Value) -> Result<Value> {
        let value = self.decode_value(input, Slot::Root)?;
        for pending in &self.pending {
            tracing::warn!(
                id = pending.id,
                path = %format_path(&pending.path),
                "unresolved reference, leaving null"
            );
        }
        Ok(value)
    }

    fn decode_value(&mut self, input: &Value, slot: Slot) -> Result<Value> {
        match input {
            Value::String(s) => Ok(Value::String(unescape_string(s).into_owned())),
            Value::Array(array) => self.decode_array(array),
            Value::Object(object) => self.decode_object(object, slot),
            other => Ok(other.clone()),
        }
    }

    fn decode_array(&mut self, array: &Array) -> Result<Value> {
        let mut items = array.to_vec();
        let out = Array::new();
        let id = items
            .first()
            .and_then(Value::as_str)
            .and_then(parse_array_id_marker);
        if let Some(id) = id {
            items.remove(0);
            self.register(id, Value::Array(out.clone()));
        }
        for (index, item) in items.iter().enumerate() {
            self.path.push(PathStep::Index(index));
            let decoded = self.decode_value(item, Slot::Index(out.clone(), index));
            self.path.pop();
            out.push(decoded?);
        }
        Ok(Value::Array(out))
    }

    fn decode_object(&mut self, object: &Object, slot: Slot) -> Result<Value> {
        let entries = object.entries();

        if let [(key, target)] = entries.as_slice() {
            if key == REF_KEY {
                if let Some(id) = target.as_u64() {
                    return Ok(self.resolve_alias(id, slot));
                }
            }
        }

        let id = entries
            .iter()
            .find(|(key, _)| key == ID_KEY)
            .and_then(|(_, id)| id.as_u64());
        let fields: Vec<&(String, Value)> = entries
            .iter()
            .filter(|(key, _)| id.is_none() || key != ID_KEY)
            .collect();

        if let [(key, payload)] = fields.as_slice() {
            if let Some(name) = tag_name(key) {
                return self.decode_tag(name, key, payload, id, slot);
            }
        }

        let out = Object::new();
        if let Some(id) = id {
            self.register(id, Value::Object(out.clone()));
        }
        for (key, item) in fields {
            if is_forbidden_key(key) {
                continue;
            }
            let key = unescape_key(key).into_owned();
            self.path.push(PathStep::Key(key.clone()));
            let decoded = self.decode_value(item, Slot::Key(out.clone(), key.clone()));
            self.path.pop();
            out.insert(key, decoded?);
        }
        Ok(Value::Object(out))
    }

    fn decode_tag(
        &mut self,
        name: &str,
        key: &str,
        payload: &Value,
        id: Option<u64>,
        slot: Slot,
    ) -> Result<Value> {
        let registry = self.registry;
        let Some(handler) = registry.get_by_name(name) else {
            if self.warned.insert(name.to_string()) {
                tracing::warn!(type_name = name, "unknown custom type, returning the raw value");
            }
            self.path.push(PathStep::Key(key.to_string()));
            let raw = self.decode_value(payload, slot);
            self.path.pop();
            let raw = raw?;
            if let Some(id) = id {
                self.register(id, raw.clone());
            }
            return Ok(raw);
        };

        let frame = Rc::new(RefCell::new(TagFrame {
            handler: Arc::clone(handler),
            base: self.path.len() + 1,
            built: None,
        }));
        self.path.push(PathStep::Key(key.to_string()));
        self.frames.push(Rc::clone(&frame));
        let decoded = if handler.is_flat() {
            Ok(payload.clone())
        } else {
            self.decode_value(payload, Slot::Root)
        };
        self.frames.pop();
        self.path.pop();
        let decoded = decoded?;

        let instance = handler.decode(decoded.clone(), self)?;
        frame.borrow_mut().built = Some((instance.clone(), decoded));
        if let Some(id) = id {
            self.register(id, instance.clone());
        }
        Ok(instance)
    }

    fn resolve_alias(&mut self, id: u64, slot: Slot) -> Value {
        if let Some(value) = self.resolved.get(&id) {
            return value.clone();
        }
        self.pending.push(PendingRef {
            id,
            slot,
            path: self.path.clone(),
            frames: self.frames.clone(),
        });
        Value::Null
    }

    fn register(&mut self, id: u64, value: Value) {
        self.resolved.insert(id, value.clone());
        if self.pending.iter().all(|pending| pending.id != id) {
            return;
        }
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|pending| pending.id == id);
        self.pending = waiting;
        for pending in ready {
            let patched = patch(&pending, &value);
            tracing::trace!(id, ?patched, "reference patched");
        }
    }
}

/// Where a patched alias ended up.
#[derive(Debug, PartialEq, Eq)]
enum Patched {
    /// In its slot, with no built tag around it.
    Slot,
    /// Handed to the enclosing type's self-reference hook.
    Hook,
    /// In a container nested in the payload of a type without a hook. The
    /// instance sees it only if it kept that container.
    Payload,
    /// Nowhere: the alias was the whole payload of a type without a hook.
    Lost,
}

fn patch(pending: &PendingRef, value: &Value) -> Patched {
    match &pending.slot {
        Slot::Root => {}
        Slot::Index(array, index) => array.set(*index, value.clone()),
        Slot::Key(object, key) => {
            object.insert(key.clone(), value.clone());
        }
    }

    // The slot alone is enough unless the enclosing tag already consumed its
    // payload.
    let Some(frame) = pending.frames.last() else {
        return Patched::Slot;
    };
    let frame = frame.borrow();
    let Some((instance, payload)) = &frame.built else {
        return Patched::Slot;
    };
    let address = &pending.path[frame.base.min(pending.path.len())..];
    let handled = frame.handler.on_self_reference(&SelfReference {
        instance,
        payload,
        address,
        value,
    });
    if handled {
        Patched::Hook
    } else if address.is_empty() {
        tracing::warn!(
            type_name = frame.handler.name(),
            path = %format_path(&pending.path),
            "type does not support self references, value left as null"
        );
        Patched::Lost
    } else {
        tracing::debug!(
            type_name = frame.handler.name(),
            path = %format_path(&pending.path),
            "self reference patched in the payload only"
        );
        Patched::Payload
    }
}

/// Decodes `tree` against `registry`.
pub fn decode_with_registry(
    registry: &TypeRegistry,
    tree: &Value,
    options: &DecodeOptions,
) -> Result<Value> {
    DecodeContext::new(registry, options).decode_root(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::TypeOptions;
    use serde_json::json;

    fn decode_json(json: serde_json::Value) -> Value {
        let registry = TypeRegistry::new();
        decode_with_registry(&registry, &Value::from(json), &DecodeOptions::default()).unwrap()
    }

    #[test]
    fn shared_array_resolves_to_one_object() {
        let value = decode_json(json!({"a": ["$$id:0", 1], "b": {"$$ref": 0}}));
        let object = value.as_object().unwrap();
        let a = object.get("a").unwrap();
        assert!(a.same_ref(&object.get("b").unwrap()));
        assert_eq!(a, Value::array([Value::from(1)]));
    }

    #[test]
    fn self_reference_resolves_to_container() {
        let value = decode_json(json!({"$$id": 0, "me": {"$$ref": 0}}));
        let object = value.as_object().unwrap();
        assert_eq!(object.keys(), ["me"]);
        assert!(object.get("me").unwrap().same_ref(&value));
    }

    #[test]
    fn forward_reference_is_patched() {
        let value = decode_json(json!([{"$$ref": 3}, {"$$id": 3, "x": 1}]));
        let array = value.as_array().unwrap();
        assert!(array.get(0).unwrap().same_ref(&array.get(1).unwrap()));
    }

    #[test]
    fn unresolved_reference_stays_null() {
        let value = decode_json(json!({"a": {"$$ref": 9}}));
        assert_eq!(value.as_object().unwrap().get("a"), Some(Value::Null));
    }

    #[test]
    fn unknown_tag_returns_payload() {
        let value = decode_json(json!({"$$Future": {"a": [1, 2]}}));
        assert_eq!(value, Value::from(json!({"a": [1, 2]})));
    }

    #[test]
    fn escaped_data_is_unescaped() {
        let value = decode_json(json!({"~$$Set": ["~$$id:0", "~$$id:1"], "~$$ref": 1}));
        assert_eq!(
            value,
            Value::from(json!({"$$Set": ["$$id:0", "$$id:1"], "$$ref": 1}))
        );
    }

    #[test]
    fn forbidden_keys_are_skipped() {
        let value = decode_json(json!({"__proto__": {"polluted": true}, "ok": 1}));
        assert_eq!(value, Value::from(json!({"ok": 1})));
    }

    /// Keeps its payload record by handle and has no self-reference hook.
    #[derive(Debug)]
    struct Holder(Object);

    impl PartialEq for Holder {
        fn eq(&self, other: &Self) -> bool {
            self.0.ptr_eq(&other.0)
        }
    }

    fn holder_handler() -> Arc<TypeHandler> {
        Arc::new(TypeHandler::new(
            "Holder",
            |value| value.downcast_ref::<Holder>().is_some(),
            |_, _| Ok(Value::Null),
            |payload, _| {
                let record = payload.as_object().cloned().unwrap_or_default();
                Ok(Value::instance(Holder(record)))
            },
            TypeOptions::new(),
        ))
    }

    fn holder_frame(instance: &Value, payload: &Value) -> Rc<RefCell<TagFrame>> {
        Rc::new(RefCell::new(TagFrame {
            handler: holder_handler(),
            base: 1,
            built: Some((instance.clone(), payload.clone())),
        }))
    }

    #[test]
    fn nested_alias_reaches_instance_holding_its_payload() {
        let mut registry = TypeRegistry::new();
        registry.register(holder_handler()).unwrap();
        let tree = Value::from(json!({"$$id": 0, "$$Holder": {"inner": {"me": {"$$ref": 0}}}}));
        let value = decode_with_registry(&registry, &tree, &DecodeOptions::default()).unwrap();

        let holder = value.downcast_ref::<Holder>().unwrap();
        let inner = holder.0.get("inner").unwrap();
        let me = inner.as_object().unwrap().get("me").unwrap();
        assert!(me.same_ref(&value));
    }

    #[test]
    fn patch_reports_where_the_alias_landed() {
        let inner = Object::new();
        let payload = Value::object([("inner", Value::Object(inner.clone()))]);
        let instance = Value::instance(Holder(payload.as_object().cloned().unwrap()));

        let nested = PendingRef {
            id: 0,
            slot: Slot::Key(inner.clone(), "me".into()),
            path: vec![
                PathStep::Key("$$Holder".into()),
                PathStep::Key("inner".into()),
                PathStep::Key("me".into()),
            ],
            frames: vec![holder_frame(&instance, &payload)],
        };
        assert_eq!(patch(&nested, &instance), Patched::Payload);
        assert!(inner.get("me").unwrap().same_ref(&instance));

        let whole = PendingRef {
            id: 0,
            slot: Slot::Root,
            path: vec![PathStep::Key("$$Holder".into())],
            frames: vec![holder_frame(&instance, &payload)],
        };
        assert_eq!(patch(&whole, &instance), Patched::Lost);

        let untagged = PendingRef {
            id: 0,
            slot: Slot::Key(inner.clone(), "again".into()),
            path: vec![PathStep::Key("again".into())],
            frames: Vec::new(),
        };
        assert_eq!(patch(&untagged, &instance), Patched::Slot);
    }
}
