//! Type handlers derived from a field list.
//!
//! ```
//! use codables::{class, Coder, Memberwise, Value};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Point {
//!     x: f64,
//!     y: f64,
//! }
//!
//! impl Memberwise for Point {
//!     fn field(&self, name: &str) -> Option<Value> {
//!         match name {
//!             "x" => Some(self.x.into()),
//!             "y" => Some(self.y.into()),
//!             _ => None,
//!         }
//!     }
//!
//!     fn set_field(&mut self, name: &str, value: Value) {
//!         let n = value.as_f64().unwrap_or_default();
//!         match name {
//!             "x" => self.x = n,
//!             "y" => self.y = n,
//!             _ => {}
//!         }
//!     }
//! }
//!
//! let point = class::<Point>("Point").field("x").field("y").build().unwrap();
//! let coder = Coder::with_types([point]).unwrap();
//! let copy = coder.copy(&Value::instance(Point { x: 1.0, y: 2.0 })).unwrap();
//! assert_eq!(copy.downcast_ref::<Point>(), Some(&Point { x: 1.0, y: 2.0 }));
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::builtin::{builtin_type, ExternalReference};
use crate::error::{CodableError, Result};
use crate::handler::{DependenciesFn, TypeHandler, TypeOptions};
use crate::value::{CustomObject, Object, Value};

/// Field access for types built by [`class`].
///
/// Decoding starts from `Default::default()` and assigns every field found in
/// the payload.
pub trait Memberwise: CustomObject + Default {
    fn field(&self, name: &str) -> Option<Value>;
    fn set_field(&mut self, name: &str, value: Value);
}

type FieldReader = fn(&Value, &str) -> Option<Value>;

struct ClassEntry {
    depth: i32,
    parent: Option<TypeId>,
    reader: FieldReader,
}

/// Registered classes by type. Lets a handler recognise instances of
/// subclasses registered after it.
fn class_table() -> &'static RwLock<HashMap<TypeId, ClassEntry>> {
    static CLASSES: OnceLock<RwLock<HashMap<TypeId, ClassEntry>>> = OnceLock::new();
    CLASSES.get_or_init(|| RwLock::new(HashMap::new()))
}

fn read_field<T: Memberwise>(value: &Value, name: &str) -> Option<Value> {
    value.downcast_ref::<T>()?.field(name)
}

fn is_same_or_subclass(mut type_id: TypeId, ancestor: TypeId) -> bool {
    let table = class_table().read().unwrap_or_else(PoisonError::into_inner);
    loop {
        if type_id == ancestor {
            return true;
        }
        match table.get(&type_id).and_then(|entry| entry.parent) {
            Some(parent) => type_id = parent,
            None => return false,
        }
    }
}

fn reader_for(type_id: TypeId) -> Option<FieldReader> {
    let table = class_table().read().unwrap_or_else(PoisonError::into_inner);
    table.get(&type_id).map(|entry| entry.reader)
}

/// Starts a handler definition for `T`, tagged as `name` on the wire.
pub fn class<T: Memberwise>(name: impl Into<String>) -> ClassBuilder<T> {
    ClassBuilder {
        name: name.into(),
        fields: Vec::new(),
        externals: Vec::new(),
        parent: None,
        dependencies: None,
        _marker: PhantomData,
    }
}

pub struct ClassBuilder<T> {
    name: String,
    /// `(field, wire key)` pairs in encoding order.
    fields: Vec<(String, String)>,
    externals: Vec<(String, ExternalReference)>,
    parent: Option<TypeId>,
    dependencies: Option<Arc<DependenciesFn>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Memberwise> ClassBuilder<T> {
    pub fn field(self, name: &str) -> Self {
        self.field_as(name, name)
    }

    /// Encodes field `name` under a different key.
    pub fn field_as(mut self, name: &str, wire: &str) -> Self {
        self.fields.push((name.to_string(), wire.to_string()));
        self
    }

    /// Ordered `(field, optional wire key)` pairs.
    pub fn fields<'f>(mut self, fields: impl IntoIterator<Item = (&'f str, Option<&'f str>)>) -> Self {
        for (name, wire) in fields {
            self = self.field_as(name, wire.unwrap_or(name));
        }
        self
    }

    /// Field whose value is never serialized; it is looked up under `key` in
    /// the caller's external references at decode time.
    pub fn external(mut self, field: &str, key: &str) -> Self {
        self.externals
            .push((field.to_string(), ExternalReference::new(key)));
        self
    }

    /// Like [`external`](Self::external), but a missing key decodes to
    /// `undefined`.
    pub fn optional_external(mut self, field: &str, key: &str) -> Self {
        self.externals
            .push((field.to_string(), ExternalReference::new(key).optional()));
        self
    }

    /// Declares `P` as the parent class. `P` must already be built.
    pub fn extends<P: Memberwise>(mut self) -> Self {
        self.parent = Some(TypeId::of::<P>());
        self
    }

    pub fn depends_on<F>(mut self, dependencies: F) -> Self
    where
        F: Fn() -> Vec<Arc<TypeHandler>> + Send + Sync + 'static,
    {
        self.dependencies = Some(Arc::new(dependencies));
        self
    }

    pub fn build(self) -> Result<Arc<TypeHandler>> {
        let ClassBuilder {
            name,
            fields,
            externals,
            parent,
            dependencies,
            _marker,
        } = self;
        let class_id = TypeId::of::<T>();

        let depth = {
            let mut table = class_table().write().unwrap_or_else(PoisonError::into_inner);
            let depth = match parent {
                Some(parent_id) => match table.get(&parent_id) {
                    Some(entry) => entry.depth + 1,
                    None => return Err(CodableError::UnknownParentClass { name }),
                },
                None => 1,
            };
            table.insert(
                class_id,
                ClassEntry {
                    depth,
                    parent,
                    reader: read_field::<T>,
                },
            );
            depth
        };

        let encode_fields = fields.clone();
        let encode_externals = externals.clone();
        let decode_name = name.clone();
        let needs_external = !externals.is_empty();

        let options = TypeOptions::new()
            .priority(depth)
            .class::<T>()
            .depends_on(move || {
                let mut handlers = dependencies.as_ref().map_or_else(Vec::new, |f| f());
                if needs_external {
                    handlers.extend(builtin_type("external").cloned());
                }
                handlers
            });

        let handler = TypeHandler::new(
            name,
            move |value| {
                value
                    .as_instance()
                    .is_some_and(|instance| is_same_or_subclass(instance.type_id(), class_id))
            },
            move |value, _| {
                let Some(instance) = value.as_instance() else {
                    return Ok(Value::Null);
                };
                let Some(reader) = reader_for(instance.type_id()) else {
                    return Ok(Value::Null);
                };
                let payload = Object::new();
                for (field, wire) in &encode_fields {
                    if let Some(item) = reader(value, field) {
                        payload.insert(wire.as_str(), item);
                    }
                }
                for (field, reference) in &encode_externals {
                    payload.insert(field.as_str(), Value::instance(reference.clone()));
                }
                Ok(Value::Object(payload))
            },
            move |payload, _| {
                let Some(record) = payload.as_object() else {
                    return Err(CodableError::invalid_payload(
                        decode_name.as_str(),
                        "expected a record of fields",
                    ));
                };
                let mut instance = T::default();
                for (field, wire) in &fields {
                    if let Some(item) = record.get(wire) {
                        instance.set_field(field, item);
                    }
                }
                for (field, _) in &externals {
                    if let Some(item) = record.get(field) {
                        instance.set_field(field, item);
                    }
                }
                Ok(Value::instance(instance))
            },
            options,
        );
        Ok(Arc::new(handler))
    }
}
