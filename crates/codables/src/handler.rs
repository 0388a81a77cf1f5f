//! Type handlers: a named, predicate-guarded encode/decode pair.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::decode::DecodeContext;
use crate::encode::EncodeContext;
use crate::error::Result;
use crate::format::tag_key;
use crate::path::PathStep;
use crate::value::Value;

/// Priority of built-in handlers and of handlers registered without one.
pub const DEFAULT_PRIORITY: i32 = 10;

pub type PredicateFn = dyn Fn(&Value) -> bool + Send + Sync;
pub type EncodeFn = dyn Fn(&Value, &EncodeContext<'_>) -> Result<Value> + Send + Sync;
pub type DecodeFn = dyn Fn(Value, &DecodeContext<'_>) -> Result<Value> + Send + Sync;
pub type DependenciesFn = dyn Fn() -> Vec<Arc<TypeHandler>> + Send + Sync;
pub type SelfReferenceFn = dyn Fn(&SelfReference<'_>) -> bool + Send + Sync;

/// An alias inside a tag payload that resolved only after the handler had
/// already built its instance from that payload.
pub struct SelfReference<'a> {
    /// Instance returned by the handler's `decode`.
    pub instance: &'a Value,
    /// The decoded payload the instance was built from, with the alias slot
    /// already patched.
    pub payload: &'a Value,
    /// Location of the alias relative to the payload root.
    pub address: &'a [PathStep],
    /// The object the alias resolved to.
    pub value: &'a Value,
}

/// Optional settings for [`TypeHandler::new`].
#[derive(Clone, Default)]
pub struct TypeOptions {
    priority: Option<i32>,
    is_flat: bool,
    classes: Vec<TypeId>,
    dependencies: Option<Arc<DependenciesFn>>,
    on_self_reference: Option<Arc<SelfReferenceFn>>,
}

impl TypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Marks the payload as plain JSON that needs no further encoding.
    pub fn flat(mut self) -> Self {
        self.is_flat = true;
        self
    }

    /// Indexes the handler under the exact concrete type `T` for fast
    /// dispatch.
    pub fn class<T: Any>(mut self) -> Self {
        self.classes.push(TypeId::of::<T>());
        self
    }

    /// Handlers whose values may appear inside this handler's payload.
    /// Evaluated lazily, at registration.
    pub fn depends_on<F>(mut self, dependencies: F) -> Self
    where
        F: Fn() -> Vec<Arc<TypeHandler>> + Send + Sync + 'static,
    {
        self.dependencies = Some(Arc::new(dependencies));
        self
    }

    pub fn on_self_reference<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SelfReference<'_>) -> bool + Send + Sync + 'static,
    {
        self.on_self_reference = Some(Arc::new(hook));
        self
    }
}

pub struct TypeHandler {
    name: String,
    tag_key: String,
    priority: i32,
    is_flat: bool,
    classes: Vec<TypeId>,
    dependencies: Option<Arc<DependenciesFn>>,
    predicate: Box<PredicateFn>,
    encode: Box<EncodeFn>,
    decode: Box<DecodeFn>,
    on_self_reference: Option<Arc<SelfReferenceFn>>,
}

impl TypeHandler {
    pub fn new<P, E, D>(
        name: impl Into<String>,
        predicate: P,
        encode: E,
        decode: D,
        options: TypeOptions,
    ) -> Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
        E: Fn(&Value, &EncodeContext<'_>) -> Result<Value> + Send + Sync + 'static,
        D: Fn(Value, &DecodeContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        TypeHandler {
            tag_key: tag_key(&name),
            name,
            priority: options.priority.unwrap_or(DEFAULT_PRIORITY),
            is_flat: options.is_flat,
            classes: options.classes,
            dependencies: options.dependencies,
            predicate: Box::new(predicate),
            encode: Box::new(encode),
            decode: Box::new(decode),
            on_self_reference: options.on_self_reference,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key used for this handler's tags, e.g. `"$$Date"`.
    pub fn tag_key(&self) -> &str {
        &self.tag_key
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_flat(&self) -> bool {
        self.is_flat
    }

    pub fn classes(&self) -> &[TypeId] {
        &self.classes
    }

    pub fn matches(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }

    pub fn encode(&self, value: &Value, ctx: &EncodeContext<'_>) -> Result<Value> {
        (self.encode)(value, ctx)
    }

    pub fn decode(&self, payload: Value, ctx: &DecodeContext<'_>) -> Result<Value> {
        (self.decode)(payload, ctx)
    }

    pub fn dependencies(&self) -> Vec<Arc<TypeHandler>> {
        match &self.dependencies {
            Some(dependencies) => dependencies(),
            None => Vec::new(),
        }
    }

    pub fn supports_self_reference(&self) -> bool {
        self.on_self_reference.is_some()
    }

    /// Offers a late-resolved alias to the handler. Returns `true` when the
    /// handler patched its instance.
    pub fn on_self_reference(&self, reference: &SelfReference<'_>) -> bool {
        match &self.on_self_reference {
            Some(hook) => hook(reference),
            None => false,
        }
    }
}

impl fmt::Debug for TypeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandler")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("is_flat", &self.is_flat)
            .finish_non_exhaustive()
    }
}
