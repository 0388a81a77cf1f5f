use std::sync::{Arc, OnceLock};

use crate::builtin::builtin_types;
use crate::decode::{decode_with_registry, DecodeContext, DecodeOptions};
use crate::encode::{encode_with_registry, EncodeContext, EncodeOptions};
use crate::error::{CodableError, Result};
use crate::handler::{TypeHandler, TypeOptions};
use crate::registry::TypeRegistry;
use crate::value::Value;

/// Owns a type registry and runs encode/decode against it.
///
/// `Coder::new()` starts with every built-in type. The shared instance
/// returned by [`coder()`] is read-only, and so are its clones.
#[derive(Clone)]
pub struct Coder {
    registry: TypeRegistry,
    is_default: bool,
}

fn builtin_registry() -> &'static TypeRegistry {
    static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| TypeRegistry::from_trusted(builtin_types()))
}

impl Coder {
    pub fn new() -> Self {
        Coder {
            registry: builtin_registry().clone(),
            is_default: false,
        }
    }

    /// A coder with the built-ins plus `types`.
    pub fn with_types(types: impl IntoIterator<Item = Arc<TypeHandler>>) -> Result<Self> {
        let mut coder = Coder::new();
        for handler in types {
            coder.register(handler)?;
        }
        Ok(coder)
    }

    pub fn register(&mut self, handler: Arc<TypeHandler>) -> Result<()> {
        if self.is_default {
            return Err(CodableError::DefaultCoderImmutable);
        }
        self.registry.register(handler)
    }

    /// Builds a handler from its parts, registers it and returns it.
    pub fn add_type<P, E, D>(
        &mut self,
        name: impl Into<String>,
        predicate: P,
        encode: E,
        decode: D,
        options: TypeOptions,
    ) -> Result<Arc<TypeHandler>>
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
        E: Fn(&Value, &EncodeContext<'_>) -> Result<Value> + Send + Sync + 'static,
        D: Fn(Value, &DecodeContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        if self.is_default {
            return Err(CodableError::DefaultCoderImmutable);
        }
        let handler = Arc::new(TypeHandler::new(name, predicate, encode, decode, options));
        self.registry.register(Arc::clone(&handler))?;
        Ok(handler)
    }

    pub fn encode(&self, value: &Value) -> Result<Value> {
        self.encode_with(value, &EncodeOptions::default())
    }

    pub fn encode_with(&self, value: &Value, options: &EncodeOptions) -> Result<Value> {
        encode_with_registry(&self.registry, value, options)
    }

    pub fn decode(&self, tree: &Value) -> Result<Value> {
        self.decode_with(tree, &DecodeOptions::default())
    }

    pub fn decode_with(&self, tree: &Value, options: &DecodeOptions) -> Result<Value> {
        decode_with_registry(&self.registry, tree, options)
    }

    /// Encodes `value` and serializes the tree as JSON text.
    pub fn stringify(&self, value: &Value) -> Result<String> {
        let tree = self.encode(value)?.to_json()?;
        Ok(serde_json::to_string(&tree)?)
    }

    pub fn parse(&self, text: &str) -> Result<Value> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        self.decode(&Value::from(json))
    }

    /// Deep copy that keeps shared and circular references.
    pub fn copy(&self, value: &Value) -> Result<Value> {
        self.decode(&self.encode(value)?)
    }

    pub fn get_type(&self, name: &str) -> Option<&Arc<TypeHandler>> {
        self.registry.get_by_name(name)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }
}

impl Default for Coder {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide shared coder. It only knows the built-in types.
pub fn coder() -> &'static Coder {
    static DEFAULT: OnceLock<Coder> = OnceLock::new();
    DEFAULT.get_or_init(|| Coder {
        is_default: true,
        ..Coder::new()
    })
}

pub fn encode(value: &Value) -> Result<Value> {
    coder().encode(value)
}

pub fn decode(tree: &Value) -> Result<Value> {
    coder().decode(tree)
}

pub fn stringify(value: &Value) -> Result<String> {
    coder().stringify(value)
}

pub fn parse(text: &str) -> Result<Value> {
    coder().parse(text)
}

pub fn copy(value: &Value) -> Result<Value> {
    coder().copy(value)
}
