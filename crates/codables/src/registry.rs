//! Priority-ordered collection of type handlers.

use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::error::{CodableError, Result};
use crate::format::{ESCAPE_SIGIL, RESERVED_TYPE_NAMES};
use crate::handler::TypeHandler;
use crate::value::Value;

/// Handlers sorted by descending priority, ties kept in registration order,
/// with lookups by name and by exact concrete type.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    handlers: Vec<Arc<TypeHandler>>,
    by_name: HashMap<String, Arc<TypeHandler>>,
    by_class: HashMap<TypeId, Arc<TypeHandler>>,
}

fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if RESERVED_TYPE_NAMES.contains(&name) {
        "name is reserved"
    } else if name.starts_with(ESCAPE_SIGIL) || name.starts_with('$') {
        "name must not start with \"~\" or \"$\""
    } else {
        return Ok(());
    };
    Err(CodableError::InvalidTypeName {
        name: name.to_string(),
        reason,
    })
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` together with everything it transitively depends
    /// on. Registering the same handler twice is a no-op; registering a
    /// different handler under a taken name fails, and leaves the registry
    /// untouched.
    pub fn register(&mut self, handler: Arc<TypeHandler>) -> Result<()> {
        let mut staged: Vec<Arc<TypeHandler>> = Vec::new();
        let mut visited: HashMap<String, Arc<TypeHandler>> = HashMap::new();
        let mut queue = VecDeque::from([handler]);

        while let Some(next) = queue.pop_front() {
            if let Some(seen) = visited.get(next.name()) {
                if Arc::ptr_eq(seen, &next) {
                    continue;
                }
                return Err(CodableError::DuplicateType {
                    name: next.name().to_string(),
                });
            }
            visited.insert(next.name().to_string(), Arc::clone(&next));

            match self.by_name.get(next.name()) {
                Some(existing) if Arc::ptr_eq(existing, &next) => continue,
                Some(_) => {
                    return Err(CodableError::DuplicateType {
                        name: next.name().to_string(),
                    })
                }
                None => {}
            }

            validate_name(next.name())?;
            queue.extend(next.dependencies());
            staged.push(next);
        }

        // Dependencies land before their dependents.
        for handler in staged.into_iter().rev() {
            self.insert(handler);
        }
        Ok(())
    }

    /// A registry holding `handlers` in order, skipping name validation and
    /// dependency resolution. Only for handler sets known to be well formed.
    pub(crate) fn from_trusted<'h>(
        handlers: impl IntoIterator<Item = &'h Arc<TypeHandler>>,
    ) -> Self {
        let mut registry = TypeRegistry::new();
        for handler in handlers {
            registry.insert(Arc::clone(handler));
        }
        registry
    }

    fn insert(&mut self, handler: Arc<TypeHandler>) {
        tracing::debug!(
            name = handler.name(),
            priority = handler.priority(),
            "registered type handler"
        );
        let position = self
            .handlers
            .iter()
            .position(|existing| existing.priority() < handler.priority())
            .unwrap_or(self.handlers.len());
        for class in handler.classes() {
            self.by_class
                .entry(*class)
                .or_insert_with(|| Arc::clone(&handler));
        }
        self.by_name
            .insert(handler.name().to_string(), Arc::clone(&handler));
        self.handlers.insert(position, handler);
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Arc<TypeHandler>> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// The highest-priority handler whose predicate accepts `value`.
    ///
    /// Instances first try the handler indexed under their exact type. That
    /// hit is only taken when no strictly higher-priority handler also claims
    /// the value; on equal priority the exact-type handler wins.
    pub fn matching_handler(&self, value: &Value) -> Option<&Arc<TypeHandler>> {
        if let Value::Instance(instance) = value {
            if let Some(handler) = self.by_class.get(&instance.type_id()) {
                let outranked = self
                    .handlers
                    .iter()
                    .take_while(|other| other.priority() > handler.priority())
                    .any(|other| other.matches(value));
                if !outranked && handler.matches(value) {
                    return Some(handler);
                }
            }
        }
        self.handlers.iter().find(|handler| handler.matches(value))
    }

    /// Handlers in dispatch order.
    pub fn handlers(&self) -> impl Iterator<Item = &Arc<TypeHandler>> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::TypeOptions;

    fn handler(name: &str, priority: i32) -> Arc<TypeHandler> {
        Arc::new(TypeHandler::new(
            name,
            |value| value.as_str().is_some(),
            |_, _| Ok(Value::Null),
            |_, _| Ok(Value::Null),
            TypeOptions::new().priority(priority),
        ))
    }

    #[test]
    fn keeps_descending_priority_and_insertion_order() {
        let mut registry = TypeRegistry::new();
        registry.register(handler("a", 5)).unwrap();
        registry.register(handler("b", 10)).unwrap();
        registry.register(handler("c", 5)).unwrap();
        registry.register(handler("d", 20)).unwrap();
        let names: Vec<&str> = registry.handlers().map(|h| h.name()).collect();
        assert_eq!(names, ["d", "b", "a", "c"]);
    }

    #[test]
    fn same_instance_twice_is_a_no_op() {
        let mut registry = TypeRegistry::new();
        let a = handler("a", 5);
        registry.register(Arc::clone(&a)).unwrap();
        registry.register(a).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_instance_with_taken_name_fails() {
        let mut registry = TypeRegistry::new();
        registry.register(handler("a", 5)).unwrap();
        let err = registry.register(handler("a", 5)).unwrap_err();
        assert_eq!(err.to_string(), "Coder type \"a\" already registered");
    }

    #[test]
    fn rejects_reserved_names() {
        let mut registry = TypeRegistry::new();
        for name in ["", "ref", "id", "~x", "$$x"] {
            assert!(matches!(
                registry.register(handler(name, 1)),
                Err(CodableError::InvalidTypeName { .. })
            ));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn failed_closure_registers_nothing() {
        let mut registry = TypeRegistry::new();
        registry.register(handler("taken", 1)).unwrap();
        let dep = handler("taken", 1);
        let parent = Arc::new(TypeHandler::new(
            "parent",
            |_| false,
            |_, _| Ok(Value::Null),
            |_, _| Ok(Value::Null),
            TypeOptions::new().depends_on(move || vec![Arc::clone(&dep)]),
        ));
        assert!(registry.register(parent).is_err());
        assert!(!registry.contains("parent"));
    }
}
