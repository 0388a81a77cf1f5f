//! Insertion-ordered `Set` and `Map` with SameValueZero keys.
//!
//! Both support containing themselves: when an element aliases the
//! collection under construction, the collection is rebuilt from the patched
//! payload.

use std::cell::RefCell;
use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::error::{CodableError, Result};
use crate::handler::{SelfReference, TypeHandler, TypeOptions};
use crate::value::{Key, Value};

#[derive(Default)]
pub struct Set {
    entries: RefCell<IndexSet<Key>>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Set {
            entries: RefCell::new(values.into_iter().map(Key::new).collect()),
        }
    }

    /// Returns `false` when the value was already present.
    pub fn insert(&self, value: Value) -> bool {
        self.entries.borrow_mut().insert(Key::new(value))
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.entries.borrow().contains(&Key::new(value.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries
            .borrow()
            .iter()
            .map(|key| key.value().clone())
            .collect()
    }

    fn replace_with(&self, values: Vec<Value>) {
        *self.entries.borrow_mut() = values.into_iter().map(Key::new).collect();
    }
}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(entries) = self.entries.try_borrow() else {
            return f.write_str("Set {<borrowed>}");
        };
        f.write_str("Set ")?;
        f.debug_set().entries(entries.iter().map(Key::value)).finish()
    }
}

/// Same elements in the same order, compared structurally.
impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.values(), other.values());
        a.len() == b.len() && a.iter().zip(&b).all(|(a, b)| a == b)
    }
}

#[derive(Default)]
pub struct Map {
    entries: RefCell<IndexMap<Key, Value>>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Map {
            entries: RefCell::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (Key::new(k), v))
                    .collect(),
            ),
        }
    }

    pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
        self.entries.borrow_mut().insert(Key::new(key), value)
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries.borrow().get(&Key::new(key.clone())).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.value().clone(), v.clone()))
            .collect()
    }

    fn replace_with(&self, entries: Vec<(Value, Value)>) {
        *self.entries.borrow_mut() = entries
            .into_iter()
            .map(|(k, v)| (Key::new(k), v))
            .collect();
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(entries) = self.entries.try_borrow() else {
            return f.write_str("Map {<borrowed>}");
        };
        f.write_str("Map ")?;
        f.debug_map()
            .entries(entries.iter().map(|(k, v)| (k.value(), v)))
            .finish()
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.entries(), other.entries());
        a.len() == b.len()
            && a.iter()
                .zip(&b)
                .all(|((ak, av), (bk, bv))| ak == bk && av == bv)
    }
}

fn set_elements(payload: &Value) -> Result<Vec<Value>> {
    payload
        .as_array()
        .map(|array| array.to_vec())
        .ok_or_else(|| CodableError::invalid_payload("Set", "expected an array of elements"))
}

fn map_entries(payload: &Value) -> Result<Vec<(Value, Value)>> {
    let Some(pairs) = payload.as_array() else {
        return Err(CodableError::invalid_payload("Map", "expected an array of entries"));
    };
    pairs
        .to_vec()
        .into_iter()
        .map(|pair| match pair.as_array().map(|pair| pair.to_vec()).as_deref() {
            Some([key, value]) => Ok((key.clone(), value.clone())),
            _ => Err(CodableError::invalid_payload("Map", "expected [key, value] pairs")),
        })
        .collect()
}

pub(super) fn set_handler() -> TypeHandler {
    TypeHandler::new(
        "Set",
        |value| value.downcast_ref::<Set>().is_some(),
        |value, _| {
            Ok(value
                .downcast_ref::<Set>()
                .map_or(Value::Null, |set| Value::array(set.values())))
        },
        |payload, _| Ok(Value::instance(Set::from_values(set_elements(&payload)?))),
        TypeOptions::new()
            .class::<Set>()
            .on_self_reference(|reference: &SelfReference<'_>| {
                let Some(set) = reference.instance.downcast_ref::<Set>() else {
                    return false;
                };
                match set_elements(reference.payload) {
                    Ok(values) => {
                        set.replace_with(values);
                        true
                    }
                    Err(_) => false,
                }
            }),
    )
}

pub(super) fn map_handler() -> TypeHandler {
    TypeHandler::new(
        "Map",
        |value| value.downcast_ref::<Map>().is_some(),
        |value, _| {
            Ok(value.downcast_ref::<Map>().map_or(Value::Null, |map| {
                Value::array(
                    map.entries()
                        .into_iter()
                        .map(|(k, v)| Value::array([k, v])),
                )
            }))
        },
        |payload, _| Ok(Value::instance(Map::from_entries(map_entries(&payload)?))),
        TypeOptions::new()
            .class::<Map>()
            .on_self_reference(|reference: &SelfReference<'_>| {
                let Some(map) = reference.instance.downcast_ref::<Map>() else {
                    return false;
                };
                match map_entries(reference.payload) {
                    Ok(entries) => {
                        map.replace_with(entries);
                        true
                    }
                    Err(_) => false,
                }
            }),
    )
}
