//! Reference-counted containers that carry object identity.

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::Value;

fn address<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc).cast::<()>() as usize
}

thread_local! {
    /// Containers currently being formatted on this thread.
    static FORMATTING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

struct Formatting(usize);

impl Drop for Formatting {
    fn drop(&mut self) {
        FORMATTING.with(|active| active.borrow_mut().remove(&self.0));
    }
}

/// Runs `body` unless the container at `addr` is already being formatted
/// further up the stack, in which case `[Circular]` is written instead.
fn debug_once(
    addr: usize,
    f: &mut fmt::Formatter<'_>,
    body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    if !FORMATTING.with(|active| active.borrow_mut().insert(addr)) {
        return f.write_str("[Circular]");
    }
    let _entered = Formatting(addr);
    body(f)
}

/// A shared, mutable array. Clones point at the same storage.
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<Vec<Value>>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Array(Rc::new(RefCell::new(items)))
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    /// Overwrites the element at `index`. Out of range writes are ignored.
    pub fn set(&self, index: usize, value: Value) {
        if let Some(slot) = self.0.borrow_mut().get_mut(index) {
            *slot = value;
        }
    }

    /// Shallow copy of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        address(&self.0)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_once(self.addr(), f, |f| match self.0.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => f.write_str("[<borrowed>]"),
        })
    }
}

/// A shared, mutable, insertion-ordered record.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<IndexMap<String, Value>>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: IndexMap<String, Value>) -> Self {
        Object(Rc::new(RefCell::new(map)))
    }

    pub fn borrow(&self) -> Ref<'_, IndexMap<String, Value>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, IndexMap<String, Value>> {
        self.0.borrow_mut()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    /// Shallow copy of the entries, in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        address(&self.0)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_once(self.addr(), f, |f| match self.0.try_borrow() {
            Ok(map) => f.debug_map().entries(map.iter()).finish(),
            Err(_) => f.write_str("{<borrowed>}"),
        })
    }
}

/// Any value stored behind an [`Instance`].
///
/// Implemented for every `'static` type that is `Debug + PartialEq`, so user
/// types only need those derives to travel through the codec.
pub trait CustomObject: Any + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
    fn dyn_eq(&self, other: &dyn CustomObject) -> bool;
}

impl<T: Any + fmt::Debug + PartialEq> CustomObject for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn dyn_eq(&self, other: &dyn CustomObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// A shared handle to a non-plain object: built-in object types and user
/// types alike.
#[derive(Clone)]
pub struct Instance(Rc<dyn CustomObject>);

impl Instance {
    pub fn new<T: CustomObject>(value: T) -> Self {
        Instance(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// `TypeId` of the concrete value behind the handle.
    pub fn type_id(&self) -> TypeId {
        Any::type_id(self.0.as_any())
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        address(&self.0)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.dyn_eq(other.0.as_ref())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_once(self.addr(), f, |f| fmt::Debug::fmt(&*self.0, f))
    }
}

/// An opaque callable. Encodes to `null` and never round-trips.
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
}

impl Function {
    pub fn new(name: &str) -> Self {
        Function { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn addr(&self) -> usize {
        address(&self.name)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.name, &other.name)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name)
    }
}
