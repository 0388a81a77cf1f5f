use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

#[derive(Debug)]
struct SymbolInner {
    description: Option<String>,
}

/// A unique token. Two symbols are equal only when they are the same symbol.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolInner>);

fn global_symbols() -> &'static Mutex<HashMap<String, Symbol>> {
    static SYMBOLS: OnceLock<Mutex<HashMap<String, Symbol>>> = OnceLock::new();
    SYMBOLS.get_or_init(|| Mutex::new(HashMap::new()))
}

impl Symbol {
    /// Creates a fresh symbol that is not part of the global registry.
    pub fn new(description: Option<&str>) -> Self {
        Symbol(Arc::new(SymbolInner {
            description: description.map(str::to_string),
        }))
    }

    /// Returns the symbol registered under `key`, creating it on first use.
    pub fn for_key(key: &str) -> Self {
        let mut symbols = global_symbols()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        symbols
            .entry(key.to_string())
            .or_insert_with(|| Symbol::new(Some(key)))
            .clone()
    }

    /// Key under which this symbol sits in the global registry, if any.
    pub fn key_for(&self) -> Option<String> {
        let symbols = global_symbols()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        symbols
            .iter()
            .find(|(_, symbol)| symbol == &self)
            .map(|(key, _)| key.clone())
    }

    pub fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_key_returns_the_same_symbol() {
        let a = Symbol::for_key("symbol-test-shared");
        let b = Symbol::for_key("symbol-test-shared");
        assert_eq!(a, b);
        assert_eq!(a.key_for().as_deref(), Some("symbol-test-shared"));
    }

    #[test]
    fn fresh_symbols_are_distinct() {
        let a = Symbol::new(Some("x"));
        let b = Symbol::new(Some("x"));
        assert_ne!(a, b);
        assert_eq!(a.key_for(), None);
    }
}
