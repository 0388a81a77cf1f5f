//! Locations inside an encoded tree.

use std::fmt;

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Index(usize),
    Key(String),
}

pub type Path = Vec<PathStep>;

/// JSON Pointer component escaping (RFC 6901).
fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    component.replace('~', "~0").replace('/', "~1")
}

/// Formats a path as a JSON Pointer, for diagnostics.
pub fn format_path(path: &[PathStep]) -> String {
    let mut out = String::new();
    for step in path {
        out.push('/');
        out.push_str(&step.to_string());
    }
    out
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Index(i) => write!(f, "{i}"),
            PathStep::Key(k) => f.write_str(&escape_component(k)),
        }
    }
}

impl From<usize> for PathStep {
    fn from(i: usize) -> Self {
        PathStep::Index(i)
    }
}

impl From<&str> for PathStep {
    fn from(k: &str) -> Self {
        PathStep::Key(k.to_string())
    }
}
