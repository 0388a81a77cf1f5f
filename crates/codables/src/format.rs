//! Wire format vocabulary.
//!
//! - Tag: `{"$$<Name>": payload}`
//! - Reference alias: `{"$$ref": id}`
//! - Canonical occurrence of a shared record or tag: `"$$id": id` entry
//! - Canonical occurrence of a shared array: leading `"$$id:<id>"` element

/// Prefix reserved for tag keys and control keys.
pub const TAG_PREFIX: &str = "$$";

/// Prepended to user data that collides with the reserved syntax.
pub const ESCAPE_SIGIL: char = '~';

pub const REF_KEY: &str = "$$ref";
pub const ID_KEY: &str = "$$id";
pub const ARRAY_ID_PREFIX: &str = "$$id:";

/// Names that would collide with control keys if used for a type.
pub const RESERVED_TYPE_NAMES: [&str; 2] = ["ref", "id"];

pub fn tag_key(name: &str) -> String {
    format!("{TAG_PREFIX}{name}")
}

/// Type name carried by a tag key, e.g. `"$$Set"` -> `"Set"`.
pub fn tag_name(key: &str) -> Option<&str> {
    let name = key.strip_prefix(TAG_PREFIX)?;
    if name.is_empty() || RESERVED_TYPE_NAMES.contains(&name) {
        return None;
    }
    Some(name)
}

pub fn array_id_marker(id: u64) -> String {
    format!("{ARRAY_ID_PREFIX}{id}")
}

/// Parses an unescaped `"$$id:<n>"` array marker.
pub fn parse_array_id_marker(s: &str) -> Option<u64> {
    let digits = s.strip_prefix(ARRAY_ID_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
