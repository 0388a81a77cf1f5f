//! Collision escaping for user data that looks like wire syntax.
//!
//! Keys starting with `$$` (after any number of `~`) and strings shaped like
//! the array id marker get one extra `~` on encode. Decode strips exactly
//! one, so applying the codec `N` times and reversing it `N` times always
//! yields the original data.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

use crate::format::ESCAPE_SIGIL;

fn lazy_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|e| panic!("invalid pattern {pattern}: {e}")))
}

fn maybe_escaped_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    lazy_regex(&RE, r"^~*\$\$")
}

fn escaped_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    lazy_regex(&RE, r"^~+\$\$")
}

fn maybe_escaped_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    lazy_regex(&RE, r"^~*\$\$id:[0-9]+$")
}

fn prepend_sigil(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 1);
    out.push(ESCAPE_SIGIL);
    out.push_str(s);
    out
}

/// Escapes a record key that collides with tag or control keys.
pub fn escape_key(key: &str) -> Cow<'_, str> {
    if maybe_escaped_key().is_match(key) {
        Cow::Owned(prepend_sigil(key))
    } else {
        Cow::Borrowed(key)
    }
}

/// Reverses [`escape_key`].
pub fn unescape_key(key: &str) -> Cow<'_, str> {
    if escaped_key().is_match(key) {
        Cow::Borrowed(&key[ESCAPE_SIGIL.len_utf8()..])
    } else {
        Cow::Borrowed(key)
    }
}

/// `true` for keys that [`unescape_key`] would change.
pub fn is_escaped_key(key: &str) -> bool {
    escaped_key().is_match(key)
}

/// Escapes a string that collides with the array id marker.
pub fn escape_string(s: &str) -> Cow<'_, str> {
    if maybe_escaped_marker().is_match(s) {
        Cow::Owned(prepend_sigil(s))
    } else {
        Cow::Borrowed(s)
    }
}

/// Reverses [`escape_string`].
pub fn unescape_string(s: &str) -> Cow<'_, str> {
    if s.starts_with(ESCAPE_SIGIL) && maybe_escaped_marker().is_match(s) {
        Cow::Borrowed(&s[ESCAPE_SIGIL.len_utf8()..])
    } else {
        Cow::Borrowed(s)
    }
}
