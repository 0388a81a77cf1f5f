use url::{form_urlencoded, Url};

use crate::error::{CodableError, Result};
use crate::handler::{TypeHandler, TypeOptions};
use crate::value::Value;

/// Ordered `application/x-www-form-urlencoded` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlSearchParams {
    pairs: Vec<(String, String)>,
}

impl UrlSearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a query string. A leading `?` is ignored.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        UrlSearchParams {
            pairs: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

impl std::fmt::Display for UrlSearchParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.pairs {
            serializer.append_pair(name, value);
        }
        f.write_str(&serializer.finish())
    }
}

fn expect_str<'v>(type_name: &'static str, payload: &'v Value) -> Result<&'v str> {
    payload
        .as_str()
        .ok_or_else(|| CodableError::invalid_payload(type_name, "expected a string"))
}

pub(super) fn url_handler() -> TypeHandler {
    TypeHandler::new(
        "URL",
        |value| value.downcast_ref::<Url>().is_some(),
        |value, _| {
            Ok(value
                .downcast_ref::<Url>()
                .map_or(Value::Null, |url| Value::from(url.as_str())))
        },
        |payload, _| {
            let url = Url::parse(expect_str("URL", &payload)?)
                .map_err(|e| CodableError::invalid_payload("URL", e.to_string()))?;
            Ok(Value::instance(url))
        },
        TypeOptions::new().flat().class::<Url>(),
    )
}

pub(super) fn search_params_handler() -> TypeHandler {
    TypeHandler::new(
        "URLSearchParams",
        |value| value.downcast_ref::<UrlSearchParams>().is_some(),
        |value, _| {
            Ok(value
                .downcast_ref::<UrlSearchParams>()
                .map_or(Value::Null, |params| Value::String(params.to_string())))
        },
        |payload, _| {
            let query = expect_str("URLSearchParams", &payload)?;
            Ok(Value::instance(UrlSearchParams::parse(query)))
        },
        TypeOptions::new().flat().class::<UrlSearchParams>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_params_round_trip() {
        let params = UrlSearchParams::parse("?a=1&b=x+y&a=2&c=%26");
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("x y"));
        assert_eq!(params.get("c"), Some("&"));
        assert_eq!(params.to_string(), "a=1&b=x+y&a=2&c=%26");
    }
}
