use regex::{Regex, RegexBuilder};

use crate::error::{CodableError, Result};
use crate::handler::{TypeHandler, TypeOptions};
use crate::value::Value;

/// A regular expression kept as source text plus flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegExp {
    source: String,
    flags: String,
}

impl RegExp {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        RegExp {
            source: source.into(),
            flags: flags.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Compiles the pattern, honouring the `i`, `m`, `s` and `u` flags.
    pub fn to_regex(&self) -> Result<Regex> {
        let regex = RegexBuilder::new(&self.source)
            .case_insensitive(self.flags.contains('i'))
            .multi_line(self.flags.contains('m'))
            .dot_matches_new_line(self.flags.contains('s'))
            .unicode(true)
            .build()?;
        Ok(regex)
    }
}

pub(super) fn handler() -> TypeHandler {
    TypeHandler::new(
        "RegExp",
        |value| value.downcast_ref::<RegExp>().is_some(),
        |value, _| {
            let Some(re) = value.downcast_ref::<RegExp>() else {
                return Ok(Value::Null);
            };
            if re.flags.is_empty() {
                return Ok(Value::from(re.source.as_str()));
            }
            Ok(Value::array([
                Value::from(re.source.as_str()),
                Value::from(re.flags.as_str()),
            ]))
        },
        |payload, _| {
            if let Some(source) = payload.as_str() {
                return Ok(Value::instance(RegExp::new(source, "")));
            }
            let parts = payload.as_array().map(|parts| parts.to_vec());
            match parts.as_deref() {
                Some([Value::String(source), Value::String(flags)]) => {
                    Ok(Value::instance(RegExp::new(source.as_str(), flags.as_str())))
                }
                _ => Err(CodableError::invalid_payload(
                    "RegExp",
                    "expected a source string or [source, flags]",
                )),
            }
        },
        TypeOptions::new().flat().class::<RegExp>(),
    )
}
