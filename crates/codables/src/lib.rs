//! Lossless JSON encoding for rich values.
//!
//! Encodes a [`Value`] graph into a JSON-safe tree and back, keeping what
//! plain JSON loses: shared and circular references, dates, sets, maps,
//! errors, typed arrays, big integers, symbols, `undefined`, special numbers
//! and user-defined types.
//!
//! # Example
//!
//! ```
//! use codables::{Date, Value};
//! use serde_json::json;
//!
//! let date = Value::instance(Date::parse("2025-01-01T00:00:00.000Z"));
//! let tree = codables::encode(&date).unwrap();
//! assert_eq!(tree.to_json().unwrap(), json!({"$$Date": "2025-01-01T00:00:00.000Z"}));
//!
//! let shared = Value::object([("x", Value::from(1))]);
//! let list = Value::array([shared.clone(), shared]);
//! let text = codables::stringify(&list).unwrap();
//! assert_eq!(text, r#"[{"$$id":0,"x":1},{"$$ref":0}]"#);
//!
//! let back = codables::parse(&text).unwrap();
//! let items = back.as_array().unwrap();
//! assert!(items.get(0).unwrap().same_ref(&items.get(1).unwrap()));
//! ```

pub mod builtin;
pub mod class;
pub mod coder;
pub mod decode;
pub mod encode;
pub mod error;
pub mod escape;
pub mod format;
pub mod handler;
pub mod path;
pub mod registry;
pub mod security;
pub mod value;

pub use builtin::{
    builtin_type, builtin_types, external_reference, Date, ErrorObject, ExternalReference, Map,
    RegExp, Set, TypedArray, UrlSearchParams,
};
pub use class::{class, ClassBuilder, Memberwise};
pub use coder::{coder, copy, decode, encode, parse, stringify, Coder};
pub use decode::{DecodeContext, DecodeOptions};
pub use encode::{EncodeContext, EncodeOptions, UnknownInputMode};
pub use error::{CodableError, Result};
pub use handler::{SelfReference, TypeHandler, TypeOptions, DEFAULT_PRIORITY};
pub use path::{Path, PathStep};
pub use registry::TypeRegistry;
pub use value::{Array, CustomObject, Function, Instance, Key, Object, Symbol, Value};

pub use num_bigint::BigInt;
pub use url::Url;
