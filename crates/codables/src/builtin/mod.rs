//! Built-in type catalogue.
//!
//! All built-ins use [`DEFAULT_PRIORITY`](crate::handler::DEFAULT_PRIORITY)
//! and are registered in the order below, most common first.

mod collections;
mod date;
mod error_object;
mod external;
mod primitives;
mod regexp;
mod typed_array;
mod web;

use std::sync::{Arc, OnceLock};

use crate::handler::TypeHandler;

pub use collections::{Map, Set};
pub use date::Date;
pub use error_object::ErrorObject;
pub use external::{external_reference, ExternalReference};
pub use primitives::special_number_name;
pub use regexp::RegExp;
pub use typed_array::TypedArray;
pub use web::UrlSearchParams;

/// Built-in handlers. The same `Arc`s are returned on every call, so
/// registering them into several registries never conflicts.
pub fn builtin_types() -> &'static [Arc<TypeHandler>] {
    static BUILTINS: OnceLock<Vec<Arc<TypeHandler>>> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        vec![
            Arc::new(date::handler()),
            Arc::new(collections::set_handler()),
            Arc::new(collections::map_handler()),
            Arc::new(error_object::handler()),
            Arc::new(primitives::undefined_handler()),
            Arc::new(primitives::bigint_handler()),
            Arc::new(regexp::handler()),
            Arc::new(web::url_handler()),
            Arc::new(primitives::symbol_handler()),
            Arc::new(typed_array::handler()),
            Arc::new(primitives::number_handler()),
            Arc::new(web::search_params_handler()),
            Arc::new(external::handler()),
        ]
    })
}

/// Looks up a built-in handler by type name.
pub fn builtin_type(name: &str) -> Option<&'static Arc<TypeHandler>> {
    builtin_types().iter().find(|handler| handler.name() == name)
}
