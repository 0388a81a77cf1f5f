use thiserror::Error;

/// Errors raised by registration, encoding and decoding.
#[derive(Error, Debug)]
pub enum CodableError {
    #[error("Coder type \"{name}\" already registered")]
    DuplicateType { name: String },

    #[error("Cannot register types on the default coder. Create a new Coder instance instead.")]
    DefaultCoderImmutable,

    #[error("Invalid type name \"{name}\": {reason}")]
    InvalidTypeName { name: String, reason: &'static str },

    #[error("Class \"{name}\" extends a class that was never registered")]
    UnknownParentClass { name: String },

    #[error("Not able to encode - no matching type found for {type_name}")]
    UnsupportedValue { type_name: String },

    #[error("External reference \"{key}\" not found")]
    MissingExternalReference { key: String },

    #[error("Invalid \"{type_name}\" payload: {reason}")]
    InvalidPayload { type_name: String, reason: String },

    #[error("{kind} has no JSON representation")]
    NotJson { kind: &'static str },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

impl CodableError {
    pub(crate) fn invalid_payload(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        CodableError::InvalidPayload {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodableError>;
