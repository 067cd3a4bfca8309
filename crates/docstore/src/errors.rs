use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid store URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Model not registered: {0}")]
    UnknownModel(String),

    #[error("Model already registered: {0}")]
    ModelExists(String),

    #[error("{model} validation failed: `{field}` is required")]
    MissingField { model: String, field: String },

    #[error("{model} validation failed: `{field}` must be of type {expected}")]
    FieldType {
        model: String,
        field: String,
        expected: String,
    },

    #[error("Duplicate key in {model}: `{field}` already has value {value}")]
    DuplicateKey {
        model: String,
        field: String,
        value: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

impl StoreError {
    /// Returns true for schema and uniqueness violations on a single document.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::MissingField { .. }
                | StoreError::FieldType { .. }
                | StoreError::DuplicateKey { .. }
        )
    }

    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}
