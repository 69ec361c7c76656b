use crate::name::SchemaName;

/// Errors raised while loading or registering schema documents.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema file could not be read.
    #[error("failed to load schema {name}: {reason}")]
    LoadFailed { name: SchemaName, reason: String },

    /// The schema document is not a valid JSON Schema.
    #[error("failed to compile schema {name}: {reason}")]
    CompileFailed { name: SchemaName, reason: String },

    /// The schema source is not valid JSON.
    #[error("schema is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The string does not name one of the fixed schemas.
    #[error("unknown schema name: {0}")]
    UnknownName(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
