//! Protocol error types.

use thiserror::Error;

/// Errors raised while building or reading the shared data types.
#[derive(Debug, Error)]
pub enum Error {
    /// A logical query needs a parameter the set does not carry.
    #[error("missing parameter `{name}` for query `{query}`")]
    MissingParameter { query: String, name: String },

    /// A parameter is present but has the wrong type.
    #[error("parameter `{name}` expected {expected}, got {actual}")]
    ParameterType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Unknown parameter name.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// Unknown logical query identifier.
    #[error("unknown query: {0}")]
    UnknownQuery(String),

    /// Unknown database target identifier.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// Unknown schema model identifier.
    #[error("unknown schema model: {0}")]
    UnknownSchemaModel(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
