//! Core error types.

use crossq_proto::{DatabaseTarget, QueryId, SchemaModel};
use thiserror::Error;

use crate::resolve::FieldRole;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] crossq_proto::Error),

    /// No physical mapping exists for a role of a query.
    #[error("no mapping for {role} of query {query} under {model} model on {target}")]
    Unmapped {
        query: QueryId,
        model: SchemaModel,
        target: DatabaseTarget,
        role: FieldRole,
    },

    /// No plan builder registered for a target.
    #[error("no plan builder registered for target {0}")]
    NoBuilder(DatabaseTarget),

    /// Statistics requested before any sample was recorded.
    #[error("no samples recorded")]
    NoSamples,

    /// Reference pools were written after being frozen.
    #[error("sampler context is frozen")]
    SamplerFrozen,

    /// A reference pool needed for fallback generation is empty.
    #[error("reference pool `{0}` is empty")]
    EmptyPool(&'static str),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A target failed to execute a plan.
    #[error("execution failed on {target}: {message}")]
    Execution {
        target: DatabaseTarget,
        message: String,
    },

    /// A target returned a result the normalizer cannot read.
    #[error("invalid result: {0}")]
    InvalidResult(String),

    /// A target does not support part of a plan.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Whether this error indicates a programming or configuration mistake.
    ///
    /// Fatal errors abort a run. Everything else is scoped to one
    /// (query, target, parameter set) unit and may be logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Unmapped { .. }
                | Error::NoBuilder(_)
                | Error::SamplerFrozen
                | Error::Config(_)
                | Error::Protocol(_)
        )
    }

    /// Build an execution error for a target.
    pub fn execution(target: DatabaseTarget, message: impl ToString) -> Self {
        Error::Execution {
            target,
            message: message.to_string(),
        }
    }
}
