//! Bench crate error types.

use crossq_proto::DatabaseTarget;
use thiserror::Error;

/// Result type for backend and harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by backends, loaders, and the run matrix.
#[derive(Debug, Error)]
pub enum Error {
    /// Core engine error.
    #[error(transparent)]
    Core(#[from] crossq_core::Error),

    /// SQLite driver error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL driver error.
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Connection pool error.
    #[error("pool error: {0}")]
    Pool(String),

    /// Invalid regular expression in a document filter.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must abort a run.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Core(e) => e.is_fatal(),
            _ => false,
        }
    }

    /// Convert into a core error attributed to `target`.
    ///
    /// Core errors pass through unchanged; driver errors become
    /// execution failures of the target.
    pub fn into_core(self, target: DatabaseTarget) -> crossq_core::Error {
        match self {
            Error::Core(e) => e,
            other => crossq_core::Error::execution(target, other.to_string()),
        }
    }
}

impl From<crossq_proto::Error> for Error {
    fn from(e: crossq_proto::Error) -> Self {
        Error::Core(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_errors_are_recoverable() {
        let err = Error::Pool("timeout".to_string());
        assert!(!err.is_fatal());
        let core = err.into_core(DatabaseTarget::Relational);
        assert!(matches!(
            core,
            crossq_core::Error::Execution {
                target: DatabaseTarget::Relational,
                ..
            }
        ));
    }

    #[test]
    fn test_core_errors_keep_fatality() {
        let err = Error::from(crossq_core::Error::NoBuilder(DatabaseTarget::SqlJson));
        assert!(err.is_fatal());
        assert!(matches!(
            err.into_core(DatabaseTarget::SqlJson),
            crossq_core::Error::NoBuilder(_)
        ));
    }
}
