//! Error types for Cadence

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Config error: {0}")]
    Config(String),

    /// Malformed date/range input, rejected before any processing
    #[error("Validation error: {0}")]
    Validation(String),

    /// A source references a category owned by a different scope
    #[error("Category {category_id} referenced by source {source_id} belongs to another scope")]
    Ownership { source_id: i64, category_id: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate occurrence; the automation engine resolves this as a skip
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store call '{operation}' timed out after {timeout_ms}ms")]
    Timeout {
        operation: String,
        timeout_ms: u64,
    },

    #[error("Scope {scope} is busy ({purpose} already running)")]
    LeaseUnavailable { scope: String, purpose: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Transient store failures the caller may retry verbatim.
    ///
    /// Automation retries are safe because already-materialized occurrences
    /// are skipped on the second pass.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout { .. } | Error::LeaseUnavailable { .. } | Error::Unavailable(_) => true,
            Error::Pool(_) => true,
            Error::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Map a UNIQUE constraint violation to `Conflict`, pass anything else through
    pub(crate) fn from_insert(err: rusqlite::Error, what: impl Into<String>) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Conflict(what.into())
            }
            other => Error::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
