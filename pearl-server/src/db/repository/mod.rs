//! Repository Module
//!
//! Free async functions over the SQLite pool, one module per aggregate.
//! Conditional writes (claim, status transitions, stock decrements)
//! surface as `rows_affected()` guards so callers can distinguish
//! "applied" from "lost the race" without read-then-write windows.

pub mod inventory;
pub mod order;
pub mod staff;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
