//! Error types for Tradeyard Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness violation surfaced past the registry's atomic insert.
    /// Seeing this in logs means the registry path has a bug.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage failure. Safe to retry with the same idempotency key.
    #[error("Storage unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
