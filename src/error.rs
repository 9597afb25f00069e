//! Error types for imgshelf.

use serde::Serialize;
use thiserror::Error;

/// A file that was left out of an upload batch, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    /// Original filename as sent by the client.
    pub filename: String,
    /// Human readable reason.
    pub reason: String,
}

impl SkippedFile {
    /// Create a new skipped entry.
    pub fn new(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            reason: reason.into(),
        }
    }
}

/// Common error type for imgshelf.
#[derive(Error, Debug)]
pub enum ShelfError {
    /// Database error.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The batch does not fit in the user's remaining storage.
    #[error("storage quota exceeded: requested {requested} bytes, {available} available")]
    QuotaExceeded { requested: i64, available: i64 },

    /// Every file of an upload was rejected.
    #[error("no valid files in upload")]
    NoValidFiles(Vec<SkippedFile>),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Image decode/encode failure.
    #[error("processing error: {0}")]
    Processing(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for ShelfError {
    fn from(e: sqlx::Error) -> Self {
        ShelfError::Database(e.to_string())
    }
}

impl From<image::ImageError> for ShelfError {
    fn from(e: image::ImageError) -> Self {
        ShelfError::Processing(e.to_string())
    }
}

/// Result type alias for imgshelf operations.
pub type Result<T> = std::result::Result<T, ShelfError>;
