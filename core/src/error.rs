//! Core error types for the SQL dumper

use thiserror::Error;

/// Core error type for all operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] tiberius::error::Error),

    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Row read failed for {table}: {message}")]
    RowRead { table: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dump cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap a failure that happened while listing tables or columns
    pub fn metadata(message: impl std::fmt::Display) -> Self {
        CoreError::MetadataUnavailable(message.to_string())
    }

    /// Wrap a failure that happened while reading rows of `table`
    pub fn row_read(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CoreError::RowRead {
            table: table.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;
