//! Error types for store operations

use std::path::PathBuf;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A stored value could not be parsed into its typed form
    #[error("invalid value '{value}' for key '{key}'")]
    InvalidValue { key: String, value: String },

    /// The backing file holds something other than a JSON object of strings
    #[error("corrupt store file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// I/O error (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific error
    #[error("store backend error: {0}")]
    Backend(String),
}
