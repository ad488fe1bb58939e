//! Index error types.

use std::path::PathBuf;

/// Errors that can occur while mirroring or parsing a module index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The local mirror is missing, unwritable or corrupt.
    #[error("storage error at {path}: {detail}")]
    Storage { path: PathBuf, detail: String },

    /// The remote update conflicts with the local mirror.
    #[error("index update conflicts with local mirror: {}", paths.join(", "))]
    SyncConflict { paths: Vec<String> },

    /// The requested entry does not exist in the current snapshot.
    #[error("not found in index snapshot: {path}")]
    NotFound { path: String },

    /// A descriptor could not be parsed.
    #[error("invalid module descriptor {source_name}: {detail}")]
    Parse { source_name: String, detail: String },

    /// A descriptor parsed but carries no `id`.
    #[error("module descriptor {source_name} has no id field")]
    MissingId { source_name: String },

    /// A git command failed.
    #[error("git {command} failed: {detail}")]
    Git { command: String, detail: String },

    /// The index document could not be fetched.
    #[error("fetching {location} failed: {detail}")]
    Fetch { location: String, detail: String },

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid descriptor path pattern.
    #[error("invalid path pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    pub(crate) fn storage(path: impl Into<PathBuf>, detail: impl std::fmt::Display) -> Self {
        IndexError::Storage {
            path: path.into(),
            detail: detail.to_string(),
        }
    }
}

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
