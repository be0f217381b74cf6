//! Error types for toolscout.
//!
//! Library crates use [`ToolscoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` and maps it onto HTTP responses.

use std::path::PathBuf;

/// Top-level error type for all toolscout operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolscoutError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Hard failure talking to the analysis service (transport, auth, quota).
    #[error("analysis error: {0}")]
    Analysis(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested raw record is not pending (already processed, failed, or missing).
    #[error("record {id} is already processed or missing")]
    NotPending { id: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ToolscoutError>;

impl ToolscoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a not-pending error for a record id.
    pub fn not_pending(id: impl Into<String>) -> Self {
        Self::NotPending { id: id.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
