//! Error types for the filesystem storage shim.
//!
//! # Design
//!
//! - Provide structured, constant-message errors.
//! - Capture operation context (paths) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by the filesystem storage shim.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO failure while interacting with the data or torrent directory.
    #[error("storage io failure during {operation}")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The requested blob has no on-disk entry.
    #[error("no stored blob for id {blob_id}")]
    NotFound {
        /// Blob identifier that was requested.
        blob_id: String,
    },
}

impl StorageError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn io_helper_preserves_source() {
        let err = StorageError::io("read", "/tmp/blob", io::Error::other("disk gone"));
        assert!(matches!(err, StorageError::Io { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn not_found_reports_blob_id() {
        let err = StorageError::NotFound {
            blob_id: "abc123".into(),
        };
        assert!(err.to_string().contains("abc123"));
    }
}
