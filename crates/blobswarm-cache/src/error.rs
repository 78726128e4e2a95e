//! Error types for the single-flight cache.

use std::error::Error;

use thiserror::Error;

/// Primary error type for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The producer responsible for materializing a blob failed.
    #[error("producer failed to materialize blob {blob_id}")]
    ProducerFailed {
        /// Blob identifier the producer was working on.
        blob_id: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The producer responsible for materializing a blob exceeded its deadline.
    #[error("producer timed out materializing blob {blob_id}")]
    ProducerTimedOut {
        /// Blob identifier the producer was working on.
        blob_id: String,
    },
    /// No entry exists for the requested blob.
    #[error("no cache entry for blob {blob_id}")]
    NotFound {
        /// Missing blob identifier.
        blob_id: String,
    },
}

/// Convenience alias for cache operation results.
pub type CacheResult<T> = Result<T, CacheError>;
