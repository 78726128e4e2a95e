//! # Design
//!
//! - Centralize seeder-level errors for bootstrap and the producer pipeline.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for seeder operations.
pub type SeederResult<T> = Result<T, SeederError>;

/// Seeder-level error type.
#[derive(Debug, Error)]
pub enum SeederError {
    /// Configuration loading or validation failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        #[source]
        source: blobswarm_config::ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        #[source]
        source: anyhow::Error,
    },
    /// The storage layer failed to open or operate on disk.
    #[error("storage operation failed")]
    Storage {
        /// Operation identifier.
        operation: &'static str,
        /// Source storage error.
        #[source]
        source: blobswarm_storage::StorageError,
    },
    /// The BT engine adapter failed.
    #[error("engine operation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        #[source]
        source: blobswarm_engine::EngineError,
    },
    /// Fetching a blob from the origin registry failed.
    #[error("origin fetch failed for {blob_id}")]
    OriginFetch {
        /// Blob identifier being fetched.
        blob_id: String,
        /// Source HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// The origin registry returned a non-success status for a blob.
    #[error("origin returned status {status} for {blob_id}")]
    OriginStatus {
        /// Blob identifier being fetched.
        blob_id: String,
        /// HTTP status code returned by the origin.
        status: u16,
    },
    /// A producer attempt exceeded `download_timeout_secs`.
    #[error("producer timed out materializing blob {blob_id}")]
    ProducerTimedOut {
        /// Blob identifier that timed out.
        blob_id: String,
    },
    /// The gRPC server failed to bind or serve.
    #[error("gRPC server operation failed")]
    Grpc {
        /// Operation identifier.
        operation: &'static str,
        /// Source transport error.
        #[source]
        source: tonic::transport::Error,
    },
    /// A configured socket address could not be parsed.
    #[error("invalid listen address {value}")]
    InvalidAddr {
        /// Raw value that failed to parse.
        value: String,
    },
}

impl SeederError {
    pub(crate) fn config(operation: &'static str, source: blobswarm_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) fn telemetry(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) fn storage(operation: &'static str, source: blobswarm_storage::StorageError) -> Self {
        Self::Storage { operation, source }
    }

    pub(crate) fn engine(operation: &'static str, source: blobswarm_engine::EngineError) -> Self {
        Self::Engine { operation, source }
    }

    pub(crate) fn grpc(operation: &'static str, source: tonic::transport::Error) -> Self {
        Self::Grpc { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_helpers_build_variants() {
        let config = SeederError::config(
            "load",
            blobswarm_config::ConfigError::InvalidRateLimit {
                field: "limit_size",
                value: "bad".to_string(),
            },
        );
        assert!(matches!(config, SeederError::Config { .. }));

        let engine = SeederError::engine(
            "start_seed",
            blobswarm_engine::EngineError::Timeout {
                blob_id: "abc".to_string(),
            },
        );
        assert!(matches!(engine, SeederError::Engine { .. }));
    }
}
