//! # Design
//!
//! - Centralize proxy-level errors for bootstrap and the leech pipeline.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Proxy-level error type.
#[derive(Debug, Error)]
pub enum ProxyError {
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
    /// Calling the seeder's `MetaInfo` gRPC service failed on every
    /// configured endpoint.
    #[error("metainfo request for {blob_id} failed on every seeder endpoint")]
    MetaInfoUnavailable {
        /// Blob identifier the metainfo request was for.
        blob_id: String,
    },
    /// The metainfo returned by the seeder could not be decoded.
    #[error("engine operation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        #[source]
        source: blobswarm_engine::EngineError,
    },
    /// A producer attempt exceeded `download_timeout_secs`.
    #[error("producer timed out materializing blob {blob_id}")]
    ProducerTimedOut {
        /// Blob identifier that timed out.
        blob_id: String,
    },
    /// The HTTP server failed to bind or serve.
    #[error("HTTP server operation failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Source I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A configured socket address could not be parsed.
    #[error("invalid listen address {value}")]
    InvalidAddr {
        /// Raw value that failed to parse.
        value: String,
    },
}

impl ProxyError {
    pub(crate) fn config(operation: &'static str, source: blobswarm_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) fn telemetry(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) fn storage(operation: &'static str, source: blobswarm_storage::StorageError) -> Self {
        Self::Storage { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_helpers_build_variants() {
        let config = ProxyError::config(
            "load",
            blobswarm_config::ConfigError::InvalidRateLimit {
                field: "limit_size",
                value: "bad".to_string(),
            },
        );
        assert!(matches!(config, ProxyError::Config { .. }));

        let unavailable = ProxyError::MetaInfoUnavailable {
            blob_id: "abc".to_string(),
        };
        assert!(matches!(unavailable, ProxyError::MetaInfoUnavailable { .. }));
    }
}
