//! Configuration error types.
//!
//! Every variant here is a spec §7 "Programming error": invalid
//! configuration is fail-fast at startup, never silently defaulted.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid YAML for the expected shape.
    #[error("failed to parse config file {path} as YAML: {source}")]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
    /// A rate-limit or size field did not match the `[0-9]+[KMGT]` grammar.
    #[error("invalid rate-limit value {value:?} for field {field}: expected `[0-9]+[KMGT]`")]
    InvalidRateLimit {
        /// Field the invalid value was supplied for.
        field: &'static str,
        /// Raw value that failed to parse.
        value: String,
    },
    /// A required field was left empty.
    #[error("field {field} is required and must not be empty")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
