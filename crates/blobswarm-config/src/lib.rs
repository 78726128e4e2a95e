//! Configuration loading and validation for `blobswarm-seeder` and
//! `blobswarm-proxy`: a YAML base document overridden by CLI flags and
//! environment variables (spec §6), validated fail-fast before the daemon
//! starts.
#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused_imports,
    unused_must_use,
    clippy::all,
    missing_docs
)]

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_proxy, load_seeder, ProxyArgs, SeederArgs};
pub use model::{ByteSize, CommonConfig, ProxyConfig, SeederConfig};
