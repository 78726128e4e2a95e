//! YAML file loading, layered with `clap`-derived CLI flags and
//! environment variables (spec §6: "every field above is overridable by an
//! environment variable and a CLI flag, with the YAML file supplying the
//! base document").

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{ProxyConfig, SeederConfig};
use crate::validate;

/// CLI/environment overlay for `blobswarm-seeder`. Every field besides
/// `config` is optional: `None` means "take whatever the YAML document (or
/// its own default) says".
#[derive(Debug, Parser, Default)]
#[command(name = "blobswarm-seeder", about = "BlobSwarm seeder daemon")]
pub struct SeederArgs {
    /// Path to the YAML configuration file.
    #[arg(long, env = "BLOBSWARM_CONFIG", default_value = defaults::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// Overrides `root_directory`.
    #[arg(long, env = "BLOBSWARM_ROOT_DIRECTORY")]
    pub root_directory: Option<PathBuf>,
    /// Overrides `trackers` (comma-separated).
    #[arg(long, env = "BLOBSWARM_TRACKERS", value_delimiter = ',')]
    pub trackers: Option<Vec<String>>,
    /// Overrides `limit_size`.
    #[arg(long, env = "BLOBSWARM_LIMIT_SIZE")]
    pub limit_size: Option<String>,
    /// Overrides `upload_rate_limit`.
    #[arg(long, env = "BLOBSWARM_UPLOAD_RATE_LIMIT")]
    pub upload_rate_limit: Option<String>,
    /// Overrides `download_rate_limit`.
    #[arg(long, env = "BLOBSWARM_DOWNLOAD_RATE_LIMIT")]
    pub download_rate_limit: Option<String>,
    /// Overrides `incoming_port`.
    #[arg(long, env = "BLOBSWARM_INCOMING_PORT")]
    pub incoming_port: Option<u16>,
    /// Overrides `download_timeout_secs`.
    #[arg(long, env = "BLOBSWARM_DOWNLOAD_TIMEOUT_SECS")]
    pub download_timeout_secs: Option<u64>,
    /// Overrides `port`.
    #[arg(long, env = "BLOBSWARM_PORT")]
    pub port: Option<u16>,
    /// Overrides `verbose`.
    #[arg(long, env = "BLOBSWARM_VERBOSE")]
    pub verbose: bool,
    /// Overrides `origin`.
    #[arg(long, env = "BLOBSWARM_ORIGIN")]
    pub origin: Option<String>,
}

/// CLI/environment overlay for `blobswarm-proxy`.
#[derive(Debug, Parser, Default)]
#[command(name = "blobswarm-proxy", about = "BlobSwarm proxy daemon")]
pub struct ProxyArgs {
    /// Path to the YAML configuration file.
    #[arg(long, env = "BLOBSWARM_CONFIG", default_value = defaults::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// Overrides `root_directory`.
    #[arg(long, env = "BLOBSWARM_ROOT_DIRECTORY")]
    pub root_directory: Option<PathBuf>,
    /// Overrides `trackers` (comma-separated).
    #[arg(long, env = "BLOBSWARM_TRACKERS", value_delimiter = ',')]
    pub trackers: Option<Vec<String>>,
    /// Overrides `limit_size`.
    #[arg(long, env = "BLOBSWARM_LIMIT_SIZE")]
    pub limit_size: Option<String>,
    /// Overrides `upload_rate_limit`.
    #[arg(long, env = "BLOBSWARM_UPLOAD_RATE_LIMIT")]
    pub upload_rate_limit: Option<String>,
    /// Overrides `download_rate_limit`.
    #[arg(long, env = "BLOBSWARM_DOWNLOAD_RATE_LIMIT")]
    pub download_rate_limit: Option<String>,
    /// Overrides `incoming_port`.
    #[arg(long, env = "BLOBSWARM_INCOMING_PORT")]
    pub incoming_port: Option<u16>,
    /// Overrides `download_timeout_secs`.
    #[arg(long, env = "BLOBSWARM_DOWNLOAD_TIMEOUT_SECS")]
    pub download_timeout_secs: Option<u64>,
    /// Overrides `port`.
    #[arg(long, env = "BLOBSWARM_PORT")]
    pub port: Option<u16>,
    /// Overrides `verbose`.
    #[arg(long, env = "BLOBSWARM_VERBOSE")]
    pub verbose: bool,
    /// Overrides `seeders` (comma-separated `host:port` list).
    #[arg(long, env = "BLOBSWARM_SEEDERS", value_delimiter = ',')]
    pub seeders: Option<Vec<String>>,
    /// Overrides `upstream`.
    #[arg(long, env = "BLOBSWARM_UPSTREAM")]
    pub upstream: Option<String>,
}

/// Load, override, and validate `blobswarm-seeder`'s configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] if the YAML file cannot be read/parsed, if an
/// override value fails the rate-limit grammar, or if validation fails.
pub fn load_seeder(args: &SeederArgs) -> ConfigResult<SeederConfig> {
    let mut config: SeederConfig = read_yaml(&args.config)?;

    if let Some(v) = &args.root_directory {
        config.common.root_directory = v.clone();
    }
    if let Some(v) = &args.trackers {
        config.common.trackers = v.clone();
    }
    if let Some(v) = &args.limit_size {
        config.common.limit_size = parse_byte_size(v, "limit_size")?;
    }
    if let Some(v) = &args.upload_rate_limit {
        config.common.upload_rate_limit = parse_byte_size(v, "upload_rate_limit")?;
    }
    if let Some(v) = &args.download_rate_limit {
        config.common.download_rate_limit = parse_byte_size(v, "download_rate_limit")?;
    }
    if let Some(v) = args.incoming_port {
        config.common.incoming_port = v;
    }
    if let Some(v) = args.download_timeout_secs {
        config.common.download_timeout_secs = v;
    }
    if let Some(v) = args.port {
        config.common.port = v;
    }
    if args.verbose {
        config.common.verbose = true;
    }
    if let Some(v) = &args.origin {
        config.origin = v.clone();
    }

    validate::validate_seeder(&config)?;
    Ok(config)
}

/// Load, override, and validate `blobswarm-proxy`'s configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] if the YAML file cannot be read/parsed, if an
/// override value fails the rate-limit grammar, or if validation fails.
pub fn load_proxy(args: &ProxyArgs) -> ConfigResult<ProxyConfig> {
    let mut config: ProxyConfig = read_yaml(&args.config)?;

    if let Some(v) = &args.root_directory {
        config.common.root_directory = v.clone();
    }
    if let Some(v) = &args.trackers {
        config.common.trackers = v.clone();
    }
    if let Some(v) = &args.limit_size {
        config.common.limit_size = parse_byte_size(v, "limit_size")?;
    }
    if let Some(v) = &args.upload_rate_limit {
        config.common.upload_rate_limit = parse_byte_size(v, "upload_rate_limit")?;
    }
    if let Some(v) = &args.download_rate_limit {
        config.common.download_rate_limit = parse_byte_size(v, "download_rate_limit")?;
    }
    if let Some(v) = args.incoming_port {
        config.common.incoming_port = v;
    }
    if let Some(v) = args.download_timeout_secs {
        config.common.download_timeout_secs = v;
    }
    if let Some(v) = args.port {
        config.common.port = v;
    }
    if args.verbose {
        config.common.verbose = true;
    }
    if let Some(v) = &args.seeders {
        config.seeders = v.clone();
    }
    if let Some(v) = &args.upstream {
        config.upstream = v.clone();
    }

    validate::validate_proxy(&config)?;
    Ok(config)
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_byte_size(raw: &str, field: &'static str) -> ConfigResult<crate::model::ByteSize> {
    raw.parse().map_err(|()| ConfigError::InvalidRateLimit {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn load_seeder_applies_cli_overrides_over_yaml() {
        let file = write_yaml(
            r"
root_directory: /var/blobswarm
trackers: [http://tracker.example/announce]
incoming_port: 50017
origin: registry.example:443
",
        );

        let mut args = SeederArgs::default();
        args.config = file.path().to_path_buf();
        args.port = Some(9090);
        args.limit_size = Some("1G".to_string());

        let config = load_seeder(&args).expect("load");
        assert_eq!(config.common.port, 9090);
        assert_eq!(config.common.limit_size.bytes(), 1 << 30);
        assert_eq!(config.origin, "registry.example:443");
    }

    #[test]
    fn load_proxy_rejects_invalid_rate_limit_override() {
        let file = write_yaml(
            r"
root_directory: /var/blobswarm
trackers: [http://tracker.example/announce]
incoming_port: 50007
seeders: [seeder-1:7070]
upstream: registry.example:443
",
        );

        let mut args = ProxyArgs::default();
        args.config = file.path().to_path_buf();
        args.limit_size = Some("nope".to_string());

        let err = load_proxy(&args).expect_err("should reject malformed override");
        assert!(matches!(err, ConfigError::InvalidRateLimit { field: "limit_size", .. }));
    }

    #[test]
    fn load_proxy_fails_validation_without_seeders() {
        let file = write_yaml(
            r"
root_directory: /var/blobswarm
trackers: [http://tracker.example/announce]
incoming_port: 50007
seeders: []
upstream: registry.example:443
",
        );
        let mut args = ProxyArgs::default();
        args.config = file.path().to_path_buf();

        let err = load_proxy(&args).expect_err("should fail validation");
        assert!(matches!(err, ConfigError::MissingField { field: "seeders" }));
    }
}
