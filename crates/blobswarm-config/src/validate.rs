//! Post-load validation. Rate-limit grammar is already enforced by
//! `ByteSize`'s `Deserialize` impl at parse time; what's left here is the
//! "required and non-empty" checks spec §6 lists per field.

use crate::error::{ConfigError, ConfigResult};
use crate::model::{CommonConfig, ProxyConfig, SeederConfig};

fn validate_common(common: &CommonConfig) -> ConfigResult<()> {
    if common.root_directory.as_os_str().is_empty() {
        return Err(ConfigError::MissingField {
            field: "root_directory",
        });
    }
    if common.trackers.is_empty() {
        return Err(ConfigError::MissingField { field: "trackers" });
    }
    Ok(())
}

/// Validate a fully-loaded seeder configuration.
///
/// # Errors
///
/// Returns [`ConfigError::MissingField`] if `root_directory`, `trackers`,
/// or `origin` is empty.
pub fn validate_seeder(config: &SeederConfig) -> ConfigResult<()> {
    validate_common(&config.common)?;
    if config.origin.trim().is_empty() {
        return Err(ConfigError::MissingField { field: "origin" });
    }
    Ok(())
}

/// Validate a fully-loaded proxy configuration.
///
/// # Errors
///
/// Returns [`ConfigError::MissingField`] if `root_directory`, `trackers`,
/// `seeders`, or `upstream` is empty.
pub fn validate_proxy(config: &ProxyConfig) -> ConfigResult<()> {
    validate_common(&config.common)?;
    if config.seeders.is_empty() {
        return Err(ConfigError::MissingField { field: "seeders" });
    }
    if config.upstream.trim().is_empty() {
        return Err(ConfigError::MissingField { field: "upstream" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ByteSize;
    use std::path::PathBuf;

    fn common() -> CommonConfig {
        CommonConfig {
            root_directory: PathBuf::from("/var/blobswarm"),
            trackers: vec!["http://tracker.example/announce".to_string()],
            limit_size: ByteSize::from_bytes(1),
            upload_rate_limit: ByteSize::from_bytes(1),
            download_rate_limit: ByteSize::from_bytes(1),
            incoming_port: 50_017,
            download_timeout_secs: 120,
            port: 7070,
            verbose: false,
        }
    }

    #[test]
    fn seeder_requires_non_empty_origin() {
        let config = SeederConfig {
            common: common(),
            origin: String::new(),
        };
        assert!(matches!(
            validate_seeder(&config),
            Err(ConfigError::MissingField { field: "origin" })
        ));
    }

    #[test]
    fn proxy_requires_non_empty_seeders() {
        let config = ProxyConfig {
            common: common(),
            seeders: Vec::new(),
            rules: Vec::new(),
            upstream: "registry.example:443".to_string(),
        };
        assert!(matches!(
            validate_proxy(&config),
            Err(ConfigError::MissingField { field: "seeders" })
        ));
    }

    #[test]
    fn proxy_requires_non_empty_upstream() {
        let config = ProxyConfig {
            common: common(),
            seeders: vec!["seeder-1:7070".to_string()],
            rules: Vec::new(),
            upstream: String::new(),
        };
        assert!(matches!(
            validate_proxy(&config),
            Err(ConfigError::MissingField { field: "upstream" })
        ));
    }

    #[test]
    fn rejects_empty_trackers() {
        let mut common = common();
        common.trackers.clear();
        let config = SeederConfig {
            common,
            origin: "registry.example:443".to_string(),
        };
        assert!(matches!(
            validate_seeder(&config),
            Err(ConfigError::MissingField { field: "trackers" })
        ));
    }
}
