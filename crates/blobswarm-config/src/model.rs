//! Configuration domain types.
//!
//! `CommonConfig` holds every option shared by both sides (spec §6's
//! enumerated option table); `SeederConfig`/`ProxyConfig` each flatten it
//! and add their side's own fields (`origin` / `seeders`).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// A byte quantity parsed from the rate-limit suffix grammar documented in
/// spec §6: `[0-9]+[KMGT]`, multiplying by `2^{10,20,30,40}` respectively.
/// Used for `limit_size`, `upload_rate_limit`, and `download_rate_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Construct directly from a byte count (used by defaults and tests).
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// The byte count this value represents.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(());
        }
        let (digits, suffix) = raw.split_at(raw.len() - 1);
        let multiplier: u64 = match suffix {
            "K" => 1 << 10,
            "M" => 1 << 20,
            "G" => 1 << 30,
            "T" => 1 << 40,
            _ => return Err(()),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        let value: u64 = digits.parse().map_err(|_| ())?;
        value.checked_mul(multiplier).map(Self).ok_or(())
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ByteSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawByteSize::deserialize(deserializer)?;
        match raw {
            RawByteSize::Suffixed(text) => {
                text.parse().map_err(|()| serde::de::Error::custom(format!(
                    "invalid rate-limit value {text:?}: expected `[0-9]+[KMGT]`"
                )))
            }
            RawByteSize::Bytes(bytes) => Ok(Self(bytes)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteSize {
    Suffixed(String),
    Bytes(u64),
}

/// Configuration shared by both `blobswarm-seeder` and `blobswarm-proxy`
/// (spec §6's enumerated option table, minus the side-specific fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonConfig {
    /// Root directory holding the `data/` and `torrents/` subdirectories.
    pub root_directory: PathBuf,
    /// Tracker announce-list applied to every torrent this process creates.
    pub trackers: Vec<String>,
    /// Completed-payload byte budget for the single-flight cache.
    #[serde(default = "defaults::limit_size")]
    pub limit_size: ByteSize,
    /// Upload rate limit, burst = 4 MiB.
    #[serde(default = "defaults::upload_rate_limit")]
    pub upload_rate_limit: ByteSize,
    /// Download rate limit, burst = 4 MiB.
    #[serde(default = "defaults::download_rate_limit")]
    pub download_rate_limit: ByteSize,
    /// BitTorrent listen port.
    pub incoming_port: u16,
    /// Deadline for a single producer attempt (origin fetch or swarm join).
    #[serde(default = "defaults::download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// HTTP (proxy) or HTTP/gRPC (seeder) listen port.
    #[serde(default = "defaults::port")]
    pub port: u16,
    /// Enable verbose (debug-level) logging.
    #[serde(default)]
    pub verbose: bool,
}

/// Seeder-side configuration: `CommonConfig` plus the origin registry host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeederConfig {
    /// Fields shared with the proxy side.
    #[serde(flatten)]
    pub common: CommonConfig,
    /// Origin registry host (`host:port`) blobs are fetched from on a miss.
    pub origin: String,
}

/// Proxy-side configuration: `CommonConfig` plus the seeder endpoint list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Fields shared with the seeder side.
    #[serde(flatten)]
    pub common: CommonConfig,
    /// Seeder gRPC endpoints (`host:port`), balanced round-robin.
    pub seeders: Vec<String>,
    /// Optional URL rules a request must also match to be P2P-eligible.
    #[serde(default)]
    pub rules: Vec<String>,
    /// Upstream registry host (`host:port`) every non-eligible request, and
    /// every P2P failure, falls back to. Owned by the reverse-proxy
    /// boundary rather than the core, but required to run the binary.
    pub upstream: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_parses_each_suffix() {
        assert_eq!("1K".parse::<ByteSize>().unwrap().bytes(), 1 << 10);
        assert_eq!("10M".parse::<ByteSize>().unwrap().bytes(), 10 * (1 << 20));
        assert_eq!("10G".parse::<ByteSize>().unwrap().bytes(), 10 * (1 << 30));
        assert_eq!("2T".parse::<ByteSize>().unwrap().bytes(), 2 * (1 << 40));
    }

    #[test]
    fn byte_size_rejects_malformed_input() {
        assert!("10".parse::<ByteSize>().is_err());
        assert!("G".parse::<ByteSize>().is_err());
        assert!("10X".parse::<ByteSize>().is_err());
        assert!("-5M".parse::<ByteSize>().is_err());
        assert!("".parse::<ByteSize>().is_err());
    }

    #[test]
    fn seeder_config_deserializes_with_defaults() {
        let yaml = r"
root_directory: /var/blobswarm
trackers:
  - http://tracker.example/announce
incoming_port: 50017
origin: registry.example:443
";
        let config: SeederConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.common.limit_size.bytes(), 10 * (1 << 30));
        assert_eq!(config.common.download_timeout_secs, 120);
        assert_eq!(config.origin, "registry.example:443");
    }

    #[test]
    fn proxy_config_deserializes_with_explicit_limit_size() {
        let yaml = r"
root_directory: /var/blobswarm
trackers: [http://tracker.example/announce]
incoming_port: 50007
seeders: [seeder-1:7070]
upstream: registry.example:443
limit_size: 5G
";
        let config: ProxyConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.common.limit_size.bytes(), 5 * (1 << 30));
    }
}
