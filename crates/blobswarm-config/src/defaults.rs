//! Default values for optional configuration fields (spec §6).

use crate::model::ByteSize;

/// Default completed-payload byte budget: `10G`.
#[must_use]
pub fn limit_size() -> ByteSize {
    "10G".parse().expect("default limit_size is well-formed")
}

/// Default upload rate limit: `100M`.
#[must_use]
pub fn upload_rate_limit() -> ByteSize {
    "100M".parse().expect("default upload_rate_limit is well-formed")
}

/// Default download rate limit: `100M`.
#[must_use]
pub fn download_rate_limit() -> ByteSize {
    "100M".parse().expect("default download_rate_limit is well-formed")
}

/// Default producer deadline, in seconds.
#[must_use]
pub const fn download_timeout_secs() -> u64 {
    120
}

/// Default HTTP/gRPC listen port.
#[must_use]
pub const fn port() -> u16 {
    7070
}

/// Default BitTorrent listen port on the proxy side.
pub const PROXY_INCOMING_PORT: u16 = 50_007;

/// Default BitTorrent listen port on the seeder side.
pub const SEEDER_INCOMING_PORT: u16 = 50_017;

/// Default config file path when `--config` is not supplied.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Burst allowance applied to both rate limits, per spec §6.
pub const RATE_LIMIT_BURST_BYTES: u64 = 4 * 1024 * 1024;
