//! Event payload types carried across the platform.

use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier assigned to each event emitted by the platform.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed domain events surfaced by the cache and the two pipelines.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A waiter attached to an in-flight or newly-created cache entry.
    CacheMiss {
        /// Blob identifier that was requested.
        blob_id: String,
    },
    /// A cache entry was fully materialized and marked complete.
    CacheCompleted {
        /// Blob identifier that completed.
        blob_id: String,
        /// Final size in bytes.
        size_bytes: u64,
    },
    /// A cache entry was evicted to satisfy the size budget.
    CacheEvicted {
        /// Blob identifier that was evicted.
        blob_id: String,
    },
    /// A cache entry was abandoned because its producer failed.
    CacheAbandoned {
        /// Blob identifier whose producer failed.
        blob_id: String,
        /// Human-readable failure detail.
        message: String,
    },
    /// The seeder started materializing a blob from the origin.
    SeedStarted {
        /// Blob identifier being seeded.
        blob_id: String,
    },
    /// The seeder finished publishing a torrent for a blob.
    SeedCompleted {
        /// Blob identifier that finished seeding setup.
        blob_id: String,
        /// Size of the published torrent's payload in bytes.
        size_bytes: u64,
    },
    /// The proxy started leeching a blob through the swarm.
    LeechStarted {
        /// Blob identifier being leeched.
        blob_id: String,
    },
    /// The proxy finished downloading a blob through the swarm.
    LeechCompleted {
        /// Blob identifier that finished downloading.
        blob_id: String,
        /// Size of the downloaded blob in bytes.
        size_bytes: u64,
    },
    /// The proxy fell back to the origin upstream for a blob request.
    LeechFellBackToOrigin {
        /// Blob identifier that fell back.
        blob_id: String,
        /// Reason the swarm path was abandoned.
        reason: String,
    },
    /// System health status changed (degraded or restored components).
    HealthChanged {
        /// Components currently considered degraded.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator used in log fields and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CacheMiss { .. } => "cache_miss",
            Self::CacheCompleted { .. } => "cache_completed",
            Self::CacheEvicted { .. } => "cache_evicted",
            Self::CacheAbandoned { .. } => "cache_abandoned",
            Self::SeedStarted { .. } => "seed_started",
            Self::SeedCompleted { .. } => "seed_completed",
            Self::LeechStarted { .. } => "leech_started",
            Self::LeechCompleted { .. } => "leech_completed",
            Self::LeechFellBackToOrigin { .. } => "leech_fell_back_to_origin",
            Self::HealthChanged { .. } => "health_changed",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp (Unix seconds, to keep this crate free of a calendar
/// dependency the rest of the workspace has no other use for).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Unix timestamp (seconds) recording when the envelope was produced.
    pub timestamp_secs: u64,
    /// Wrapped event payload.
    pub event: Event,
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_maps_cache_variants() {
        assert_eq!(
            Event::CacheMiss {
                blob_id: "abc".into()
            }
            .kind(),
            "cache_miss"
        );
        assert_eq!(
            Event::CacheCompleted {
                blob_id: "abc".into(),
                size_bytes: 10
            }
            .kind(),
            "cache_completed"
        );
        assert_eq!(
            Event::CacheEvicted {
                blob_id: "abc".into()
            }
            .kind(),
            "cache_evicted"
        );
        assert_eq!(
            Event::CacheAbandoned {
                blob_id: "abc".into(),
                message: "timeout".into()
            }
            .kind(),
            "cache_abandoned"
        );
    }

    #[test]
    fn event_kind_maps_pipeline_variants() {
        assert_eq!(
            Event::SeedStarted {
                blob_id: "abc".into()
            }
            .kind(),
            "seed_started"
        );
        assert_eq!(
            Event::SeedCompleted {
                blob_id: "abc".into(),
                size_bytes: 1
            }
            .kind(),
            "seed_completed"
        );
        assert_eq!(
            Event::LeechStarted {
                blob_id: "abc".into()
            }
            .kind(),
            "leech_started"
        );
        assert_eq!(
            Event::LeechCompleted {
                blob_id: "abc".into(),
                size_bytes: 1
            }
            .kind(),
            "leech_completed"
        );
        assert_eq!(
            Event::LeechFellBackToOrigin {
                blob_id: "abc".into(),
                reason: "timeout".into()
            }
            .kind(),
            "leech_fell_back_to_origin"
        );
        assert_eq!(
            Event::HealthChanged {
                degraded: vec!["engine".into()]
            }
            .kind(),
            "health_changed"
        );
    }
}
