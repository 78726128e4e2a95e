//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! Tracks the gauges and counters the single-flight cache and its two
//! pipelines surface: entry/size accounting for the LRU budget, eviction
//! counts, and per-pipeline outcome counters.

use std::convert::TryFrom;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared across `blobswarm-seeder` and
/// `blobswarm-proxy`.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    cache_entries: IntGauge,
    cache_size_bytes: IntGauge,
    cache_limit_bytes: IntGauge,
    cache_evictions_total: IntCounter,
    cache_misses_total: IntCounter,
    pipeline_outcomes_total: IntCounterVec,
    fallback_to_origin_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Current number of tracked cache entries (any state).
    pub cache_entries: i64,
    /// Sum of completed entry sizes currently counted against the budget.
    pub cache_size_bytes: i64,
    /// Configured byte budget (`limit_size`).
    pub cache_limit_bytes: i64,
    /// Total LRU evictions performed so far.
    pub cache_evictions_total: u64,
    /// Total cache misses that triggered a new producer.
    pub cache_misses_total: u64,
    /// Total times a request fell back to the origin after a P2P failure.
    pub fallback_to_origin_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let cache_entries =
            IntGauge::with_opts(Opts::new("cache_entries", "Tracked cache entries"))?;
        let cache_size_bytes = IntGauge::with_opts(Opts::new(
            "cache_size_bytes",
            "Sum of completed entry sizes counted against the LRU budget",
        ))?;
        let cache_limit_bytes =
            IntGauge::with_opts(Opts::new("cache_limit_bytes", "Configured cache byte budget"))?;
        let cache_evictions_total = IntCounter::with_opts(Opts::new(
            "cache_evictions_total",
            "LRU evictions performed",
        ))?;
        let cache_misses_total = IntCounter::with_opts(Opts::new(
            "cache_misses_total",
            "Cache misses that started a new producer",
        ))?;
        let pipeline_outcomes_total = IntCounterVec::new(
            Opts::new(
                "pipeline_outcomes_total",
                "Producer pipeline completions by outcome",
            ),
            &["pipeline", "outcome"],
        )?;
        let fallback_to_origin_total = IntCounter::with_opts(Opts::new(
            "fallback_to_origin_total",
            "Requests that fell back to the origin after a P2P failure",
        ))?;

        registry.register(Box::new(cache_entries.clone()))?;
        registry.register(Box::new(cache_size_bytes.clone()))?;
        registry.register(Box::new(cache_limit_bytes.clone()))?;
        registry.register(Box::new(cache_evictions_total.clone()))?;
        registry.register(Box::new(cache_misses_total.clone()))?;
        registry.register(Box::new(pipeline_outcomes_total.clone()))?;
        registry.register(Box::new(fallback_to_origin_total.clone()))?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                cache_entries,
                cache_size_bytes,
                cache_limit_bytes,
                cache_evictions_total,
                cache_misses_total,
                pipeline_outcomes_total,
                fallback_to_origin_total,
            }),
        })
    }

    /// Set the tracked-entry gauge.
    pub fn set_cache_entries(&self, count: i64) {
        self.inner.cache_entries.set(count);
    }

    /// Set the completed-size gauge.
    pub fn set_cache_size_bytes(&self, bytes: i64) {
        self.inner.cache_size_bytes.set(bytes);
    }

    /// Set the configured byte-budget gauge (recorded once at startup).
    pub fn set_cache_limit_bytes(&self, bytes: i64) {
        self.inner.cache_limit_bytes.set(bytes);
    }

    /// Increment the counter of entries removed from the cache, whether by
    /// LRU eviction over budget or an explicit `remove` (self-heal, a
    /// failed producer being abandoned).
    pub fn inc_cache_eviction(&self) {
        self.inner.cache_evictions_total.inc();
    }

    /// Increment the cache-miss counter.
    pub fn inc_cache_miss(&self) {
        self.inner.cache_misses_total.inc();
    }

    /// Record a producer pipeline outcome (`pipeline` is `"seed"` or
    /// `"leech"`; `outcome` is `"completed"`, `"failed"`, or `"timed_out"`).
    pub fn inc_pipeline_outcome(&self, pipeline: &str, outcome: &str) {
        self.inner
            .pipeline_outcomes_total
            .with_label_values(&[pipeline, outcome])
            .inc();
    }

    /// Increment the origin-fallback counter.
    pub fn inc_fallback_to_origin(&self) {
        self.inner.fallback_to_origin_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_entries: self.inner.cache_entries.get(),
            cache_size_bytes: self.inner.cache_size_bytes.get(),
            cache_limit_bytes: self.inner.cache_limit_bytes.get(),
            cache_evictions_total: self.inner.cache_evictions_total.get(),
            cache_misses_total: self.inner.cache_misses_total.get(),
            fallback_to_origin_total: self.inner.fallback_to_origin_total.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.set_cache_entries(3);
        metrics.set_cache_size_bytes(4_096);
        metrics.set_cache_limit_bytes(10 * (1 << 30));
        metrics.inc_cache_eviction();
        metrics.inc_cache_miss();
        metrics.inc_pipeline_outcome("seed", "completed");
        metrics.inc_fallback_to_origin();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_entries, 3);
        assert_eq!(snapshot.cache_size_bytes, 4_096);
        assert_eq!(snapshot.cache_evictions_total, 1);
        assert_eq!(snapshot.cache_misses_total, 1);
        assert_eq!(snapshot.fallback_to_origin_total, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("cache_entries"));
        assert!(rendered.contains("pipeline_outcomes_total"));
        Ok(())
    }
}
