//! The proxy's leecher pipeline: on a cache miss, fetch torrent metainfo
//! from a seeder over gRPC, join the swarm, and block until the blob is
//! fully downloaded (spec.md §4.4).
//!
//! Mirrors the producer half of the original proxy's `RoundTrip`: gRPC
//! metainfo fetch, decode total length, `StartLeecher`, wait for
//! completion. The `tokio::time::timeout` wrapper stands in for the
//! original's context-with-deadline plumbing, matching how the seeder's
//! producer pipeline applies `download_timeout_secs`.

use std::sync::Arc;
use std::time::Duration;

use blobswarm_cache::CacheEntry;
use blobswarm_engine::{BtEngine, metainfo};
use blobswarm_events::{Event, EventBus};
use blobswarm_telemetry::Metrics;
use tracing::{info, instrument, warn};

use crate::error::ProxyError;
use crate::grpc_client::SeederPool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Dependencies the leecher closure needs, bundled so `bootstrap` can hand
/// one clone per request without threading parameters through.
#[derive(Clone)]
pub(crate) struct LeechContext {
    pub(crate) seeders: SeederPool,
    pub(crate) engine: BtEngine,
    pub(crate) events: EventBus,
    pub(crate) metrics: Metrics,
    pub(crate) download_timeout: Duration,
}

/// Materialize `blob_id` by fetching its metainfo from a seeder, joining
/// the swarm, and blocking until the blob is fully downloaded. Returns the
/// payload size in bytes on success, for
/// [`blobswarm_cache::SingleFlightCache::resolve`].
///
/// # Errors
///
/// Returns a boxed error if every seeder endpoint fails, the metainfo
/// cannot be decoded, the swarm join fails, or the deadline elapses.
#[instrument(skip(ctx, _entry))]
pub(crate) async fn leech(
    ctx: LeechContext,
    blob_id: String,
    origin_relative_url: String,
    _entry: Arc<CacheEntry>,
) -> Result<u64, BoxError> {
    ctx.metrics.inc_cache_miss();
    let _ = ctx.events.publish(Event::LeechStarted {
        blob_id: blob_id.clone(),
    });

    let result = tokio::time::timeout(
        ctx.download_timeout,
        join_swarm(&ctx, &blob_id, &origin_relative_url),
    )
    .await;

    match result {
        Ok(Ok(size)) => {
            let _ = ctx.events.publish(Event::LeechCompleted {
                blob_id: blob_id.clone(),
                size_bytes: size,
            });
            ctx.metrics.inc_pipeline_outcome("leech", "completed");
            info!(blob_id, size, "leeched blob through swarm");
            Ok(size)
        }
        Ok(Err(err)) => {
            ctx.metrics.inc_pipeline_outcome("leech", "failed");
            warn!(blob_id, error = %err, "leecher failed");
            Err(err)
        }
        Err(_elapsed) => {
            ctx.metrics.inc_pipeline_outcome("leech", "timed_out");
            warn!(blob_id, timeout_secs = ctx.download_timeout.as_secs(), "leecher timed out");
            Err(format!("leecher timed out materializing blob {blob_id}").into())
        }
    }
}

async fn join_swarm(ctx: &LeechContext, blob_id: &str, origin_relative_url: &str) -> Result<u64, BoxError> {
    let metainfo_bytes = ctx
        .seeders
        .get_meta_info(origin_relative_url)
        .await
        .ok_or_else(|| {
            Box::new(ProxyError::MetaInfoUnavailable {
                blob_id: blob_id.to_string(),
            }) as BoxError
        })?;

    // Decode eagerly so a malformed metainfo is reported before we ever
    // touch the swarm, matching the original's decode-then-join ordering.
    metainfo::total_length(blob_id, &metainfo_bytes)?;

    let total = ctx
        .engine
        .start_leecher(blob_id, metainfo_bytes, ctx.download_timeout)
        .await?;
    Ok(total)
}
