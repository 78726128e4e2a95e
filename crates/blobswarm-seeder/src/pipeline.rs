//! The seeder's producer pipeline: on a cache miss, fetch the blob from the
//! origin registry, materialize it on disk, and start seeding it.
//!
//! Mirrors `getMetaData`/`getMetaDataSync` from the original seeder: fetch
//! origin bytes, write the data file, then hand the blob to the BT engine.
//! The `tokio::time::timeout` wrapper stands in for the original's
//! `select!`-over-a-timer race between the fetch goroutine and the
//! configured deadline.

use std::sync::Arc;
use std::time::Duration;

use blobswarm_cache::CacheEntry;
use blobswarm_engine::BtEngine;
use blobswarm_events::{Event, EventBus};
use blobswarm_storage::Storage;
use blobswarm_telemetry::Metrics;
use tracing::{info, instrument, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Dependencies the producer closure needs, bundled so `bootstrap` can hand
/// one clone per request without threading five parameters through.
#[derive(Clone)]
pub(crate) struct ProducerContext {
    pub(crate) http_client: reqwest::Client,
    pub(crate) origin: String,
    pub(crate) storage: Storage,
    pub(crate) engine: BtEngine,
    pub(crate) events: EventBus,
    pub(crate) metrics: Metrics,
    pub(crate) download_timeout: Duration,
}

/// Materialize `blob_id` by fetching `origin_relative_url` from the origin
/// registry, writing it to storage, and starting to seed it. Returns the
/// payload size in bytes on success, for [`blobswarm_cache::SingleFlightCache::resolve`].
///
/// # Errors
///
/// Returns a boxed error if the origin request fails, returns a non-success
/// status, storage write fails, seeding fails, or the deadline elapses.
#[instrument(skip(ctx, _entry))]
pub(crate) async fn produce(
    ctx: ProducerContext,
    blob_id: String,
    origin_relative_url: String,
    _entry: Arc<CacheEntry>,
) -> Result<u64, BoxError> {
    ctx.metrics.inc_cache_miss();
    let _ = ctx.events.publish(Event::SeedStarted {
        blob_id: blob_id.clone(),
    });

    let result = tokio::time::timeout(
        ctx.download_timeout,
        fetch_and_seed(&ctx, &blob_id, &origin_relative_url),
    )
    .await;

    match result {
        Ok(Ok(size)) => {
            let _ = ctx.events.publish(Event::SeedCompleted {
                blob_id: blob_id.clone(),
                size_bytes: size,
            });
            ctx.metrics.inc_pipeline_outcome("seed", "completed");
            info!(blob_id, size, "seeded blob from origin");
            Ok(size)
        }
        Ok(Err(err)) => {
            ctx.metrics.inc_pipeline_outcome("seed", "failed");
            warn!(blob_id, error = %err, "producer failed");
            Err(err)
        }
        Err(_elapsed) => {
            ctx.metrics.inc_pipeline_outcome("seed", "timed_out");
            warn!(blob_id, timeout_secs = ctx.download_timeout.as_secs(), "producer timed out");
            Err(format!("producer timed out materializing blob {blob_id}").into())
        }
    }
}

async fn fetch_and_seed(ctx: &ProducerContext, blob_id: &str, origin_relative_url: &str) -> Result<u64, BoxError> {
    let url = format!(
        "http://{}{}",
        ctx.origin.trim_end_matches('/'),
        origin_relative_url
    );
    let response = ctx.http_client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(format!("origin returned status {} for {blob_id}", response.status()).into());
    }
    let bytes = response.bytes().await?;

    let written = ctx.storage.put_data(blob_id, &bytes).await?;
    ctx.engine.start_seed(blob_id).await?;
    Ok(written)
}
