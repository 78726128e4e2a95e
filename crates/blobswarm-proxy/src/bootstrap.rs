//! Proxy boot sequence: load configuration, open storage, build the BT
//! engine adapter and single-flight cache, warm-start from whatever blobs
//! are already materialized on disk, and serve the reverse-proxy handler.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use blobswarm_cache::SingleFlightCache;
use blobswarm_config::{ProxyArgs, ProxyConfig};
use blobswarm_engine::{BtEngine, StubSession};
use blobswarm_events::EventBus;
use blobswarm_storage::Storage;
use blobswarm_telemetry::{LoggingConfig, Metrics};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::eligibility::RuleSet;
use crate::error::{ProxyError, ProxyResult};
use crate::grpc_client::SeederPool;
use crate::handler::{self, AppState};
use crate::pipeline::LeechContext;

/// Dependencies required to bootstrap the proxy daemon.
pub(crate) struct Dependencies {
    config: ProxyConfig,
    storage: Storage,
    engine: BtEngine,
    cache: Arc<SingleFlightCache>,
    events: EventBus,
    metrics: Metrics,
}

impl Dependencies {
    async fn from_env() -> ProxyResult<Self> {
        let args = ProxyArgs::parse();
        let config = blobswarm_config::load_proxy(&args).map_err(|err| ProxyError::config("load_proxy", err))?;

        let storage = Storage::open(&config.common.root_directory)
            .await
            .map_err(|err| ProxyError::storage("storage.open", err))?;

        let session = Arc::new(StubSession::new());
        let engine = BtEngine::new(session, storage.clone(), config.common.trackers.clone());

        let events = EventBus::new();
        let metrics = Metrics::new().map_err(|err| ProxyError::telemetry("metrics.new", err.into()))?;
        metrics.set_cache_limit_bytes(i64::try_from(config.common.limit_size.bytes()).unwrap_or(i64::MAX));

        let cache_engine = engine.clone();
        let cache_metrics = metrics.clone();
        let cache = Arc::new(SingleFlightCache::with_evict_hook(
            config.common.limit_size.bytes(),
            Some(Arc::new(move |blob_id: &str| {
                cache_engine.delete_torrent(blob_id);
                cache_metrics.inc_cache_eviction();
            })),
        ));

        Ok(Self {
            config,
            storage,
            engine,
            cache,
            events,
            metrics,
        })
    }
}

/// Entry point for the proxy binary. Blocks until the HTTP server shuts down.
///
/// # Errors
///
/// Returns an error if configuration loading, telemetry, storage, or the
/// HTTP server fails.
pub async fn run() -> anyhow::Result<()> {
    let dependencies = Dependencies::from_env().await?;
    run_with(dependencies).await.map_err(Into::into)
}

async fn run_with(dependencies: Dependencies) -> ProxyResult<()> {
    let logging = LoggingConfig {
        level: if dependencies.config.common.verbose { "debug" } else { "info" },
        ..LoggingConfig::default()
    };
    let _ = blobswarm_telemetry::init_logging(&logging);

    info!("blobswarm-proxy starting");

    warm_start(&dependencies).await;
    spawn_output_ticker(dependencies.cache.clone(), dependencies.metrics.clone());

    let rules = RuleSet::compile(&dependencies.config.rules).map_err(|(rule, source)| {
        warn!(rule, error = %source, "invalid configured URL rule");
        ProxyError::InvalidAddr { value: rule }
    })?;

    let state = AppState {
        cache: dependencies.cache,
        storage: dependencies.storage,
        leech_ctx: LeechContext {
            seeders: SeederPool::new(dependencies.config.seeders.clone()),
            engine: dependencies.engine,
            events: dependencies.events,
            metrics: dependencies.metrics.clone(),
            download_timeout: Duration::from_secs(dependencies.config.common.download_timeout_secs),
        },
        rules: Arc::new(rules),
        upstream: dependencies.config.upstream.clone(),
        http_client: reqwest::Client::new(),
        metrics: dependencies.metrics.clone(),
    };

    let app = Router::new()
        .route("/health", axum::routing::get(handler::health))
        .route("/metrics", axum::routing::get(handler::metrics))
        .fallback(handler::handle)
        .with_state(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", dependencies.config.common.port)
        .parse()
        .map_err(|_| ProxyError::InvalidAddr {
            value: dependencies.config.common.port.to_string(),
        })?;

    info!(addr = %addr, "serving reverse-proxy HTTP surface");
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ProxyError::Http { operation: "bind", source })?;
    axum::serve(listener, app)
        .await
        .map_err(|source| ProxyError::Http { operation: "serve", source })?;

    Ok(())
}

/// Re-seed every blob already materialized on disk, mirroring the seeder's
/// boot-time directory scan over `data/*.layer` (spec.md §3 "Warm start"
/// applies identically on the proxy side: a blob leeched to completion in a
/// prior run is already a valid local seed on restart).
async fn warm_start(dependencies: &Dependencies) {
    let blob_ids = match dependencies.storage.list_data_blob_ids().await {
        Ok(ids) => ids,
        Err(err) => {
            warn!(error = %err, "failed to list data directory during warm start");
            return;
        }
    };

    for blob_id in blob_ids {
        let size = match dependencies.storage.stat_data(&blob_id).await {
            Ok(size) => size,
            Err(err) => {
                warn!(blob_id, error = %err, "failed to stat blob during warm start");
                continue;
            }
        };
        // Claim the single-flight producer slot before touching the engine,
        // exactly like any other producer, so a request for this blob
        // arriving mid-warm-start waits on this entry instead of racing a
        // second producer for the same id (spec.md §9 "Warm-start race").
        let (_, created) = dependencies.cache.create_if_not_exists(&blob_id);
        if !created {
            info!(blob_id, "skipping warm start: already claimed by a concurrent request");
            continue;
        }
        if let Err(err) = dependencies.engine.start_seed(&blob_id).await {
            warn!(blob_id, error = %err, "failed to start seeding during warm start");
            dependencies.cache.remove(&blob_id);
            continue;
        }
        dependencies.cache.set_complete(&blob_id, size);
        info!(blob_id, size, "warm-started blob");
    }
}

/// Periodic diagnostic dump of the cache's tracked entries, mirroring the
/// seeder's `lruCache.Output()` ticker, and the refresh point for the
/// cache-size gauges `/metrics` reports.
fn spawn_output_ticker(cache: Arc<SingleFlightCache>, metrics: Metrics) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(120));
        loop {
            interval.tick().await;
            let snapshot = cache.output();
            let size_bytes: u64 = snapshot.iter().filter(|entry| entry.completed).map(|entry| entry.size).sum();
            metrics.set_cache_entries(i64::try_from(snapshot.len()).unwrap_or(i64::MAX));
            metrics.set_cache_size_bytes(i64::try_from(size_bytes).unwrap_or(i64::MAX));
            info!(entries = snapshot.len(), "cache.output");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobswarm_test_support::TempRootStorage;

    #[tokio::test]
    async fn warm_start_seeds_existing_blobs_and_marks_them_complete() {
        let temp = TempRootStorage::new().await;
        temp.storage.put_data("abc", b"already-on-disk").await.expect("put");

        let session = Arc::new(StubSession::new());
        let engine = BtEngine::new(session, temp.storage.clone(), vec!["http://tracker.example/announce".to_string()]);
        let cache = Arc::new(SingleFlightCache::new(u64::MAX));

        let dependencies = Dependencies {
            config: sample_config(),
            storage: temp.storage.clone(),
            engine,
            cache: cache.clone(),
            events: EventBus::with_capacity(4),
            metrics: Metrics::new().expect("metrics"),
        };

        warm_start(&dependencies).await;

        let entry = cache.get("abc").expect("entry present after warm start");
        assert!(entry.is_completed());
        assert_eq!(entry.size(), 16);
    }

    fn sample_config() -> ProxyConfig {
        blobswarm_config::ProxyConfig {
            common: blobswarm_config::CommonConfig {
                root_directory: "/tmp/blobswarm".into(),
                trackers: vec!["http://tracker.example/announce".to_string()],
                limit_size: "10G".parse().expect("byte size"),
                upload_rate_limit: "100M".parse().expect("byte size"),
                download_rate_limit: "100M".parse().expect("byte size"),
                incoming_port: 50_007,
                download_timeout_secs: 120,
                port: 7070,
                verbose: false,
            },
            seeders: vec!["seeder-1:7070".to_string()],
            rules: Vec::new(),
            upstream: "registry.example:443".to_string(),
        }
    }
}
