//! The proxy's reverse-proxy entry point (spec.md §4.4, §6): a single
//! catch-all handler that forwards every request upstream unchanged unless
//! it is P2P-eligible, in which case it drives the single-flight cache's
//! leecher pipeline first and only falls back to the upstream on failure.
//!
//! Grounded on this codebase's `axum`/`tower-http` stack: the handler is a
//! plain `axum` route, the upstream fallback is a `reqwest` client request
//! whose response body is streamed straight through, and a P2P hit is
//! served by streaming the locally materialized file with
//! `tokio_util::io::ReaderStream`, exactly mirroring the original's
//! "read the local data path, attach `Content-Disposition`" response.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use blobswarm_cache::SingleFlightCache;
use blobswarm_events::Event;
use blobswarm_storage::{Storage, StorageError};
use blobswarm_telemetry::Metrics;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::eligibility::{self, RuleSet};
use crate::pipeline::{self, LeechContext};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared, cheaply-cloneable dependencies every request handler needs.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) cache: Arc<SingleFlightCache>,
    pub(crate) storage: Storage,
    pub(crate) leech_ctx: LeechContext,
    pub(crate) rules: Arc<RuleSet>,
    pub(crate) upstream: String,
    pub(crate) http_client: reqwest::Client,
    pub(crate) metrics: Metrics,
}

/// Catch-all `axum` handler, registered for every method and path.
pub(crate) async fn handle(State(state): State<AppState>, req: Request<Body>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if !eligibility::is_eligible(&method, &path, &state.rules) {
        return forward_to_upstream(&state, req).await;
    }

    let blob_id = eligibility::blob_id_for_path(&path).to_string();
    match resolve(&state, &blob_id, &path).await {
        Ok(local_path) => serve_local_file(&local_path).await,
        Err(err) => {
            warn!(blob_id, path, error = %err, "P2P path failed, falling back to upstream");
            let _ = state.leech_ctx.events.publish(Event::LeechFellBackToOrigin {
                blob_id,
                reason: err.to_string(),
            });
            state.metrics.inc_fallback_to_origin();
            forward_to_upstream(&state, req).await
        }
    }
}

/// Drive the single-flight cache for `blob_id`, including the disk
/// verification step spec.md §4.1's protocol requires on every HIT
/// ("verify data file exists on disk; if not, `Remove(id)` and report
/// miss-retry") and §7 point 2 ("consistency violation ... `Remove(id)`,
/// return the underlying stat error to the caller").
async fn resolve(state: &AppState, blob_id: &str, path: &str) -> Result<PathBuf, BoxError> {
    let ctx = state.leech_ctx.clone();
    let produce_blob_id = blob_id.to_string();
    let produce_url = path.to_string();
    state
        .cache
        .resolve(blob_id, move |entry| pipeline::leech(ctx, produce_blob_id, produce_url, entry))
        .await?;

    match state.storage.stat_data(blob_id).await {
        Ok(_) => Ok(state.storage.data_path(blob_id)),
        Err(StorageError::NotFound { .. }) => {
            state.cache.remove(blob_id);
            Err(format!("cache reported blob {blob_id} complete but its data file is missing").into())
        }
        Err(source) => Err(Box::new(source)),
    }
}

async fn serve_local_file(path: &Path) -> Response {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "local blob disappeared before it could be served");
            return (StatusCode::INTERNAL_SERVER_ERROR, "blob unavailable").into_response();
        }
    };

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "blob".to_string());
    let body = Body::from_stream(ReaderStream::new(file));

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename={filename}")) {
        headers.insert(HeaderName::from_static("content-disposition"), value);
    }

    (StatusCode::OK, headers, body).into_response()
}

/// Report a point-in-time snapshot of the cache's gauges and counters as
/// JSON, mirroring the original's `/health` endpoint.
pub(crate) async fn health(State(state): State<AppState>) -> Response {
    (StatusCode::OK, axum::Json(state.metrics.snapshot())).into_response()
}

/// Render the Prometheus text exposition format for this process, matching
/// the original's `/metrics` route.
pub(crate) async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
        }
    }
}

/// Forward `req` unchanged to the configured upstream registry, streaming
/// the upstream response body straight back to the client. P2P-ineligible
/// requests and P2P failures both flow through here (spec.md §6: "Ineligible
/// requests and P2P failures fall through to the original upstream").
async fn forward_to_upstream(state: &AppState, req: Request<Body>) -> Response {
    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(axum::http::uri::PathAndQuery::as_str)
        .unwrap_or("/");
    let url = format!("http://{}{}", state.upstream.trim_end_matches('/'), path_and_query);

    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to buffer request body for upstream forwarding");
            return (StatusCode::BAD_GATEWAY, "failed to read request body").into_response();
        }
    };

    let mut upstream_req = state
        .http_client
        .request(parts.method.clone(), &url)
        .body(body_bytes.to_vec());
    for (name, value) in &parts.headers {
        if *name == axum::http::header::HOST {
            continue;
        }
        upstream_req = upstream_req.header(name, value);
    }

    match upstream_req.send().await {
        Ok(response) => {
            let status = response.status();
            let headers = response.headers().clone();
            let stream = response.bytes_stream();
            let mut builder = Response::builder().status(status);
            if let Some(builder_headers) = builder.headers_mut() {
                *builder_headers = headers;
            }
            builder
                .body(Body::from_stream(stream))
                .unwrap_or_else(|_| (StatusCode::BAD_GATEWAY, "malformed upstream response").into_response())
        }
        Err(err) => {
            warn!(url, error = %err, "upstream request failed");
            (StatusCode::BAD_GATEWAY, "upstream request failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc_client::SeederPool;
    use blobswarm_engine::{BtEngine, StubSession};
    use blobswarm_events::EventBus;
    use std::time::Duration;

    async fn state_with_upstream(upstream_addr: &str) -> AppState {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::open(dir.path()).await.expect("storage");
        let engine = BtEngine::new(
            Arc::new(StubSession::new()),
            storage.clone(),
            vec!["http://tracker.example/announce".to_string()],
        );
        AppState {
            cache: Arc::new(SingleFlightCache::new(u64::MAX)),
            storage,
            leech_ctx: LeechContext {
                seeders: SeederPool::new(Vec::new()),
                engine,
                events: EventBus::with_capacity(4),
                metrics: Metrics::new().expect("metrics"),
                download_timeout: Duration::from_millis(200),
            },
            rules: Arc::new(RuleSet::compile(&[]).expect("compile")),
            upstream: upstream_addr.to_string(),
            http_client: reqwest::Client::new(),
            metrics: Metrics::new().expect("metrics"),
        }
    }

    #[tokio::test]
    async fn health_reports_configured_cache_limit() {
        let state = state_with_upstream("unused.example").await;
        state.metrics.set_cache_limit_bytes(1024);

        let response = health(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let snapshot: blobswarm_telemetry::MetricsSnapshot = serde_json::from_slice(&body).expect("json");
        assert_eq!(snapshot.cache_limit_bytes, 1024);
    }

    #[tokio::test]
    async fn ineligible_request_falls_through_to_upstream() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/library/nginx/manifests/latest")
            .with_status(200)
            .with_body("manifest-bytes")
            .create_async()
            .await;

        let state = state_with_upstream(&server.host_with_port()).await;
        let req = Request::builder()
            .method("GET")
            .uri("/v2/library/nginx/manifests/latest")
            .body(Body::empty())
            .expect("request");

        let response = handle(State(state), req).await;
        assert_eq!(response.status(), StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn eligible_request_falls_back_to_upstream_when_no_seeder_is_reachable() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/library/nginx/blobs/sha256:abc")
            .with_status(200)
            .with_body("origin-bytes")
            .create_async()
            .await;

        let state = state_with_upstream(&server.host_with_port()).await;
        let req = Request::builder()
            .method("GET")
            .uri("/v2/library/nginx/blobs/sha256:abc")
            .body(Body::empty())
            .expect("request");

        let response = handle(State(state), req).await;
        assert_eq!(response.status(), StatusCode::OK);
        mock.assert_async().await;
    }
}
