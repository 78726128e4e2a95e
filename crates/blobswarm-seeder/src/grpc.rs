//! The `MetaInfo` gRPC service: on every call, drive the single-flight
//! cache's producer pipeline for the requested blob and return its
//! published torrent metainfo.
//!
//! Grounded on the original seeder's `GetMetaInfo` handler: derive the blob
//! id from the URL's last path segment, run the get-or-produce cycle once
//! per id, then read the torrent file back off disk.

use std::sync::Arc;

use blobswarm_cache::SingleFlightCache;
use blobswarm_proto::meta_info_server::MetaInfo;
use blobswarm_proto::{MetaInfoReply, MetaInfoRequest};
use blobswarm_storage::{Storage, StorageError};
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use crate::pipeline::{self, ProducerContext};

/// Derive the blob id a request's URL maps to: the last path segment,
/// matching the original implementation's `blobUrl[strings.LastIndex(...)+1:]`.
#[must_use]
pub(crate) fn blob_id_for_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Tonic service implementation wiring the single-flight cache to the
/// origin-fetch producer pipeline.
pub(crate) struct MetaInfoService {
    cache: Arc<SingleFlightCache>,
    storage: Storage,
    producer_ctx: ProducerContext,
}

impl MetaInfoService {
    pub(crate) fn new(cache: Arc<SingleFlightCache>, storage: Storage, producer_ctx: ProducerContext) -> Self {
        Self {
            cache,
            storage,
            producer_ctx,
        }
    }
}

#[tonic::async_trait]
impl MetaInfo for MetaInfoService {
    async fn get_meta_info(&self, request: Request<MetaInfoRequest>) -> Result<Response<MetaInfoReply>, Status> {
        let url = request.into_inner().url;
        let blob_id = blob_id_for_url(&url).to_string();
        debug!(blob_id, url, "metainfo requested");

        let ctx = self.producer_ctx.clone();
        let produce_blob_id = blob_id.clone();
        let produce_url = url.clone();
        self.cache
            .resolve(&blob_id, move |entry| {
                pipeline::produce(ctx, produce_blob_id, produce_url, entry)
            })
            .await
            .map_err(|err| {
                warn!(error = %err, "failed to materialize blob for metainfo request");
                Status::internal(err.to_string())
            })?;

        // The cache may report this blob complete while its torrent file is
        // missing from disk (consistency violation, e.g. an out-of-band
        // delete). Self-heal by forgetting the entry so the *next* request
        // re-produces from origin, and surface the stat failure to this caller.
        let metainfo = match self.storage.read_torrent(&blob_id).await {
            Ok(metainfo) => metainfo,
            Err(StorageError::NotFound { .. }) => {
                warn!(blob_id, "cache reported blob complete but its torrent file is missing");
                self.cache.remove(&blob_id);
                return Err(Status::internal(format!(
                    "torrent file for blob {blob_id} is missing, retry the request"
                )));
            }
            Err(err) => {
                warn!(blob_id, error = %err, "failed to read published torrent");
                return Err(Status::internal(err.to_string()));
            }
        };

        Ok(Response::new(MetaInfoReply { metainfo }))
    }
}
