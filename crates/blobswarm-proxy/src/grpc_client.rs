//! Round-robin gRPC client pool over the configured seeder endpoints
//! (spec.md §4.4, §6: "client-side round-robin across configured seeder
//! endpoints").
//!
//! Channels are connected lazily (`connect_lazy`, so bootstrap never blocks
//! on a seeder being reachable) and cached per endpoint. A call that fails
//! against one endpoint is retried against the next, cycling at most once
//! around the full endpoint list before giving up.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use blobswarm_proto::MetaInfoRequest;
use blobswarm_proto::meta_info_client::MetaInfoClient;
use tokio::sync::Mutex;
use tonic::transport::{Channel, Endpoint};
use tracing::warn;

/// A pool of lazily-connected gRPC channels, one per configured seeder
/// endpoint, selected round-robin per call.
#[derive(Clone)]
pub(crate) struct SeederPool {
    endpoints: Arc<Vec<String>>,
    clients: Arc<Vec<Mutex<Option<MetaInfoClient<Channel>>>>>,
    cursor: Arc<AtomicUsize>,
}

impl SeederPool {
    /// Build a pool over `endpoints` (`host:port` strings). Does not
    /// connect eagerly.
    pub(crate) fn new(endpoints: Vec<String>) -> Self {
        let clients = endpoints.iter().map(|_| Mutex::new(None)).collect();
        Self {
            endpoints: Arc::new(endpoints),
            clients: Arc::new(clients),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fetch torrent metainfo for `url` from the next endpoint in
    /// round-robin order, retrying the remaining endpoints on failure.
    /// Returns `None` only if every configured endpoint failed.
    pub(crate) async fn get_meta_info(&self, url: &str) -> Option<Vec<u8>> {
        let len = self.endpoints.len();
        if len == 0 {
            return None;
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
        for offset in 0..len {
            let index = (start + offset) % len;
            match self.call(index, url).await {
                Ok(metainfo) => return Some(metainfo),
                Err(err) => {
                    warn!(endpoint = %self.endpoints[index], error = %err, "seeder endpoint failed");
                }
            }
        }
        None
    }

    async fn call(&self, index: usize, url: &str) -> Result<Vec<u8>, tonic::Status> {
        let mut guard = self.clients[index].lock().await;
        if guard.is_none() {
            let endpoint = Endpoint::try_from(format!("http://{}", self.endpoints[index]))
                .map_err(|err| tonic::Status::internal(err.to_string()))?;
            *guard = Some(MetaInfoClient::new(endpoint.connect_lazy()));
        }
        let client = guard.as_mut().expect("client was just constructed above");
        let response = client
            .get_meta_info(MetaInfoRequest {
                url: url.to_string(),
            })
            .await?;
        Ok(response.into_inner().metainfo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_never_connects() {
        let pool = SeederPool::new(Vec::new());
        assert!(pool.endpoints.is_empty());
    }

    #[tokio::test]
    async fn empty_pool_returns_none() {
        let pool = SeederPool::new(Vec::new());
        assert!(pool.get_meta_info("/v2/x/blobs/sha256:a").await.is_none());
    }

    #[test]
    fn cursor_advances_round_robin() {
        let pool = SeederPool::new(vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()]);
        let first = pool.cursor.fetch_add(1, Ordering::Relaxed) % pool.endpoints.len();
        let second = pool.cursor.fetch_add(1, Ordering::Relaxed) % pool.endpoints.len();
        assert_ne!(first, second);
    }
}
