//! `BtEngine`: the public seam both pipelines drive, and the `on_evict`
//! callback registered on the single-flight cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use blobswarm_storage::Storage;

use crate::error::{EngineError, EngineResult};
use crate::metainfo::build_single_file_metainfo;
use crate::session::{SessionHandle, TorrentSession};

/// Binds `BlobId`s to session handles and owns the seed/leech lifecycle
/// described in spec §4.2.
///
/// The id→handle map is guarded by its own lock, independent of the
/// single-flight cache's lock (spec §9 "Ownership of torrent handles"):
/// `BtEngine` never touches the cache, and the cache's `on_evict` hook
/// (wired to [`BtEngine::delete_torrent`]) never blocks on this map for
/// longer than the map's own lock.
#[derive(Clone)]
pub struct BtEngine {
    session: Arc<dyn TorrentSession>,
    storage: Storage,
    handles: Arc<Mutex<HashMap<String, SessionHandle>>>,
    trackers: Arc<Vec<String>>,
}

impl BtEngine {
    /// Construct an adapter over `session`, publishing torrents under
    /// `storage`'s on-disk layout and announcing to `trackers`.
    #[must_use]
    pub fn new(session: Arc<dyn TorrentSession>, storage: Storage, trackers: Vec<String>) -> Self {
        Self {
            session,
            storage,
            handles: Arc::new(Mutex::new(HashMap::new())),
            trackers: Arc::new(trackers),
        }
    }

    /// Seed a blob already fully materialized on disk: build its torrent
    /// file if one doesn't exist yet, add it to the session, and spawn the
    /// background task that waits for the info dictionary before asking
    /// the session to download (a no-op for data we already hold in full).
    ///
    /// Returns the published torrent's bencoded metainfo bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the data or torrent files cannot
    /// be read or written, or [`EngineError::Session`] if the session
    /// rejects the add.
    pub async fn start_seed(&self, blob_id: &str) -> EngineResult<Vec<u8>> {
        let metainfo = match self.storage.read_torrent(blob_id).await {
            Ok(bytes) => bytes,
            Err(blobswarm_storage::StorageError::NotFound { .. }) => {
                let data_path = self.storage.data_path(blob_id);
                let bytes = build_single_file_metainfo(blob_id, &data_path, &self.trackers).await?;
                self.storage
                    .put_torrent(blob_id, &bytes)
                    .await
                    .map_err(|source| EngineError::Storage {
                        blob_id: blob_id.to_string(),
                        source,
                    })?;
                bytes
            }
            Err(source) => {
                return Err(EngineError::Storage {
                    blob_id: blob_id.to_string(),
                    source,
                });
            }
        };

        let data_path = self.storage.data_path(blob_id);
        let handle = self.session.add(blob_id, &metainfo, &data_path).await.map_err(
            |err| annotate(err, blob_id),
        )?;
        self.publish_handle(blob_id, handle);
        self.spawn_info_then_download(blob_id.to_string(), handle);
        info!(blob_id, "seeding torrent");
        Ok(metainfo)
    }

    /// Join the swarm for `metainfo` and block until the blob is fully
    /// downloaded or `deadline` elapses.
    ///
    /// Returns the torrent's total length in bytes on success.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Timeout`] if `deadline` elapses before the
    /// swarm delivers every piece, or [`EngineError::Session`]/
    /// [`EngineError::MetainfoDecode`] for session/decode failures.
    pub async fn start_leecher(&self, blob_id: &str, metainfo: Vec<u8>, deadline: Duration) -> EngineResult<u64> {
        let data_path = self.storage.data_path(blob_id);
        let handle = self
            .session
            .add(blob_id, &metainfo, &data_path)
            .await
            .map_err(|err| annotate(err, blob_id))?;
        self.publish_handle(blob_id, handle);
        self.spawn_info_then_download(blob_id.to_string(), handle);
        info!(blob_id, "leeching torrent");

        self.session
            .wait_completed(handle, deadline)
            .await
            .map_err(|err| annotate(err, blob_id))?;
        Ok(self.session.total_length(handle))
    }

    /// Drop the torrent from the session and asynchronously delete its data
    /// and torrent files. Registered as the cache's `on_evict` callback
    /// (spec §4.2 `DeleteTorrent`); never blocks the caller and never
    /// propagates file-removal errors (they are logged).
    pub fn delete_torrent(&self, blob_id: &str) {
        let handle = self.handles.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(blob_id);
        if let Some(handle) = handle {
            self.session.drop_torrent(handle);
        }

        let storage = self.storage.clone();
        let blob_id = blob_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = storage.delete(&blob_id).await {
                warn!(blob_id, error = %err, "failed to remove evicted blob's files");
            }
        });
    }

    /// Snapshot of currently tracked blob ids, for diagnostics.
    #[must_use]
    pub fn tracked_blob_ids(&self) -> Vec<String> {
        self.handles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn publish_handle(&self, blob_id: &str, handle: SessionHandle) {
        self.handles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(blob_id.to_string(), handle);
    }

    fn spawn_info_then_download(&self, blob_id: String, handle: SessionHandle) {
        let session = self.session.clone();
        tokio::spawn(async move {
            if let Err(err) = session.wait_info_obtained(handle).await {
                warn!(blob_id, error = %err, "failed waiting for torrent info");
                return;
            }
            if let Err(err) = session.request_full_download(handle).await {
                warn!(blob_id, error = %err, "failed requesting full download");
            }
        });
    }
}

fn annotate(err: EngineError, blob_id: &str) -> EngineError {
    match err {
        EngineError::Session { message, .. } => EngineError::Session {
            blob_id: blob_id.to_string(),
            message,
        },
        EngineError::Timeout { .. } => EngineError::Timeout {
            blob_id: blob_id.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::stub::StubSession;

    async fn engine(dir: &std::path::Path) -> BtEngine {
        let storage = Storage::open(dir).await.expect("open storage");
        BtEngine::new(
            Arc::new(StubSession::new()),
            storage,
            vec!["http://tracker.example/announce".to_string()],
        )
    }

    #[tokio::test]
    async fn start_seed_builds_torrent_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = engine(dir.path()).await;
        engine
            .storage
            .put_data("a", b"payload-bytes")
            .await
            .expect("write data");

        let metainfo = engine.start_seed("a").await.expect("start_seed");
        assert!(!metainfo.is_empty());
        assert!(engine.storage.read_torrent("a").await.is_ok());

        let second = engine.start_seed("a").await.expect("start_seed again");
        assert_eq!(metainfo, second, "should reuse the torrent file on disk");
    }

    #[tokio::test]
    async fn start_leecher_returns_total_length_on_completion() {
        let seed_dir = tempfile::tempdir().expect("tempdir");
        let seed_engine = engine(seed_dir.path()).await;
        seed_engine.storage.put_data("b", b"0123456789").await.expect("write");
        let metainfo = seed_engine.start_seed("b").await.expect("seed");

        let leech_dir = tempfile::tempdir().expect("tempdir");
        let leech_engine = engine(leech_dir.path()).await;
        let total = leech_engine
            .start_leecher("b", metainfo, Duration::from_secs(1))
            .await
            .expect("start_leecher");
        assert_eq!(total, 10);
        assert!(leech_engine.storage.stat_data("b").await.is_ok());
    }

    #[tokio::test]
    async fn delete_torrent_removes_files_and_handle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = engine(dir.path()).await;
        engine.storage.put_data("c", b"data").await.expect("write");
        engine.start_seed("c").await.expect("seed");
        assert!(engine.tracked_blob_ids().contains(&"c".to_string()));

        engine.delete_torrent("c");
        // file removal is spawned asynchronously; give it a tick.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!engine.tracked_blob_ids().contains(&"c".to_string()));
        assert!(engine.storage.stat_data("c").await.is_err());
    }
}
