//! Embedded-BitTorrent-backed [`TorrentSession`], gated behind the `native`
//! feature.
//!
//! Off by default: this workspace's test suite runs entirely against
//! [`super::stub::StubSession`] (see `SPEC_FULL.md` §4.2). This backend
//! exists so a real deployment can swap it in; it is grounded on this
//! corpus's own librqbit usage (`librqbit::Session::new_with_opts`,
//! `add_torrent`, `ManagedTorrent::stats`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use librqbit::{AddTorrent, AddTorrentOptions, ManagedTorrentHandle, Session, SessionOptions};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::{EngineError, EngineResult};
use crate::session::{SessionHandle, TorrentSession};

/// [`TorrentSession`] backed by an embedded `librqbit` session.
pub struct NativeSession {
    session: Arc<Session>,
    handles: Mutex<HashMap<u64, ManagedTorrentHandle>>,
    next_id: AtomicU64,
}

impl NativeSession {
    /// Start a librqbit session rooted at `output_dir`, listening for peer
    /// connections on `listen_port`.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded session cannot be initialized.
    pub async fn new(output_dir: impl Into<PathBuf>, listen_port: u16) -> EngineResult<Self> {
        let mut opts = SessionOptions::default();
        opts.listen_port_range = Some(listen_port..(listen_port + 1));
        let session = Session::new_with_opts(output_dir.into(), opts)
            .await
            .map_err(|err| EngineError::Session {
                blob_id: String::new(),
                message: format!("starting librqbit session: {err}"),
            })?;
        Ok(Self {
            session,
            handles: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl TorrentSession for NativeSession {
    async fn add(&self, blob_id: &str, metainfo: &[u8], _data_path: &Path) -> EngineResult<SessionHandle> {
        let response = self
            .session
            .add_torrent(AddTorrent::from_bytes(metainfo.to_vec()), Some(AddTorrentOptions::default()))
            .await
            .map_err(|err| EngineError::Session {
                blob_id: blob_id.to_string(),
                message: format!("add_torrent failed: {err}"),
            })?;

        let handle = response.into_handle().ok_or_else(|| EngineError::Session {
            blob_id: blob_id.to_string(),
            message: "add_torrent did not return a managed handle".to_string(),
        })?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handles.lock().await.insert(id, handle);
        Ok(SessionHandle(id))
    }

    async fn wait_info_obtained(&self, handle: SessionHandle) -> EngineResult<()> {
        let managed = self.handle_for(handle).await?;
        managed.wait_until_initialized().await.map_err(|err| EngineError::Session {
            blob_id: String::new(),
            message: format!("wait_until_initialized failed: {err}"),
        })
    }

    async fn request_full_download(&self, _handle: SessionHandle) -> EngineResult<()> {
        // librqbit torrents default to downloading every file once the
        // session has the info dictionary; nothing further is required.
        Ok(())
    }

    fn total_length(&self, handle: SessionHandle) -> u64 {
        self.try_stats(handle).map(|s| s.total_bytes).unwrap_or(0)
    }

    fn bytes_completed(&self, handle: SessionHandle) -> u64 {
        self.try_stats(handle).map(|s| s.progress_bytes).unwrap_or(0)
    }

    async fn wait_completed(&self, handle: SessionHandle, deadline: Duration) -> EngineResult<()> {
        let budget = tokio::time::Instant::now() + deadline;
        loop {
            let stats = self.try_stats(handle).ok_or_else(|| EngineError::Session {
                blob_id: String::new(),
                message: "unknown session handle".to_string(),
            })?;
            if stats.total_bytes > 0 && stats.progress_bytes >= stats.total_bytes {
                return Ok(());
            }
            if tokio::time::Instant::now() >= budget {
                return Err(EngineError::Timeout {
                    blob_id: String::new(),
                });
            }
            sleep(Duration::from_millis(200)).await;
        }
    }

    fn drop_torrent(&self, handle: SessionHandle) {
        if let Ok(mut handles) = self.handles.try_lock() {
            if let Some(managed) = handles.remove(&handle.0) {
                let _ = self.session.delete(managed.id(), true);
            }
        }
    }
}

impl NativeSession {
    async fn handle_for(&self, handle: SessionHandle) -> EngineResult<ManagedTorrentHandle> {
        self.handles
            .lock()
            .await
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| EngineError::Session {
                blob_id: String::new(),
                message: "unknown session handle".to_string(),
            })
    }

    fn try_stats(&self, handle: SessionHandle) -> Option<librqbit::TorrentStats> {
        self.handles
            .try_lock()
            .ok()
            .and_then(|handles| handles.get(&handle.0).cloned())
            .map(|managed| managed.stats())
    }
}
