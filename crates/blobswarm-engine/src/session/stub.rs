//! A deterministic, in-memory [`TorrentSession`] double.
//!
//! This is what every test in this workspace runs against (see
//! `SPEC_FULL.md` §4.2): no network, no real swarm, but faithful to the
//! contract `BtEngine` relies on. A torrent whose local file already has
//! the full payload (the seeder's own case, since it writes the file
//! before calling `start_seed`) completes instantly; any other torrent
//! (the leecher's case) is "delivered" by a background task after a
//! configurable delay, which writes the declared payload length worth of
//! zero bytes to the destination path — content is never hash-verified by
//! this workspace (spec §1 Non-goals), so the stub has no need to
//! fabricate anything cleverer.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::error::{EngineError, EngineResult};
use crate::session::{SessionHandle, TorrentSession};

struct StubTorrent {
    total_length: u64,
    completed: Arc<AtomicU64>,
}

/// In-memory double for [`TorrentSession`].
pub struct StubSession {
    torrents: Mutex<HashMap<u64, StubTorrent>>,
    next_id: AtomicU64,
    deliver_delay: Duration,
    stalled: Mutex<std::collections::HashSet<String>>,
}

impl Default for StubSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StubSession {
    /// Construct a stub that delivers leeched payloads with no artificial delay.
    #[must_use]
    pub fn new() -> Self {
        Self::with_deliver_delay(Duration::ZERO)
    }

    /// Construct a stub whose leeched payloads "arrive" after `delay`.
    #[must_use]
    pub fn with_deliver_delay(delay: Duration) -> Self {
        Self {
            torrents: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            deliver_delay: delay,
            stalled: Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Mark `blob_id` so its delivery never completes; used to exercise the
    /// producer timeout path.
    pub fn stall(&self, blob_id: &str) {
        self.stalled.lock().unwrap_or_else(|p| p.into_inner()).insert(blob_id.to_string());
    }

    fn lock_torrents(&self) -> std::sync::MutexGuard<'_, HashMap<u64, StubTorrent>> {
        self.torrents.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl TorrentSession for StubSession {
    async fn add(&self, blob_id: &str, metainfo: &[u8], data_path: &Path) -> EngineResult<SessionHandle> {
        let total_length = crate::metainfo::total_length(blob_id, metainfo)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let already_complete = tokio::fs::metadata(data_path)
            .await
            .map(|meta| meta.len() == total_length)
            .unwrap_or(false);

        let completed = Arc::new(AtomicU64::new(if already_complete { total_length } else { 0 }));
        self.lock_torrents().insert(
            id,
            StubTorrent {
                total_length,
                completed: completed.clone(),
            },
        );

        if !already_complete && !self.stalled.lock().unwrap_or_else(|p| p.into_inner()).contains(blob_id) {
            let delay = self.deliver_delay;
            let data_path = data_path.to_path_buf();
            tokio::spawn(async move {
                sleep(delay).await;
                let payload = vec![0_u8; total_length as usize];
                if tokio::fs::write(&data_path, &payload).await.is_ok() {
                    completed.store(total_length, Ordering::SeqCst);
                }
            });
        }

        Ok(SessionHandle(id))
    }

    async fn wait_info_obtained(&self, _handle: SessionHandle) -> EngineResult<()> {
        Ok(())
    }

    async fn request_full_download(&self, _handle: SessionHandle) -> EngineResult<()> {
        Ok(())
    }

    fn total_length(&self, handle: SessionHandle) -> u64 {
        self.lock_torrents()
            .get(&handle.0)
            .map(|t| t.total_length)
            .unwrap_or(0)
    }

    fn bytes_completed(&self, handle: SessionHandle) -> u64 {
        self.lock_torrents()
            .get(&handle.0)
            .map(|t| t.completed.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    async fn wait_completed(&self, handle: SessionHandle, deadline: Duration) -> EngineResult<()> {
        let poll_interval = Duration::from_millis(5).min(deadline.max(Duration::from_millis(1)));
        let budget = tokio::time::Instant::now() + deadline;
        loop {
            let (total, done) = {
                let torrents = self.lock_torrents();
                match torrents.get(&handle.0) {
                    Some(t) => (t.total_length, t.completed.load(Ordering::SeqCst)),
                    None => {
                        return Err(EngineError::Session {
                            blob_id: String::new(),
                            message: "unknown session handle".to_string(),
                        });
                    }
                }
            };
            if done >= total {
                return Ok(());
            }
            if tokio::time::Instant::now() >= budget {
                return Err(EngineError::Timeout {
                    blob_id: String::new(),
                });
            }
            sleep(poll_interval).await;
        }
    }

    fn drop_torrent(&self, handle: SessionHandle) {
        self.lock_torrents().remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metainfo::build_single_file_metainfo;

    #[tokio::test]
    async fn already_complete_file_is_seedable_instantly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_path = dir.path().join("a.layer");
        tokio::fs::write(&data_path, b"hello").await.expect("write");
        let metainfo = build_single_file_metainfo("a", &data_path, &[]).await.expect("metainfo");

        let session = StubSession::new();
        let handle = session.add("a", &metainfo, &data_path).await.expect("add");
        assert_eq!(session.bytes_completed(handle), session.total_length(handle));
        session.wait_completed(handle, Duration::from_millis(50)).await.expect("completed");
    }

    #[tokio::test]
    async fn leech_delivers_after_delay_and_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let seed_path = dir.path().join("seed.layer");
        tokio::fs::write(&seed_path, b"0123456789").await.expect("write");
        let metainfo = build_single_file_metainfo("x", &seed_path, &[]).await.expect("metainfo");

        let leech_path = dir.path().join("leech.layer");
        let session = StubSession::with_deliver_delay(Duration::from_millis(10));
        let handle = session.add("x", &metainfo, &leech_path).await.expect("add");
        assert_eq!(session.bytes_completed(handle), 0);

        session
            .wait_completed(handle, Duration::from_secs(1))
            .await
            .expect("completed");
        assert!(leech_path.exists());
        assert_eq!(tokio::fs::metadata(&leech_path).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn stalled_blob_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let seed_path = dir.path().join("seed.layer");
        tokio::fs::write(&seed_path, b"0123456789").await.expect("write");
        let metainfo = build_single_file_metainfo("y", &seed_path, &[]).await.expect("metainfo");

        let leech_path = dir.path().join("leech.layer");
        let session = StubSession::new();
        session.stall("y");
        let handle = session.add("y", &metainfo, &leech_path).await.expect("add");

        let err = session
            .wait_completed(handle, Duration::from_millis(20))
            .await
            .expect_err("should time out");
        assert!(matches!(err, EngineError::Timeout { .. }));
    }
}
