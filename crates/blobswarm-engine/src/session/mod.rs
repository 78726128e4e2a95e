//! The opaque BitTorrent engine boundary.
//!
//! Spec §1 names this out of scope: "we assume an opaque engine that can
//! add a metainfo, expose total length and bytes completed, drop a
//! torrent, and signal 'info obtained'." [`TorrentSession`] is exactly that
//! boundary, so [`crate::BtEngine`] never has to know whether it's talking
//! to a real swarm or a deterministic double.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::EngineResult;

#[cfg(feature = "native")]
pub mod native;
pub mod stub;

/// Opaque per-torrent token returned by [`TorrentSession::add`]. Carries no
/// meaning outside the session that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub(crate) u64);

/// The engine boundary the adapter drives. One call per blob: `add`
/// publishes a handle, `wait_info_obtained` resolves once the engine has
/// the piece layout (already true immediately for a from-disk seed),
/// `request_full_download` asks for every piece (idempotent for a seed that
/// already has them all — spec §4.2), and `wait_completed` blocks until
/// `bytes_completed >= total_length` or the deadline passes.
#[async_trait]
pub trait TorrentSession: Send + Sync {
    /// Add `metainfo` to the session, pointed at `data_path` as the local
    /// file backing this torrent's single piece-file. For a producer this
    /// file is already fully present on disk; for a leecher it is the
    /// destination the swarm writes into.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Session`] if the session rejects the add.
    async fn add(&self, blob_id: &str, metainfo: &[u8], data_path: &Path) -> EngineResult<SessionHandle>;

    /// Block until the engine has obtained the torrent's info dictionary.
    /// Already-locally-available torrents (a seed added from a `.torrent`
    /// built off disk) resolve immediately.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Session`] if the handle is unknown to the session.
    async fn wait_info_obtained(&self, handle: SessionHandle) -> EngineResult<()>;

    /// Request every piece be downloaded. Idempotent: calling this on a
    /// torrent that already has all pieces (the seeder's own case) is a
    /// no-op, which is how the engine's invariants are satisfied per spec
    /// §4.2.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Session`] if the handle is unknown to the session.
    async fn request_full_download(&self, handle: SessionHandle) -> EngineResult<()>;

    /// Total length of the torrent's payload, in bytes.
    fn total_length(&self, handle: SessionHandle) -> u64;

    /// Bytes downloaded so far; monotonically non-decreasing.
    fn bytes_completed(&self, handle: SessionHandle) -> u64;

    /// Block until `bytes_completed >= total_length`, or return
    /// [`crate::EngineError::Timeout`] if `deadline` elapses first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Timeout`] on deadline expiry, or
    /// [`crate::EngineError::Session`] if the handle is unknown.
    async fn wait_completed(&self, handle: SessionHandle, deadline: Duration) -> EngineResult<()>;

    /// Drop the torrent from the session. Never fails from the adapter's
    /// point of view — an unknown handle is simply a no-op.
    fn drop_torrent(&self, handle: SessionHandle);
}
