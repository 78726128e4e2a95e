//! Core cache domain types: the entry record and its completion signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::broadcast;

/// The encoded form of a content digest (the hex body after `sha256:`).
/// Stable, opaque key used everywhere the cache is addressed.
pub type BlobId = String;

const DONE_CHANNEL_CAPACITY: usize = 1;

/// Single-fire wakeup channel shared by every waiter on a `CacheEntry`.
///
/// Closed exactly once, on either completion or abandonment. Waiters must
/// re-read entry state after waking rather than trust the wake reason, since
/// a lagged or stale receive can race a second publish on busy entries.
pub(crate) struct DoneSignal {
    sender: broadcast::Sender<()>,
}

impl DoneSignal {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(DONE_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub(crate) fn fire(&self) {
        let _ = self.sender.send(());
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }
}

/// Per-`BlobId` record held inside the cache.
///
/// Invariants:
/// 1. `completed` only ever transitions `false -> true`, never back.
/// 2. `size` is `0` while not completed and is set exactly once, at the same
///    time `completed` flips to `true`.
/// 3. `done` fires exactly once per entry lifetime, on completion or on
///    abandonment (producer failure), whichever happens first.
/// 4. An entry that failed to produce is removed from the cache rather than
///    left around half-complete; a later caller gets a fresh entry and a
///    fresh shot at producing it.
pub struct CacheEntry {
    blob_id: BlobId,
    completed: AtomicBool,
    size: AtomicU64,
    done: Arc<DoneSignal>,
}

impl CacheEntry {
    pub(crate) fn new(blob_id: BlobId) -> Arc<Self> {
        Arc::new(Self {
            blob_id,
            completed: AtomicBool::new(false),
            size: AtomicU64::new(0),
            done: Arc::new(DoneSignal::new()),
        })
    }

    /// The blob identifier this entry tracks.
    #[must_use]
    pub fn blob_id(&self) -> &str {
        &self.blob_id
    }

    /// Whether the blob has been fully materialized.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Authoritative size in bytes. Meaningless (`0`) until `is_completed()`.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub(crate) fn mark_complete(&self, size: u64) {
        self.size.store(size, Ordering::Release);
        self.completed.store(true, Ordering::Release);
        self.done.fire();
    }

    pub(crate) fn abandon(&self) {
        self.done.fire();
    }

    /// Subscribe to this entry's completion signal. The caller must re-check
    /// [`CacheEntry::is_completed`] after waking; a single receive does not
    /// guarantee this particular entry reached a terminal state on the first
    /// notification it observes.
    pub(crate) fn subscribe_done(&self) -> broadcast::Receiver<()> {
        self.done.subscribe()
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("blob_id", &self.blob_id)
            .field("completed", &self.is_completed())
            .field("size", &self.size())
            .finish()
    }
}

/// Point-in-time snapshot of a [`CacheEntry`], used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntrySnapshot {
    /// Blob identifier the snapshot describes.
    pub blob_id: BlobId,
    /// Whether the entry had completed at snapshot time.
    pub completed: bool,
    /// Size in bytes at snapshot time (`0` if not completed).
    pub size: u64,
}

impl From<&Arc<CacheEntry>> for CacheEntrySnapshot {
    fn from(entry: &Arc<CacheEntry>) -> Self {
        Self {
            blob_id: entry.blob_id.clone(),
            completed: entry.is_completed(),
            size: entry.size(),
        }
    }
}
