//! The single-flight, size-bounded LRU cache.
//!
//! This is the core of the system: at most one producer runs per key at a
//! time; every other caller for the same key waits on the entry already in
//! flight and observes its result instead of triggering a duplicate fetch.
//! Eviction only ever considers completed entries — in-flight entries hold
//! no quota and cannot be evicted out from under their producer.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::model::{BlobId, CacheEntry, CacheEntrySnapshot};

struct Inner {
    entries: HashMap<BlobId, Arc<CacheEntry>>,
    /// Recency list over **completed** entries only; front is most recent.
    /// In-flight entries are tracked solely by `entries` until they complete.
    recency: VecDeque<BlobId>,
    current_size: u64,
}

impl Inner {
    fn touch(&mut self, blob_id: &str) {
        if let Some(pos) = self.recency.iter().position(|id| id == blob_id) {
            let id = self.recency.remove(pos).expect("position was just found");
            self.recency.push_front(id);
        }
    }
}

/// Callback invoked synchronously, from the lock holder, whenever an entry
/// leaves the cache (eviction or explicit `remove`). Registered once at
/// construction; the BT engine adapter's `delete_torrent` is wired in here
/// on both proxy and seeder. Must never call back into the cache.
pub type EvictHook = Arc<dyn Fn(&str) + Send + Sync>;

/// A size-bounded cache that serializes concurrent producers per key.
///
/// Mirrors the cache's original shape exactly: a map keyed by blob id, a
/// recency list over completed entries, a `current_size`/`limit_size` byte
/// budget, and a single lock serializing structural mutation. Waiters drop
/// the lock before awaiting an entry's completion signal.
pub struct SingleFlightCache {
    inner: Mutex<Inner>,
    limit_size: u64,
    on_evict: Option<EvictHook>,
}

impl SingleFlightCache {
    /// Construct a cache bounded to `limit_size` bytes of completed payload,
    /// with no eviction callback registered.
    #[must_use]
    pub fn new(limit_size: u64) -> Self {
        Self::with_evict_hook(limit_size, None)
    }

    /// Construct a cache bounded to `limit_size` bytes, invoking `on_evict`
    /// for every blob id that leaves the cache via eviction or `remove`.
    #[must_use]
    pub fn with_evict_hook(limit_size: u64, on_evict: Option<EvictHook>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: VecDeque::new(),
                current_size: 0,
            }),
            limit_size,
            on_evict,
        }
    }

    fn fire_evict(&self, blob_id: &str) {
        if let Some(hook) = &self.on_evict {
            hook(blob_id);
        }
    }

    /// Look up an entry without creating one. Touches recency if completed.
    #[must_use]
    pub fn get(&self, blob_id: &str) -> Option<Arc<CacheEntry>> {
        let mut inner = self.lock();
        let entry = inner.entries.get(blob_id).cloned()?;
        if entry.is_completed() {
            inner.touch(blob_id);
        }
        Some(entry)
    }

    /// Return the existing entry for `blob_id`, or create and register a new
    /// incomplete one. The second element of the tuple is `true` exactly
    /// when this call created the entry — that caller is responsible for
    /// producing it.
    #[must_use]
    pub fn create_if_not_exists(&self, blob_id: &str) -> (Arc<CacheEntry>, bool) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get(blob_id) {
            return (entry.clone(), false);
        }
        let entry = CacheEntry::new(blob_id.to_string());
        inner.entries.insert(blob_id.to_string(), entry.clone());
        (entry, true)
    }

    /// Mark an entry complete, record its size, and evict from the tail of
    /// the recency list while the completed-only byte budget is exceeded.
    /// Returns the blob ids evicted as a side effect, in eviction order.
    ///
    /// # Panics
    ///
    /// Panics if called for a `blob_id` with no registered entry; callers
    /// always go through [`SingleFlightCache::create_if_not_exists`] first.
    pub fn set_complete(&self, blob_id: &str, size: u64) -> Vec<BlobId> {
        let mut evicted = Vec::new();
        let mut inner = self.lock();
        let entry = inner
            .entries
            .get(blob_id)
            .unwrap_or_else(|| panic!("set_complete called without a registered entry for {blob_id}"))
            .clone();
        entry.mark_complete(size);

        inner.recency.retain(|id| id != blob_id);
        inner.recency.push_front(blob_id.to_string());
        inner.current_size = inner.current_size.saturating_add(size);

        while inner.current_size > self.limit_size {
            let Some(victim) = inner.recency.pop_back() else {
                break;
            };
            if let Some(victim_entry) = inner.entries.remove(&victim) {
                inner.current_size = inner.current_size.saturating_sub(victim_entry.size());
                evicted.push(victim);
            }
        }

        // Drop the lock before firing callbacks: `on_evict` must not itself
        // acquire the cache lock (spec §5 point 4).
        drop(inner);

        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted entries over size budget");
            for blob_id in &evicted {
                self.fire_evict(blob_id);
            }
        }
        evicted
    }

    /// Remove an entry outright (used to abandon a failed in-flight
    /// producer, or to force-drop a completed entry). Wakes any waiters and
    /// fires the eviction hook, if one is registered.
    pub fn remove(&self, blob_id: &str) -> Option<Arc<CacheEntry>> {
        let mut inner = self.lock();
        let entry = inner.entries.remove(blob_id)?;
        if entry.is_completed() {
            inner.current_size = inner.current_size.saturating_sub(entry.size());
        }
        inner.recency.retain(|id| id != blob_id);
        drop(inner);

        entry.abandon();
        self.fire_evict(blob_id);
        Some(entry)
    }

    /// Diagnostic snapshot of every entry currently tracked.
    #[must_use]
    pub fn output(&self) -> Vec<CacheEntrySnapshot> {
        let inner = self.lock();
        inner.entries.values().map(CacheEntrySnapshot::from).collect()
    }

    /// Drive the single-flight protocol for `blob_id`: if an entry is
    /// already complete, return it immediately; if this call is the first
    /// to see the key, run `produce` and publish its result; otherwise wait
    /// for the entry in flight to resolve and re-check its state.
    ///
    /// This is the generic form of the retry loop used by both the seeder's
    /// producer pipeline and the proxy's leecher pipeline: `produce` is
    /// handed the freshly-created entry and returns the final size in bytes
    /// on success.
    ///
    /// # Errors
    ///
    /// Returns whatever error `produce` returns, translated into a
    /// [`CacheError::ProducerFailed`]. A failed producer's entry is removed
    /// so a subsequent caller gets a clean attempt.
    pub async fn resolve<F, Fut>(&self, blob_id: &str, produce: F) -> CacheResult<Arc<CacheEntry>>
    where
        F: FnOnce(Arc<CacheEntry>) -> Fut,
        Fut: Future<Output = Result<u64, Box<dyn std::error::Error + Send + Sync>>>,
    {
        let mut produce = Some(produce);
        loop {
            let (entry, created) = self.create_if_not_exists(blob_id);
            if entry.is_completed() {
                return Ok(entry);
            }

            if created {
                let produce = produce
                    .take()
                    .expect("the entry we just created can only be produced once");
                return match produce(entry.clone()).await {
                    Ok(size) => {
                        self.set_complete(blob_id, size);
                        Ok(entry)
                    }
                    Err(source) => {
                        self.remove(blob_id);
                        warn!(blob_id, error = %source, "producer failed, entry abandoned");
                        Err(CacheError::ProducerFailed {
                            blob_id: blob_id.to_string(),
                            source,
                        })
                    }
                };
            }

            // Someone else is producing this blob. Wait for it to settle,
            // then loop around rather than trust the wake reason: the
            // entry may have been abandoned and a third caller may already
            // be racing to re-create it.
            let mut done = entry.subscribe_done();
            let _ = done.recv().await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn err(msg: &str) -> Box<dyn std::error::Error + Send + Sync> {
        msg.to_string().into()
    }

    #[tokio::test]
    async fn resolve_only_produces_once_for_concurrent_callers() {
        let cache = Arc::new(SingleFlightCache::new(u64::MAX));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .resolve("blob-a", |_entry| {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(100_u64)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            let entry = handle.await.expect("task panicked").expect("resolve failed");
            assert!(entry.is_completed());
            assert_eq!(entry.size(), 100);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_producer_lets_a_later_caller_retry() {
        let cache = Arc::new(SingleFlightCache::new(u64::MAX));
        let attempt = Arc::new(AtomicUsize::new(0));

        let cache2 = cache.clone();
        let attempt2 = attempt.clone();
        let first = cache2
            .resolve("blob-b", |_entry| {
                let attempt = attempt2.clone();
                async move {
                    attempt.fetch_add(1, Ordering::SeqCst);
                    Err(err("origin unreachable"))
                }
            })
            .await;
        assert!(first.is_err());

        let second = cache
            .resolve("blob-b", |_entry| {
                let attempt = attempt.clone();
                async move {
                    attempt.fetch_add(1, Ordering::SeqCst);
                    Ok(50_u64)
                }
            })
            .await
            .expect("second attempt should succeed");
        assert!(second.is_completed());
        assert_eq!(attempt.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn set_complete_evicts_oldest_completed_entry_over_budget() {
        let cache = SingleFlightCache::new(150);
        cache.create_if_not_exists("a");
        cache.set_complete("a", 100);
        cache.create_if_not_exists("b");
        let evicted = cache.set_complete("b", 100);
        assert_eq!(evicted, vec!["a".to_string()]);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn set_complete_evicts_a_lone_entry_that_exceeds_the_budget_alone() {
        let cache = SingleFlightCache::new(50);
        cache.create_if_not_exists("a");
        let evicted = cache.set_complete("a", 100);
        assert_eq!(evicted, vec!["a".to_string()]);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn in_flight_entries_are_not_evicted() {
        let cache = SingleFlightCache::new(10);
        let (_in_flight, _created) = cache.create_if_not_exists("in-flight");
        cache.create_if_not_exists("done");
        cache.set_complete("done", 1_000);
        // "in-flight" has no size yet and was never pushed into the recency
        // list, so it survives even though the budget is blown by "done".
        assert!(cache.get("in-flight").is_some());
    }

    #[test]
    fn remove_wakes_waiters_and_frees_budget() {
        let cache = SingleFlightCache::new(100);
        cache.create_if_not_exists("a");
        cache.set_complete("a", 80);
        cache.remove("a");
        assert!(cache.get("a").is_none());
        cache.create_if_not_exists("b");
        let evicted = cache.set_complete("b", 90);
        assert!(evicted.is_empty());
    }

    #[test]
    fn evict_hook_fires_for_lru_eviction_and_remove() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = seen.clone();
        let cache = SingleFlightCache::with_evict_hook(
            100,
            Some(Arc::new(move |blob_id: &str| {
                hook_seen.lock().unwrap().push(blob_id.to_string());
            })),
        );

        cache.create_if_not_exists("a");
        cache.set_complete("a", 80);
        cache.create_if_not_exists("b");
        cache.set_complete("b", 80); // evicts "a"
        cache.create_if_not_exists("c");
        cache.remove("c"); // explicit remove on an in-flight entry

        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn output_reflects_all_tracked_entries() {
        let cache = SingleFlightCache::new(u64::MAX);
        cache.create_if_not_exists("a");
        cache.set_complete("a", 10);
        cache.create_if_not_exists("b");
        let snapshot = cache.output();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().any(|s| s.blob_id == "a" && s.completed));
        assert!(snapshot.iter().any(|s| s.blob_id == "b" && !s.completed));
    }
}
