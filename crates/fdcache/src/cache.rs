//! The bounded, pin-aware handle cache.
//!
//! The cache maps a [`PathKey`] to at most one live [`FileHandle`].
//! Its own structure (map, recency order, pin counts) sits behind one
//! coarse [`std::sync::Mutex`] whose critical sections are O(1) and
//! never held across an await. Byte-level serialization of operations
//! on a single path happens on the entry's [`tokio::sync::Mutex`],
//! which hands the handle to waiters in request order.

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use fdcache_core::{FileError, FileResult, HandleKind, PathKey};
use lru::LruCache;
use tokio::sync::{Mutex as AsyncMutex, Notify, OwnedMutexGuard};
use tracing::{debug, trace, warn};

use crate::config::ExhaustionPolicy;
use crate::handle::FileHandle;

/// The slot a path's handle lives in. Empty between slot reservation
/// and a successful open, and again after invalidation.
type Slot = Arc<AsyncMutex<Option<FileHandle>>>;

/// Bookkeeping for one cached path.
///
/// `pins` counts in-flight operations and is only touched under the
/// cache lock; the slot lock is only taken outside it.
struct Entry {
    slot: Slot,
    pins: usize,
}

struct Shared {
    map: StdMutex<LruCache<PathKey, Entry>>,
    /// Signalled whenever an entry's pin count drops to zero, waking
    /// acquires parked by the queue policy.
    released: Notify,
    capacity: usize,
    policy: ExhaustionPolicy,
}

impl Shared {
    fn lock_map(&self) -> MutexGuard<'_, LruCache<PathKey, Entry>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unpin `key` after an operation finishes.
    fn release(&self, key: &PathKey) {
        let mut map = self.lock_map();
        let Some(entry) = map.peek_mut(key) else {
            // Teardown removed the entry while the lease was live.
            return;
        };
        entry.pins = entry.pins.saturating_sub(1);
        if entry.pins == 0 {
            // A failed open leaves an empty slot behind; drop it so it
            // does not occupy a capacity unit.
            let vacant = entry.slot.try_lock().is_ok_and(|slot| slot.is_none());
            if vacant {
                map.pop(key);
            }
            trace!(path = %key, "handle released");
            self.released.notify_waiters();
        }
    }
}

/// Bounded associative store of live file handles, evicting by recency.
pub(crate) struct HandleCache {
    shared: Arc<Shared>,
}

impl HandleCache {
    /// Create a cache holding at most `capacity` open handles.
    /// Capacities below 1 are treated as 1.
    pub(crate) fn new(capacity: usize, policy: ExhaustionPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                map: StdMutex::new(LruCache::unbounded()),
                released: Notify::new(),
                capacity: capacity.max(1),
                policy,
            }),
        }
    }

    /// Number of currently cached (open or opening) handles.
    pub(crate) fn len(&self) -> usize {
        self.shared.lock_map().len()
    }

    /// Resolve `key` to a pinned, serialized handle of `kind`.
    ///
    /// On a hit the cached handle is reused; a hit whose handle has a
    /// different kind closes the stale handle and reopens in place,
    /// serialized behind the operations already using it. On a miss a
    /// slot is reserved (evicting the least-recently-used unpinned
    /// entry when at capacity) and the handle opened into it.
    ///
    /// The returned lease holds both the pin and the entry lock; both
    /// are released when it drops.
    ///
    /// # Errors
    ///
    /// Open failures propagate from [`FileHandle::open`];
    /// [`FileError::CapacityExceeded`] is returned when the cache is
    /// full, every entry is pinned, and the policy is fail-fast.
    pub(crate) async fn acquire(&self, key: &PathKey, kind: HandleKind) -> FileResult<HandleLease> {
        let slot = loop {
            let notified = self.shared.released.notified();
            tokio::pin!(notified);
            {
                let mut map = self.shared.lock_map();

                if let Some(entry) = map.get_mut(key) {
                    entry.pins = entry.pins.saturating_add(1);
                    trace!(path = %key, kind = %kind, "handle cache hit");
                    break Arc::clone(&entry.slot);
                }

                if map.len() < self.shared.capacity || Self::evict_lru(&mut map) {
                    let slot: Slot = Arc::new(AsyncMutex::new(None));
                    map.put(
                        key.clone(),
                        Entry {
                            slot: Arc::clone(&slot),
                            pins: 1,
                        },
                    );
                    trace!(path = %key, kind = %kind, "handle cache miss; slot reserved");
                    break slot;
                }

                if self.shared.policy == ExhaustionPolicy::FailFast {
                    warn!(
                        path = %key,
                        capacity = self.shared.capacity,
                        "handle cache exhausted with all entries pinned"
                    );
                    return Err(FileError::CapacityExceeded {
                        path: key.as_path().to_path_buf(),
                        mode: kind.mode,
                        capacity: self.shared.capacity,
                    });
                }

                // Queue policy: register interest before the map lock
                // drops, so a release landing in between still wakes
                // this acquire.
                trace!(path = %key, "handle cache exhausted; parked until a release");
                notified.as_mut().enable();
            }
            notified.await;
        };

        // Serialize on the slot outside the cache lock. The tokio mutex
        // is fair: same-path operations run in request order.
        let mut guard = Arc::clone(&slot).lock_owned().await;

        if guard.as_ref().is_some_and(|handle| handle.kind() != kind) {
            debug!(path = %key, to = %kind, "access change invalidates cached handle; reopening");
            if let Some(mut stale) = guard.take() {
                stale.close();
            }
        }

        if guard.is_none() {
            match FileHandle::open(key.as_path(), kind).await {
                Ok(handle) => *guard = Some(handle),
                Err(error) => {
                    drop(guard);
                    self.shared.release(key);
                    return Err(error);
                },
            }
        }

        Ok(HandleLease {
            guard: Some(guard),
            key: key.clone(),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Close every cached handle, draining in-flight operations.
    ///
    /// Each entry's lock is awaited before its handle closes, so no
    /// descriptor is released under active I/O. Entries are removed
    /// regardless of pin state; a live lease outlasting the drain
    /// simply finds nothing to unpin.
    pub(crate) async fn close_all(&self) {
        let drained: Vec<(PathKey, Slot)> = {
            let mut map = self.shared.lock_map();
            let mut drained = Vec::with_capacity(map.len());
            while let Some((key, entry)) = map.pop_lru() {
                drained.push((key, entry.slot));
            }
            drained
        };

        debug!(handles = drained.len(), "draining handle cache");

        for (key, slot) in drained {
            let mut guard = slot.lock().await;
            if let Some(mut handle) = guard.take() {
                handle.close();
                trace!(path = %key, "closed handle at teardown");
            }
        }

        // Parked acquires now race for the emptied map.
        self.shared.released.notify_waiters();
    }

    /// Evict the least-recently-used unpinned entry, closing its
    /// handle. Returns false when every entry is pinned.
    fn evict_lru(map: &mut LruCache<PathKey, Entry>) -> bool {
        let victim = map
            .iter()
            .rev()
            .find(|(_, entry)| entry.pins == 0)
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                if let Some(entry) = map.pop(&key) {
                    // pins == 0 under the cache lock, so no lease holds
                    // the slot and the close happens before the entry
                    // is forgotten.
                    if let Ok(mut guard) = entry.slot.try_lock() {
                        if let Some(mut handle) = guard.take() {
                            handle.close();
                            debug_assert!(!handle.is_open());
                        }
                    }
                }
                debug!(path = %key, "evicted least-recently-used handle");
                true
            },
            None => false,
        }
    }
}

impl fmt::Debug for HandleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleCache")
            .field("capacity", &self.shared.capacity)
            .field("policy", &self.shared.policy)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// A pinned, exclusively locked reference to one cached handle.
///
/// Dropping the lease first releases the entry lock, then the pin, so
/// an entry is never observed unpinned while its lock is still held by
/// an operation.
pub(crate) struct HandleLease {
    guard: Option<OwnedMutexGuard<Option<FileHandle>>>,
    key: PathKey,
    shared: Arc<Shared>,
}

impl fmt::Debug for HandleLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleLease")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl HandleLease {
    /// The open handle behind this lease.
    pub(crate) fn handle_mut(&mut self) -> &mut FileHandle {
        self.guard
            .as_mut()
            .and_then(|slot| slot.as_mut())
            .expect("a lease always holds an open handle")
    }
}

impl Drop for HandleLease {
    fn drop(&mut self) {
        self.guard.take();
        self.shared.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use fdcache_core::{AccessMode, Encoding};
    use tempfile::{TempDir, tempdir};

    use super::*;

    const WRITE: HandleKind = HandleKind::new(AccessMode::Write, Encoding::Binary);
    const APPEND: HandleKind = HandleKind::new(AccessMode::Append, Encoding::Binary);
    const READ: HandleKind = HandleKind::new(AccessMode::Read, Encoding::Binary);

    fn key_for(dir: &TempDir, name: &str) -> PathKey {
        PathKey::new(dir.path().join(name))
    }

    fn contains(cache: &HandleCache, key: &PathKey) -> bool {
        cache.shared.lock_map().contains(key)
    }

    #[tokio::test]
    async fn capacity_is_never_exceeded() {
        let dir = tempdir().unwrap();
        let cache = HandleCache::new(2, ExhaustionPolicy::FailFast);

        for name in ["a", "b", "c", "d"] {
            let key = key_for(&dir, name);
            drop(cache.acquire(&key, WRITE).await.unwrap());
            assert!(cache.len() <= 2);
        }
    }

    #[tokio::test]
    async fn lru_entry_is_the_eviction_victim() {
        let dir = tempdir().unwrap();
        let cache = HandleCache::new(2, ExhaustionPolicy::FailFast);
        let (a, b, c) = (key_for(&dir, "a"), key_for(&dir, "b"), key_for(&dir, "c"));

        drop(cache.acquire(&a, WRITE).await.unwrap());
        drop(cache.acquire(&b, WRITE).await.unwrap());
        // Touch `a` so `b` becomes least recently used.
        drop(cache.acquire(&a, WRITE).await.unwrap());
        drop(cache.acquire(&c, WRITE).await.unwrap());

        assert!(contains(&cache, &a));
        assert!(!contains(&cache, &b));
        assert!(contains(&cache, &c));
    }

    #[tokio::test]
    async fn untouched_entries_evict_in_insertion_order() {
        let dir = tempdir().unwrap();
        let cache = HandleCache::new(3, ExhaustionPolicy::FailFast);
        let keys: Vec<PathKey> = ["a", "b", "c", "d"].iter().map(|n| key_for(&dir, n)).collect();

        for key in &keys {
            drop(cache.acquire(key, WRITE).await.unwrap());
        }

        assert!(!contains(&cache, &keys[0]));
        assert!(contains(&cache, &keys[1]));
        assert!(contains(&cache, &keys[3]));
    }

    #[tokio::test]
    async fn pinned_entry_survives_eviction_pressure() {
        let dir = tempdir().unwrap();
        let cache = HandleCache::new(1, ExhaustionPolicy::FailFast);
        let (a, b) = (key_for(&dir, "a"), key_for(&dir, "b"));

        let lease = cache.acquire(&a, WRITE).await.unwrap();

        let err = cache.acquire(&b, WRITE).await.unwrap_err();
        match err {
            FileError::CapacityExceeded { capacity, .. } => assert_eq!(capacity, 1),
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
        assert!(contains(&cache, &a));

        drop(lease);

        // After the release the retry succeeds and `a` is evicted.
        drop(cache.acquire(&b, WRITE).await.unwrap());
        assert!(!contains(&cache, &a));
        assert!(contains(&cache, &b));
    }

    #[tokio::test]
    async fn queue_policy_parks_until_release() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(HandleCache::new(1, ExhaustionPolicy::Queue));
        let (a, b) = (key_for(&dir, "a"), key_for(&dir, "b"));

        let lease = cache.acquire(&a, WRITE).await.unwrap();

        let parked = {
            let cache = Arc::clone(&cache);
            let b = b.clone();
            tokio::spawn(async move { cache.acquire(&b, WRITE).await.map(drop) })
        };

        // The parked acquire cannot finish while `a` is pinned.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!parked.is_finished());

        drop(lease);
        parked.await.unwrap().unwrap();
        assert!(contains(&cache, &b));
    }

    #[tokio::test]
    async fn mode_change_reopens_in_place() {
        let dir = tempdir().unwrap();
        let cache = HandleCache::new(4, ExhaustionPolicy::FailFast);
        let key = key_for(&dir, "f.bin");

        {
            let mut lease = cache.acquire(&key, WRITE).await.unwrap();
            lease.handle_mut().write_all(b"payload").await.unwrap();
        }
        {
            let mut lease = cache.acquire(&key, READ).await.unwrap();
            assert_eq!(lease.handle_mut().kind(), READ);
            assert_eq!(lease.handle_mut().read_all(1_024).await.unwrap(), b"payload");
        }
        {
            let mut lease = cache.acquire(&key, APPEND).await.unwrap();
            lease.handle_mut().write_all(b"!").await.unwrap();
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(tokio::fs::read(key.as_path()).await.unwrap(), b"payload!");
    }

    #[tokio::test]
    async fn failed_open_leaves_no_phantom_entry() {
        let dir = tempdir().unwrap();
        let cache = HandleCache::new(2, ExhaustionPolicy::FailFast);
        let missing = key_for(&dir, "missing.bin");

        let err = cache.acquire(&missing, READ).await.unwrap_err();
        assert!(matches!(err, FileError::FileDoesNotExist { .. }));
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn same_path_operations_run_in_request_order() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(HandleCache::new(2, ExhaustionPolicy::FailFast));
        let key = key_for(&dir, "ordered.bin");

        // Holding the first lease across the spawned acquires forces
        // them all to park on the entry lock in arrival order.
        let mut first = cache.acquire(&key, APPEND).await.unwrap();
        first.handle_mut().write_all(b"0").await.unwrap();

        let mut tasks = Vec::new();
        for digit in [b"1", b"2", b"3"] {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            tasks.push(tokio::spawn(async move {
                let mut lease = cache.acquire(&key, APPEND).await.unwrap();
                lease.handle_mut().write_all(digit).await.unwrap();
            }));
            // Give the task time to reach the entry queue.
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        drop(first);
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(tokio::fs::read(key.as_path()).await.unwrap(), b"0123");
    }

    #[tokio::test]
    async fn close_all_drains_and_empties() {
        let dir = tempdir().unwrap();
        let cache = HandleCache::new(4, ExhaustionPolicy::FailFast);
        for name in ["a", "b", "c"] {
            drop(cache.acquire(&key_for(&dir, name), WRITE).await.unwrap());
        }
        assert_eq!(cache.len(), 3);

        cache.close_all().await;
        assert_eq!(cache.len(), 0);

        // The cache is reusable after a drain.
        drop(cache.acquire(&key_for(&dir, "a"), WRITE).await.unwrap());
        assert_eq!(cache.len(), 1);
    }
}
