//! Versioned Key-Value Store with Expiry Support
//!
//! This module implements the core store for verkv: a single map from
//! string keys to versioned, expirable entries, guarded by one reader/writer
//! lock.
//!
//! ## Design Decisions
//!
//! 1. **One Coarse Lock**: All keys live behind a single `RwLock`. Reads share it,
//!    every read-modify-write (including the version check of CAS) holds it
//!    exclusively for the whole sequence.
//! 2. **Versions**: A key's first write gets version 1, every later successful
//!    write or CAS increments it by exactly one.
//! 3. **Lazy Expiry**: Reads, deletes and CAS treat an expired entry as absent
//!    and drop it. A write over an expired entry replaces it but keeps counting
//!    from its version. The optional [`Reaper`](crate::storage::Reaper)
//!    reclaims entries nobody touches again.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   Store                     │
//! │   ┌─────────────────────────────────────┐   │
//! │   │  RwLock<HashMap<String, Entry>>     │   │
//! │   │   read()  ── shared                 │   │
//! │   │   write() / cas() / delete()        │   │
//! │   │           ── exclusive              │   │
//! │   └─────────────────────────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Converts a protocol TTL in seconds into an optional duration.
///
/// Non-positive values mean "never expires".
pub fn ttl_from_secs(secs: i64) -> Option<Duration> {
    if secs > 0 {
        Some(Duration::from_secs(secs as u64))
    } else {
        None
    }
}

/// A single stored value with its version and optional expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The stored value
    pub value: Bytes,
    /// Version counter, starts at 1
    pub version: u64,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Bytes, version: u64, ttl: Option<Duration>) -> Self {
        Self {
            value,
            version,
            // A ttl too large to represent never expires
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    #[inline]
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Returns the remaining time to live, or None if the entry never expires.
    pub fn ttl(&self) -> Option<Duration> {
        self.expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }
}

/// What a successful [`Store::read`] returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub value: Bytes,
    pub version: u64,
    /// Remaining time to live (None = never expires)
    pub ttl: Option<Duration>,
}

/// Errors returned by conditional store operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The key does not exist or has expired
    #[error("key not found")]
    NotFound,

    /// The key exists but its version differs from the expected one
    #[error("version mismatch: current version is {current}")]
    VersionMismatch { current: u64 },
}

/// Point-in-time copy of the store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub keys: usize,
    pub reads: u64,
    pub writes: u64,
    pub cas_hits: u64,
    pub cas_conflicts: u64,
    pub deletes: u64,
    pub expired: u64,
}

/// The shared key-value store.
///
/// Wrap it in an `Arc` and hand a clone to every connection task and to the
/// reaper; all of them serialize through the same lock.
///
/// # Example
///
/// ```
/// use verkv::storage::{Store, StoreError};
/// use bytes::Bytes;
///
/// let store = Store::new();
/// assert_eq!(store.write("name", None, Bytes::from("bar")), 1);
/// assert_eq!(store.compare_and_swap("name", 1, None, Bytes::from("baz")), Ok(2));
/// assert_eq!(
///     store.compare_and_swap("name", 1, None, Bytes::from("qux")),
///     Err(StoreError::VersionMismatch { current: 2 })
/// );
/// ```
#[derive(Default)]
pub struct Store {
    data: RwLock<HashMap<String, Entry>>,

    reads: AtomicU64,
    writes: AtomicU64,
    cas_hits: AtomicU64,
    cas_conflicts: AtomicU64,
    deletes: AtomicU64,
    expired: AtomicU64,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.len())
            .field("reads", &self.reads.load(Ordering::Relaxed))
            .field("writes", &self.writes.load(Ordering::Relaxed))
            .finish()
    }
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or overwrites the entry for `key`.
    ///
    /// Returns the new version: 1 for a new key, otherwise the old version
    /// plus one. An expired entry still in the map keeps counting, so a
    /// version seen before expiry can never be handed out again.
    pub fn write(&self, key: impl Into<String>, ttl: Option<Duration>, value: Bytes) -> u64 {
        self.writes.fetch_add(1, Ordering::Relaxed);

        let key = key.into();
        let now = Instant::now();
        let mut data = self.data.write();

        let version = match data.get(&key) {
            Some(old) => {
                if old.is_expired_at(now) {
                    self.expired.fetch_add(1, Ordering::Relaxed);
                }
                old.version + 1
            }
            None => 1,
        };

        data.insert(key, Entry::new(value, version, ttl));
        version
    }

    /// Looks up `key`.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired
    /// entry is removed on the way out.
    pub fn read(&self, key: &str) -> Option<Snapshot> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        // Fast path under the shared lock
        {
            let data = self.data.read();
            match data.get(key) {
                Some(entry) if !entry.is_expired() => {
                    return Some(Snapshot {
                        value: entry.value.clone(),
                        version: entry.version,
                        ttl: entry.ttl(),
                    });
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: the writer may have refreshed it since we dropped the read lock
        self.remove_if_expired(key);
        None
    }

    /// Removes `key`.
    ///
    /// Returns `true` if a live entry was removed. An expired entry is
    /// dropped as well but reported as absent.
    pub fn delete(&self, key: &str) -> bool {
        self.deletes.fetch_add(1, Ordering::Relaxed);

        let mut data = self.data.write();
        match data.remove(key) {
            Some(entry) if entry.is_expired() => {
                self.expired.fetch_add(1, Ordering::Relaxed);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Replaces the value of `key` only if its current version equals
    /// `expected`.
    ///
    /// The version check and the replacement happen under a single
    /// exclusive lock acquisition.
    pub fn compare_and_swap(
        &self,
        key: &str,
        expected: u64,
        ttl: Option<Duration>,
        value: Bytes,
    ) -> Result<u64, StoreError> {
        let mut data = self.data.write();

        let (current, expired) = match data.get(key) {
            Some(entry) => (entry.version, entry.is_expired()),
            None => return Err(StoreError::NotFound),
        };

        if expired {
            data.remove(key);
            self.expired.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::NotFound);
        }

        if current != expected {
            self.cas_conflicts.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::VersionMismatch { current });
        }

        let version = current + 1;
        data.insert(key.to_string(), Entry::new(value, version, ttl));
        self.cas_hits.fetch_add(1, Ordering::Relaxed);
        Ok(version)
    }

    /// Collects the keys whose entries have expired.
    ///
    /// Only takes the shared lock. The result may be stale by the time the
    /// caller acts on it; pair it with [`Store::remove_if_expired`].
    pub fn expired_keys(&self) -> Vec<String> {
        let now = Instant::now();
        let data = self.data.read();
        data.iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Removes `key` if, under the exclusive lock, it is still expired.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove_if_expired(&self, key: &str) -> bool {
        let mut data = self.data.write();
        if data.get(key).map(Entry::is_expired).unwrap_or(false) {
            data.remove(key);
            self.expired.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Number of entries held, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.len(),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            cas_hits: self.cas_hits.load(Ordering::Relaxed),
            cas_conflicts: self.cas_conflicts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_write_versions_start_at_one() {
        let store = Store::new();

        for expected in 1..=5 {
            assert_eq!(store.write("key", None, Bytes::from("v")), expected);
        }
        assert_eq!(store.read("key").unwrap().version, 5);
    }

    #[test]
    fn test_read_missing() {
        let store = Store::new();
        assert!(store.read("nope").is_none());
    }

    #[test]
    fn test_read_returns_value_and_version() {
        let store = Store::new();
        store.write("name", None, Bytes::from("bar"));

        let snapshot = store.read("name").unwrap();
        assert_eq!(snapshot.value, Bytes::from("bar"));
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.ttl, None);
    }

    #[test]
    fn test_ttl_from_secs() {
        assert_eq!(ttl_from_secs(0), None);
        assert_eq!(ttl_from_secs(-5), None);
        assert_eq!(ttl_from_secs(10), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_remaining_ttl_is_reported() {
        let store = Store::new();
        store.write("session", Some(Duration::from_secs(60)), Bytes::from("x"));

        let ttl = store.read("session").unwrap().ttl.unwrap();
        assert!(ttl <= Duration::from_secs(60));
        assert!(ttl > Duration::from_secs(59));
    }

    #[test]
    fn test_expired_entry_is_not_found() {
        let store = Store::new();
        store.write("short", Some(Duration::from_millis(20)), Bytes::from("x"));
        assert!(store.read("short").is_some());

        thread::sleep(Duration::from_millis(40));

        assert!(store.read("short").is_none());
        // Lazy expiry dropped it
        assert_eq!(store.len(), 0);
        assert_eq!(store.stats().expired, 1);
    }

    #[test]
    fn test_never_expiring_entry_survives() {
        let store = Store::new();
        store.write("forever", ttl_from_secs(0), Bytes::from("x"));
        thread::sleep(Duration::from_millis(30));
        assert!(store.read("forever").is_some());
    }

    #[test]
    fn test_write_after_expiry_keeps_counting() {
        let store = Store::new();
        for _ in 0..5 {
            store.write("k", Some(Duration::from_millis(10)), Bytes::from("a"));
        }
        thread::sleep(Duration::from_millis(25));

        assert_eq!(store.write("k", None, Bytes::from("b")), 6);
        assert_eq!(store.stats().expired, 1);

        // A compare-and-swap holding a pre-expiry version is still stale
        assert_eq!(
            store.compare_and_swap("k", 5, None, Bytes::from("c")),
            Err(StoreError::VersionMismatch { current: 6 })
        );
    }

    #[test]
    fn test_delete() {
        let store = Store::new();
        store.write("k", None, Bytes::from("v"));

        assert!(store.delete("k"));
        assert!(store.read("k").is_none());
        assert!(!store.delete("k"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_expired_reports_not_found() {
        let store = Store::new();
        store.write("k", Some(Duration::from_millis(10)), Bytes::from("v"));
        thread::sleep(Duration::from_millis(25));

        assert!(!store.delete("k"));
        assert!(store.is_empty());
        assert_eq!(store.write("k", None, Bytes::from("w")), 1);
    }

    #[test]
    fn test_cas_success_increments_version() {
        let store = Store::new();
        store.write("k", None, Bytes::from("bar"));

        assert_eq!(store.compare_and_swap("k", 1, None, Bytes::from("baz")), Ok(2));
        let snapshot = store.read("k").unwrap();
        assert_eq!(snapshot.value, Bytes::from("baz"));
        assert_eq!(snapshot.version, 2);
    }

    #[test]
    fn test_cas_mismatch_leaves_entry_unchanged() {
        let store = Store::new();
        store.write("k", None, Bytes::from("bar"));
        store.write("k", None, Bytes::from("baz"));

        assert_eq!(
            store.compare_and_swap("k", 1, None, Bytes::from("qux")),
            Err(StoreError::VersionMismatch { current: 2 })
        );
        let snapshot = store.read("k").unwrap();
        assert_eq!(snapshot.value, Bytes::from("baz"));
        assert_eq!(snapshot.version, 2);
        assert_eq!(store.stats().cas_conflicts, 1);
    }

    #[test]
    fn test_cas_missing_key() {
        let store = Store::new();
        assert_eq!(
            store.compare_and_swap("k", 1, None, Bytes::from("v")),
            Err(StoreError::NotFound)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_cas_expired_key() {
        let store = Store::new();
        store.write("k", Some(Duration::from_millis(10)), Bytes::from("v"));
        thread::sleep(Duration::from_millis(25));

        assert_eq!(
            store.compare_and_swap("k", 1, None, Bytes::from("w")),
            Err(StoreError::NotFound)
        );
    }

    #[test]
    fn test_cas_sets_new_ttl() {
        let store = Store::new();
        store.write("k", None, Bytes::from("v"));
        store
            .compare_and_swap("k", 1, Some(Duration::from_secs(30)), Bytes::from("w"))
            .unwrap();

        assert!(store.read("k").unwrap().ttl.is_some());
    }

    #[test]
    fn test_concurrent_cas_exactly_one_wins() {
        let store = Arc::new(Store::new());
        store.write("k", None, Bytes::from("start"));

        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.compare_and_swap("k", 1, None, Bytes::from(format!("v{}", i)))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::VersionMismatch { current: 2 })))
            .count();

        assert_eq!(wins, 1);
        assert_eq!(conflicts, threads - 1);
        assert_eq!(store.read("k").unwrap().version, 2);
    }

    #[test]
    fn test_concurrent_writes_do_not_lose_versions() {
        let store = Arc::new(Store::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.write("counter", None, Bytes::from("x"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.read("counter").unwrap().version, 800);
    }

    #[test]
    fn test_expired_keys_and_remove_if_expired() {
        let store = Store::new();
        store.write("a", Some(Duration::from_millis(10)), Bytes::from("1"));
        store.write("b", None, Bytes::from("2"));
        thread::sleep(Duration::from_millis(25));

        assert_eq!(store.expired_keys(), vec!["a".to_string()]);

        // Refreshed between scan and confirm: must survive
        store.write("a", None, Bytes::from("fresh"));
        assert!(!store.remove_if_expired("a"));
        assert_eq!(store.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_write_versions_are_consecutive(n in 1usize..50) {
            let store = Store::new();
            let versions: Vec<u64> = (0..n)
                .map(|_| store.write("k", None, Bytes::from("v")))
                .collect();
            let expected: Vec<u64> = (1..=n as u64).collect();
            prop_assert_eq!(versions, expected);
        }
    }
}
