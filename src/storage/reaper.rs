//! Background Reaper
//!
//! Periodically removes expired entries from the [`Store`]. Lazy expiry
//! (checking on access) already keeps every response correct; the reaper only
//! reclaims memory held by keys that are never touched again.
//!
//! ## Design
//!
//! Each tick runs in two phases:
//! 1. Scan for expired keys under the shared lock
//! 2. For each candidate, re-check and delete under a short exclusive lock
//!
//! The exclusive lock is never held for a whole scan, and an entry that was
//! rewritten between the two phases is left alone.
//!
//! The reaper talks to the store only through its public operations, so it
//! can be switched on or off without touching the store.

use crate::storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the reaper.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Interval between sweeps (default: 3s)
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
        }
    }
}

/// A handle to the running reaper.
///
/// When this handle is dropped, the reaper task will be stopped.
#[derive(Debug)]
pub struct Reaper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl Reaper {
    /// Starts the reaper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use verkv::storage::{Reaper, ReaperConfig, Store};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(Store::new());
    /// let reaper = Reaper::start(store, ReaperConfig::default());
    ///
    /// // Dropping the handle stops the task
    /// drop(reaper);
    /// ```
    pub fn start(store: Arc<Store>, config: ReaperConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(interval_ms = config.interval.as_millis(), "Reaper started");
        tokio::spawn(reaper_loop(store, config, shutdown_rx));

        Self { shutdown_tx }
    }

    /// Stops the reaper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Reaper stopped");
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs one two-phase sweep and returns how many entries were removed.
pub fn sweep(store: &Store) -> usize {
    let candidates = store.expired_keys();
    if candidates.is_empty() {
        return 0;
    }

    let removed = candidates
        .iter()
        .filter(|key| store.remove_if_expired(key))
        .count();

    trace!(
        candidates = candidates.len(),
        removed = removed,
        "Sweep finished"
    );
    removed
}

async fn reaper_loop(
    store: Arc<Store>,
    config: ReaperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Reaper received shutdown signal");
                    return;
                }
            }
        }

        let expired = sweep(&store);
        if expired > 0 {
            let stats = store.stats();
            debug!(
                expired = expired,
                keys_remaining = stats.keys,
                expired_total = stats.expired,
                reads = stats.reads,
                writes = stats.writes,
                cas_hits = stats.cas_hits,
                cas_conflicts = stats.cas_conflicts,
                "Expired keys reaped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = Store::new();
        for i in 0..10 {
            store.write(
                format!("key{}", i),
                Some(Duration::from_millis(10)),
                Bytes::from("value"),
            );
        }
        store.write("persistent", None, Bytes::from("value"));
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(sweep(&store), 10);
        assert_eq!(store.len(), 1);
        assert!(store.read("persistent").is_some());
    }

    #[tokio::test]
    async fn test_reaper_cleans_expired_keys() {
        let store = Arc::new(Store::new());

        for i in 0..10 {
            store.write(
                format!("key{}", i),
                Some(Duration::from_millis(50)),
                Bytes::from("value"),
            );
        }
        store.write("persistent", None, Bytes::from("value"));
        assert_eq!(store.len(), 11);

        let config = ReaperConfig {
            interval: Duration::from_millis(10),
        };
        let _reaper = Reaper::start(Arc::clone(&store), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Nothing read the keys, so only the reaper can have removed them
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().expired, 10);
    }

    #[tokio::test]
    async fn test_reaper_stops_on_drop() {
        let store = Arc::new(Store::new());

        {
            let _reaper = Reaper::start(
                Arc::clone(&store),
                ReaperConfig {
                    interval: Duration::from_millis(10),
                },
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        store.write("key", Some(Duration::from_millis(10)), Bytes::from("value"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Still held in memory, yet invisible to reads
        assert_eq!(store.len(), 1);
        assert!(store.read("key").is_none());
        assert_eq!(store.len(), 0);
    }
}
