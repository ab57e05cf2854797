//! Dashboard-side read-through snapshot cache and refresh channel.
//!
//! The cache is the only long-lived state in the system, and it is purely
//! derived: entries are keyed by iteration path and revalidated by
//! fingerprint once their poll TTL lapses, or dropped outright on a
//! watcher notification. A stale entry serves an old-but-consistent
//! snapshot — folding is pure, so there is no corrupt intermediate to
//! observe.
//!
//! The refresh channel is an optional, fire-and-forget observer hook: a
//! payload-free mark telling connected viewers to re-run the same
//! read/fold pass. The core is fully correct with zero subscribers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::domain::error::Result;
use crate::domain::status::PipelineSnapshot;
use crate::obs;
use crate::store::{fold_iteration, IterationStore};
use crate::tier::PhaseTable;

struct CacheEntry {
    snapshot: PipelineSnapshot,
    fingerprint: String,
    refreshed_at: Instant,
}

/// Read-through cache of folded snapshots, keyed by iteration path.
pub struct SnapshotCache {
    ttl: Duration,
    registry: Option<PhaseTable>,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl SnapshotCache {
    /// `ttl` is the poll interval after which an entry is revalidated by
    /// fingerprint before being served again.
    pub fn new(ttl: Duration, registry: Option<PhaseTable>) -> Self {
        Self {
            ttl,
            registry,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Serve the snapshot for an iteration, folding only when the cached
    /// entry is absent or its directory fingerprint changed.
    pub fn get(&self, iteration: &Path) -> Result<PipelineSnapshot> {
        {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = entries.get(iteration) {
                if entry.refreshed_at.elapsed() < self.ttl {
                    return Ok(entry.snapshot.clone());
                }
            }
        }

        // TTL lapsed or never folded: revalidate outside the lock.
        let fingerprint = IterationStore::new(iteration).fingerprint()?;
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = entries.get_mut(iteration) {
                if entry.fingerprint == fingerprint {
                    entry.refreshed_at = Instant::now();
                    return Ok(entry.snapshot.clone());
                }
            }
        }

        let snapshot = fold_iteration(iteration, self.registry.clone())?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            iteration.to_path_buf(),
            CacheEntry {
                snapshot: snapshot.clone(),
                fingerprint,
                refreshed_at: Instant::now(),
            },
        );
        Ok(snapshot)
    }

    /// Drop a cached entry so the next read re-folds. Called on
    /// filesystem-change notification.
    pub fn invalidate(&self, iteration: &Path) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(iteration);
    }

    /// Number of cached iterations, for the daemon health endpoint.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Payload-free refresh mark. The protocol carries no fields beyond
/// "re-read now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh;

/// One-way refresh channel to connected viewers.
#[derive(Debug, Clone)]
pub struct RefreshNotifier {
    tx: broadcast::Sender<Refresh>,
}

impl RefreshNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Refresh> {
        self.tx.subscribe()
    }

    /// Fire-and-forget: a send with no subscribers is not an error.
    pub fn notify(&self) {
        let delivered = self.tx.send(Refresh).unwrap_or(0);
        obs::emit_refresh_broadcast(delivered);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for RefreshNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_subscribers_is_silent() {
        let notifier = RefreshNotifier::default();
        assert_eq!(notifier.subscriber_count(), 0);
        notifier.notify();
    }

    #[tokio::test]
    async fn test_notify_reaches_subscriber() {
        let notifier = RefreshNotifier::default();
        let mut rx = notifier.subscribe();
        notifier.notify();
        assert_eq!(rx.recv().await.expect("refresh"), Refresh);
    }

    #[test]
    fn test_cache_empty_on_creation() {
        let cache = SnapshotCache::new(Duration::from_secs(2), None);
        assert!(cache.is_empty());
    }
}
