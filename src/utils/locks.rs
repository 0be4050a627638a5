//! Keyed async locks.
//!
//! A map of `key -> Arc<Mutex<()>>` shared by everything that must serialize
//! work per user or per conversation thread. Entries nobody holds are pruned
//! once the map grows past a threshold so it does not grow without bound.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Number of entries above which idle locks are pruned on acquire.
const PRUNE_THRESHOLD: usize = 1024;

/// Per-key mutual exclusion.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no one else holds `key`, then hold it until the guard drops.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            if map.len() > PRUNE_THRESHOLD {
                // strong_count == 1 means only the map references the entry
                map.retain(|_, l| Arc::strong_count(l) > 1);
            }
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Try to take `key` without waiting.
    pub async fn try_acquire(&self, key: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.try_lock_owned().ok()
    }

    /// Number of tracked keys.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
