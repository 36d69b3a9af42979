//! Per-record async guards
//!
//! Writers to the same record queue behind one guard while writers to other
//! records proceed. Guards are created on first use and dropped again once
//! no task holds or waits for them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held for the duration of one record write.
pub struct RecordGuard {
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map entry left means nobody holds or waits for the guard.
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Default, Clone)]
pub struct RecordLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: impl Into<String>) -> RecordGuard {
        let key = key.into();
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let guard = lock.lock_owned().await;
        RecordGuard { key, locks: Arc::clone(&self.locks), guard: Some(guard) }
    }

    /// Number of records with a live guard
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}
