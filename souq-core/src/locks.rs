//! Per-key write serialization.
//!
//! Each read-modify-write sequence against the store takes the lock named after
//! the key it rewrites, so two requests in this process cannot interleave on the
//! same record. Writers in other processes are not covered.
//!
//! Acquisition order is conversation, then conversation index, then unread
//! counter. Code holding a later lock never asks for an earlier one.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

const PRUNE_THRESHOLD: usize = 4096;

#[derive(Clone, Default)]
pub struct KeyLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

pub type KeyGuard = OwnedMutexGuard<()>;

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        if self.inner.len() > PRUNE_THRESHOLD {
            self.prune();
        }

        let mutex = self
            .inner
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        mutex.lock_owned().await
    }

    /// Drop entries nobody holds or waits on.
    pub fn prune(&self) {
        self.inner.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
