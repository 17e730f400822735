use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::locks::KeyLocks;
use crate::store::{create_pool, MemoryStore, RedisStore, SharedStore};
use crate::users::UserDirectory;

/// Shared state handed to every service and handler.
#[derive(Clone)]
pub struct SouqContext {
    pub config: Arc<Config>,
    pub store: SharedStore,
    pub locks: KeyLocks,
}

impl SouqContext {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: SharedStore = match config.store.backend {
            StoreBackend::Redis => {
                let pool = create_pool(&config.redis).await?;
                Arc::new(RedisStore::new(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store, data will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: SharedStore) -> Self {
        SouqContext {
            config: Arc::new(config),
            store,
            locks: KeyLocks::new(),
        }
    }

    pub fn in_memory(config: Config) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn users(&self) -> UserDirectory {
        UserDirectory::new(self.store.clone(), self.locks.clone())
    }
}
