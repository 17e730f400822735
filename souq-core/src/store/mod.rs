//! Key-value store port.
//!
//! All persistent state lives behind [`KvStore`]: string keys mapping to JSON
//! values, with point get/set/delete and a prefix scan. No cross-key atomicity
//! is offered or assumed; callers that rewrite a key serialize on it through
//! [`crate::locks::KeyLocks`].

mod memory;
mod redis;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis::{create_pool, get_connection, RedisConnection, RedisPool, RedisStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type SharedStore = Arc<dyn KvStore>;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    async fn set(&self, key: &str, value: &Value) -> StoreResult<()>;

    async fn del(&self, key: &str) -> StoreResult<()>;

    /// Every value whose key starts with `prefix`. Order is unspecified.
    async fn get_by_prefix(&self, prefix: &str) -> StoreResult<Vec<Value>>;
}

/// Read `key` and decode it into `T`.
pub async fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encode `value` and write it under `key`.
pub async fn set_json<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> StoreResult<()> {
    let value = serde_json::to_value(value)?;
    store.set(key, &value).await
}
