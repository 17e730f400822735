use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing;

use super::{KvStore, StoreError, StoreResult};
use crate::config::RedisConfig;

pub type RedisPool = Arc<Client>;
pub type RedisConnection = MultiplexedConnection;

const SCAN_BATCH: usize = 500;

pub async fn create_pool(config: &RedisConfig) -> Result<RedisPool> {
    tracing::info!("Setting up Redis connection pool");
    tracing::info!("Redis URL: {}", mask_redis_url(&config.url));

    let client = Client::open(config.url.as_str())
        .map_err(|e| anyhow!("Failed to create Redis client: {}", e))?;

    // Test the connection
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| anyhow!("Failed to connect to Redis: {}", e))?;

    let _: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| anyhow!("Failed to ping Redis: {}", e))?;

    tracing::info!("Redis connection established successfully!");

    Ok(Arc::new(client))
}

pub async fn get_connection(pool: &RedisPool) -> StoreResult<RedisConnection> {
    pool.get_multiplexed_async_connection()
        .await
        .map_err(|e| StoreError::Unavailable(format!("Failed to get Redis connection: {}", e)))
}

/// [`KvStore`] backed by Redis string keys holding JSON documents.
#[derive(Clone)]
pub struct RedisStore {
    pool: RedisPool,
}

impl RedisStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let mut conn = get_connection(&self.pool).await?;
        let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> StoreResult<()> {
        let mut conn = get_connection(&self.pool).await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(serde_json::to_string(value)?)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        let mut conn = get_connection(&self.pool).await?;
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn get_by_prefix(&self, prefix: &str) -> StoreResult<Vec<Value>> {
        let mut conn = get_connection(&self.pool).await?;
        let pattern = format!("{}*", escape_glob(prefix));

        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may report a key more than once
        keys.sort();
        keys.dedup();

        let mut values = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(SCAN_BATCH) {
            let raws: Vec<Option<String>> = redis::cmd("MGET").arg(chunk).query_async(&mut conn).await?;
            for raw in raws.into_iter().flatten() {
                match serde_json::from_str(&raw) {
                    Ok(value) => values.push(value),
                    Err(e) => tracing::warn!("Skipping undecodable value during prefix scan: {}", e),
                }
            }
        }

        tracing::debug!("Prefix scan {} returned {} values", prefix, values.len());
        Ok(values)
    }
}

/// Escape the glob metacharacters understood by `SCAN MATCH`.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn mask_redis_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        let (before_at, after_at) = url.split_at(at_pos);
        if let Some(colon_pos) = before_at.rfind(':') {
            let (protocol_user, _password) = before_at.split_at(colon_pos);
            format!("{}:****{}", protocol_user, after_at)
        } else {
            format!("redis://****{}", after_at)
        }
    } else {
        url.to_string()
    }
}
