//! Redis-backed shared cache tier.
//!
//! Allows cache contents and rate-limit records to be shared across
//! multiple process instances.
//!
//! ## Architecture
//!
//! Keys arrive already namespaced and values already serialized from the
//! cache boundary, so this adapter moves opaque bytes:
//! - `GET`/`SET PX` for reads and TTL'd writes
//! - `PTTL` for metadata probes
//! - `SCAN MATCH ... COUNT` + `DEL` for prefix clearing
//!
//! ## Error Handling
//!
//! Every operation surfaces failures as `StoreError`; the cache above this
//! adapter catches them, logs a warning, and degrades to a miss. A Redis
//! outage therefore costs hit rate, not availability.

use crate::application::ports::{SharedStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Configuration for the Redis tier.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Connection URL, e.g. `redis://127.0.0.1/`.
    pub url: String,
    /// Page size for SCAN-based prefix deletion.
    pub scan_count: usize,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1/".to_string(),
            scan_count: 100,
        }
    }
}

/// Redis implementation of the `SharedStore` port.
pub struct RedisStore {
    connection: Arc<RwLock<ConnectionManager>>,
    config: RedisStoreConfig,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Clone for RedisStore {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            config: self.config.clone(),
        }
    }
}

fn store_err(e: RedisError) -> StoreError {
    StoreError::new(e.to_string())
}

impl RedisStore {
    /// Connect with default configuration.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        Self::connect_with_config(RedisStoreConfig {
            url: url.to_string(),
            ..RedisStoreConfig::default()
        })
        .await
    }

    /// Connect with custom configuration.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn connect_with_config(config: RedisStoreConfig) -> Result<Self, RedisError> {
        let client = Client::open(config.url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self {
            connection: Arc::new(RwLock::new(connection)),
            config,
        })
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.write().await;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection.write().await;
        conn.get(key).await.map_err(store_err)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection.write().await;
        // SET PX keeps sub-second TTLs exact; rate-limit windows need that.
        let ttl_ms = ttl.as_millis().max(1) as u64;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut *conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.write().await;
        let removed: u64 = conn.del(key).await.map_err(store_err)?;
        Ok(removed > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        let pattern = format!("{}*", prefix);
        let mut conn = self.connection.write().await;
        let mut removed = 0u64;
        let mut cursor = 0u64;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.config.scan_count)
                .query_async(&mut *conn)
                .await
                .map_err(store_err)?;

            if !keys.is_empty() {
                let deleted: u64 = conn.del(&keys).await.map_err(store_err)?;
                removed += deleted;
            }

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(removed)
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.connection.write().await;
        let ttl_ms: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(store_err)?;

        // PTTL: -2 missing key, -1 no expiry.
        if ttl_ms < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_millis(ttl_ms as u64)))
        }
    }
}
