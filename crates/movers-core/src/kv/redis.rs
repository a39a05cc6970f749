//! Redis KV backend (feature `redis`).
//!
//! Uses a multiplexed [`ConnectionManager`] that reconnects on its own; each
//! call clones the manager handle, so the store is `Sync` without a mutex.
//!
//! | Operation       | Command            |
//! |-----------------|--------------------|
//! | `get`           | `GET key`          |
//! | `put`           | `SET key v EX ttl` |
//! | `delete`        | `DEL key`          |
//! | `put_if_absent` | `SET key v NX EX ttl` |

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use super::KvStore;
use crate::error::MoversError;

/// Redis-backed TTL store.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self, MoversError> {
        let client = redis::Client::open(url)
            .map_err(|e| MoversError::Configuration(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| MoversError::Store(format!("redis connect failed: {e}")))?;
        info!("[kv] connected to redis at {url}");
        Ok(Self { conn })
    }
}

fn store_err(op: &str, e: redis::RedisError) -> MoversError {
    MoversError::Store(format!("redis {op} failed: {e}"))
}

/// Redis rejects `EX 0`.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MoversError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(|e| store_err("GET", e))?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), MoversError> {
        let mut conn = self.conn.clone();
        let secs = ttl_secs(ttl);
        let _: () = conn
            .set_ex(key, value, secs)
            .await
            .map_err(|e| store_err("SET", e))?;
        debug!("[kv] SET {key} (ttl={secs}s)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), MoversError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(|e| store_err("DEL", e))?;
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<Option<bool>, MoversError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| store_err("SET NX", e))?;
        Ok(Some(reply.is_some()))
    }
}
