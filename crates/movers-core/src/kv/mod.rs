//! Key-value store adapter.
//!
//! The refresh engine only needs four operations against a TTL'd, eventually
//! consistent store: `get`, `put`, `delete`, and an optional conditional write.
//! Nothing here offers transactions; `put_if_absent` is used to tighten the
//! advisory lock when a backend can do it atomically and reported as
//! unsupported (`Ok(None)`) otherwise.
//!
//! # Backends
//!
//! | Backend       | Module     | Conditional write | Notes                         |
//! |---------------|------------|-------------------|-------------------------------|
//! | [`MemoryKv`]  | `memory`   | yes               | process-local, clock-driven TTL |
//! | `RedisKv`     | `redis`    | yes (`SET NX EX`) | behind the `redis` feature    |
//! | [`PrefixedKv`]| this file  | delegates         | namespaces another store      |

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::MoversError;

pub use memory::MemoryKv;
#[cfg(feature = "redis")]
pub use self::redis::RedisKv;

/// Async TTL'd key-value store.
///
/// All reads are snapshot reads; readers never block writers.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MoversError>;

    /// Store `value` at `key`, expiring after `ttl`.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), MoversError>;

    /// Remove `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), MoversError>;

    /// Store `value` only if `key` is absent.
    ///
    /// Returns `Some(true)` if written, `Some(false)` if the key already
    /// existed, and `None` if the backend has no conditional write.
    async fn put_if_absent(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<Option<bool>, MoversError> {
        Ok(None)
    }
}

/// Shared store handle.
pub type SharedKv = Arc<dyn KvStore>;

// ---------------------------------------------------------------------------
// PrefixedKv
// ---------------------------------------------------------------------------

/// Prepends a fixed namespace to every key of an inner store.
pub struct PrefixedKv {
    inner: SharedKv,
    prefix: String,
}

impl PrefixedKv {
    pub fn new(inner: SharedKv, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl KvStore for PrefixedKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MoversError> {
        self.inner.get(&self.key(key)).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), MoversError> {
        self.inner.put(&self.key(key), value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), MoversError> {
        self.inner.delete(&self.key(key)).await
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<Option<bool>, MoversError> {
        self.inner.put_if_absent(&self.key(key), value, ttl).await
    }
}
