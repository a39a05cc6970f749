//! Configuration primitives shared by the engine and the source clients.
//!
//! All settings are read from a single JSON config file (see
//! `movers-server::config`). The structs here are the pieces that more than one
//! crate needs: refresh timings, engine budgets, and KV backend selection.
//! Every field has a serde default, so a partial file (or none at all) yields a
//! working configuration.
//!
//! # Example fragment
//!
//! ```json
//! {
//!   "engine": { "blocking_timeout_ms": 45000 },
//!   "kv": { "backend": "redis", "redis_url": "redis://127.0.0.1:6379" },
//!   "coingecko": { "policy": { "soft_refresh_ms": 720000 } }
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// RefreshPolicy (per data source)
// ---------------------------------------------------------------------------

/// Freshness thresholds and TTLs for one logical cache key.
///
/// Injected into the refresh engine through the data source, never read from
/// global state.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RefreshPolicy {
    /// Age beyond which cached data triggers a refresh attempt.
    pub soft_refresh_ms: u64,

    /// Minimum gap between two refresh attempts on a stale payload.
    pub min_retry_delay_ms: u64,

    /// A lock marker younger than this counts as held.
    pub lock_timeout_ms: u64,

    /// KV expiry of the lock marker itself (self-heal backstop).
    pub lock_ttl_secs: u64,

    /// KV expiry of a successfully refreshed payload.
    pub payload_ttl_secs: u64,

    /// KV expiry of a re-stamped fallback payload after a failed refresh.
    pub fallback_ttl_secs: u64,
}

impl RefreshPolicy {
    /// Defaults for the centralized-exchange aggregator.
    pub fn cex() -> Self {
        Self::default()
    }

    /// Defaults for the DEX aggregator (slower upstream, longer soft window).
    pub fn dex() -> Self {
        Self {
            soft_refresh_ms: 18 * 60 * 1000,
            ..Self::default()
        }
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn payload_ttl(&self) -> Duration {
        Duration::from_secs(self.payload_ttl_secs)
    }

    pub fn fallback_ttl(&self) -> Duration {
        Duration::from_secs(self.fallback_ttl_secs)
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            soft_refresh_ms: 12 * 60 * 1000,
            min_retry_delay_ms: 2 * 60 * 1000,
            lock_timeout_ms: 120_000,
            lock_ttl_secs: 120,
            payload_ttl_secs: 48 * 3600,
            fallback_ttl_secs: 5 * 60,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig (shared by every source)
// ---------------------------------------------------------------------------

/// Wall-clock budgets of the refresh engine.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard timeout of a blocking (no-cache) fetch.
    pub blocking_timeout_ms: u64,

    /// How long a cold request waits for a peer's in-flight refresh.
    pub cold_start_wait_ms: u64,

    /// Poll interval while waiting on a peer.
    pub cold_start_poll_ms: u64,

    /// Upper bound on a background refresh task.
    pub background_task_timeout_ms: u64,

    /// How long shutdown waits for background refreshes to drain.
    pub shutdown_grace_ms: u64,
}

impl EngineConfig {
    pub fn blocking_timeout(&self) -> Duration {
        Duration::from_millis(self.blocking_timeout_ms)
    }

    pub fn cold_start_wait(&self) -> Duration {
        Duration::from_millis(self.cold_start_wait_ms)
    }

    pub fn cold_start_poll(&self) -> Duration {
        Duration::from_millis(self.cold_start_poll_ms.max(1))
    }

    pub fn background_task_timeout(&self) -> Duration {
        Duration::from_millis(self.background_task_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blocking_timeout_ms: 45_000,
            cold_start_wait_ms: 10_000,
            cold_start_poll_ms: 250,
            background_task_timeout_ms: 5 * 60 * 1000,
            shutdown_grace_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// KvConfig
// ---------------------------------------------------------------------------

/// Which KV backend to build.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KvBackend {
    /// Process-local store. State is lost on restart.
    #[default]
    Memory,
    /// Shared Redis instance (requires the `redis` cargo feature).
    Redis,
}

/// KV backend selection.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KvConfig {
    pub backend: KvBackend,

    /// Connection URL for the Redis backend.
    pub redis_url: Option<String>,

    /// Namespace prepended to every key (e.g. `"movers:"`).
    pub key_prefix: String,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            backend: KvBackend::Memory,
            redis_url: None,
            key_prefix: String::new(),
        }
    }
}
