//! Typed error definitions for the movers cache-and-refresh proxy.
//!
//! Provides [`MoversError`], the single failure taxonomy shared by the KV
//! adapter, the upstream source clients, and the refresh engine. All variants
//! implement `std::error::Error` via `thiserror`, so they integrate with
//! `anyhow::Result` in the composition layer.

use thiserror::Error;

/// Message surfaced to clients when a blocking fetch runs out of wall-clock
/// budget. Kept distinct from upstream failures so callers can pick a shorter
/// retry delay.
pub const TIMEOUT_MESSAGE: &str = "Request timeout. Try again.";

/// Domain-specific errors for the movers system.
#[derive(Debug, Clone, Error)]
pub enum MoversError {
    /// Upstream returned HTTP 429. Never retried within the same cycle.
    #[error("upstream rate limited: {0}")]
    RateLimited(String),

    /// Non-2xx or network failure after retries were exhausted.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Wall-clock budget of a blocking fetch was exceeded.
    #[error("{TIMEOUT_MESSAGE}")]
    Timeout,

    /// A stored payload could not be parsed. Treated as cache-absent.
    #[error("malformed cache entry at '{0}'")]
    MalformedCache(String),

    /// A required binding or credential is missing. Cannot self-heal.
    /// The message is shown to clients as-is.
    #[error("{0}")]
    Configuration(String),

    /// KV backend failure (connection, command, serialization).
    #[error("kv store error: {0}")]
    Store(String),

    /// Upstream body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// The cancellation token fired while a request was in flight.
    #[error("fetch cancelled")]
    Cancelled,

    /// A refresh produced zero entities and no prior payload exists.
    #[error("no data: {0}")]
    NoData(String),
}

impl MoversError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout | Self::Cancelled)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Configuration failures are the only class that should short-circuit to
    /// a 500 without consulting the cache.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<serde_json::Error> for MoversError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
