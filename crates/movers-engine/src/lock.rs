//! Advisory refresh lock.
//!
//! A lock is a [`LockMarker`] (start instant, epoch ms) stored at the source's
//! lock key with a short TTL. It is *held* while the marker is younger than
//! `lock_timeout_ms`. The TTL is the backstop for a holder that dies before
//! releasing.
//!
//! Acquisition uses `put_if_absent` when the store has it. Otherwise it is a
//! plain write and two requests may both believe they own the lock; both then
//! refresh and the last write wins.
//!
//! ```text
//! put_if_absent ─► Some(true)  ─► Acquired
//!               ├► Some(false) ─► marker still held? ─► Lost
//!               │                                   └► overwrite ─► Acquired
//!               └► None        ─► put ─► Advisory
//! ```

use std::time::Duration;

use movers_core::kv::SharedKv;
use movers_core::LockMarker;
use tracing::{debug, warn};

/// Result of an acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// Conditional write succeeded.
    Acquired,
    /// Plain write; exclusivity is not guaranteed.
    Advisory,
    /// Another holder's marker is live.
    Lost,
}

impl Acquire {
    pub fn is_owned(self) -> bool {
        !matches!(self, Self::Lost)
    }
}

/// Lock for one lock key.
#[derive(Clone)]
pub struct RefreshLock {
    kv: SharedKv,
    key: String,
    timeout_ms: u64,
    ttl: Duration,
}

impl RefreshLock {
    pub fn new(kv: SharedKv, key: impl Into<String>, timeout_ms: u64, ttl: Duration) -> Self {
        Self {
            kv,
            key: key.into(),
            timeout_ms,
            ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current marker, if any. Read failures and garbage read as absent.
    pub async fn marker(&self) -> Option<LockMarker> {
        match self.kv.get(&self.key).await {
            Ok(Some(bytes)) => LockMarker::decode(&bytes),
            Ok(None) => None,
            Err(e) => {
                warn!("[lock] read {} failed: {e}", self.key);
                None
            }
        }
    }

    /// Whether a live marker exists at `now`.
    pub async fn is_held(&self, now: u64) -> bool {
        self.marker()
            .await
            .is_some_and(|m| m.is_held(now, self.timeout_ms))
    }

    /// Try to take the lock at `now`.
    ///
    /// Store failures are logged and reported as [`Acquire::Advisory`]: the
    /// refresh proceeds without a marker rather than not at all.
    pub async fn acquire(&self, now: u64) -> Acquire {
        let marker = LockMarker::new(now);
        match self.kv.put_if_absent(&self.key, marker.encode(), self.ttl).await {
            Ok(Some(true)) => {
                debug!("[lock] acquired {}", self.key);
                Acquire::Acquired
            }
            Ok(Some(false)) => {
                if self.is_held(now).await {
                    debug!("[lock] {} held by a peer", self.key);
                    return Acquire::Lost;
                }
                // Present but past the timeout: take it over.
                self.write(marker).await;
                Acquire::Acquired
            }
            Ok(None) => {
                self.write(marker).await;
                Acquire::Advisory
            }
            Err(e) => {
                warn!("[lock] conditional write {} failed: {e}", self.key);
                self.write(marker).await;
                Acquire::Advisory
            }
        }
    }

    async fn write(&self, marker: LockMarker) {
        if let Err(e) = self.kv.put(&self.key, marker.encode(), self.ttl).await {
            warn!("[lock] write {} failed: {e}", self.key);
        }
    }

    /// Delete the marker. Failure is logged; the TTL cleans up.
    pub async fn release(&self) {
        match self.kv.delete(&self.key).await {
            Ok(()) => debug!("[lock] released {}", self.key),
            Err(e) => warn!("[lock] release {} failed, TTL will expire it: {e}", self.key),
        }
    }
}
