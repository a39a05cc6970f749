//! Process-local KV backend.
//!
//! Entries live in a [`DashMap`] and carry an absolute expiry in epoch
//! milliseconds, evaluated lazily against the injected [`Clock`] on every read.
//! Expired entries are removed when touched, and writes sweep the whole map
//! at most once per [`SWEEP_INTERVAL`] so keys that are never read again do
//! not accumulate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tracing::debug;

use super::KvStore;
use crate::error::MoversError;
use crate::time_util::{SharedClock, SystemClock};

/// Minimum spacing between full expiry sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at_ms: u64,
}

impl Entry {
    fn is_live(&self, now: u64) -> bool {
        now < self.expires_at_ms
    }
}

/// In-memory TTL store with an atomic `put_if_absent`.
pub struct MemoryKv {
    entries: DashMap<String, Entry>,
    clock: SharedClock,
    last_sweep_ms: AtomicU64,
}

impl MemoryKv {
    pub fn new(clock: SharedClock) -> Self {
        let now = clock.now_ms();
        Self {
            entries: DashMap::new(),
            clock,
            last_sweep_ms: AtomicU64::new(now),
        }
    }

    /// Store backed by the system clock.
    pub fn system() -> Self {
        Self::new(std::sync::Arc::new(SystemClock))
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        self.last_sweep_ms.store(now, Ordering::Relaxed);
        before.saturating_sub(self.entries.len())
    }

    /// Sweep when the last one is older than [`SWEEP_INTERVAL`]. Must be
    /// called without holding a map guard.
    fn maybe_sweep(&self) {
        let now = self.clock.now_ms();
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) < SWEEP_INTERVAL.as_millis() as u64 {
            return;
        }
        // One writer wins the sweep; the others carry on.
        if self
            .last_sweep_ms
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let removed = self.sweep();
            if removed > 0 {
                debug!("[kv] swept {removed} expired entries");
            }
        }
    }

    fn expiry(&self, ttl: Duration) -> u64 {
        self.clock
            .now_ms()
            .saturating_add(ttl.as_millis() as u64)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MoversError> {
        let now = self.clock.now_ms();
        let value = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => None,
            None => return Ok(None),
        };
        // Expired: drop it outside the read guard.
        self.entries.remove_if(key, |_, e| !e.is_live(now));
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), MoversError> {
        self.maybe_sweep();
        let expires_at_ms = self.expiry(ttl);
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), MoversError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<Option<bool>, MoversError> {
        self.maybe_sweep();
        let now = self.clock.now_ms();
        let expires_at_ms = self.expiry(ttl);
        let written = match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    false
                } else {
                    occupied.insert(Entry {
                        value,
                        expires_at_ms,
                    });
                    true
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value,
                    expires_at_ms,
                });
                true
            }
        };
        Ok(Some(written))
    }
}
