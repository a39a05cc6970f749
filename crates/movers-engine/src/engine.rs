//! Cache freshness state machine.
//!
//! Nothing is stored about the state itself; every request derives it from two
//! KV reads (payload and lock marker) and takes the first matching row:
//!
//! | # | Condition                                   | Action                           | `X-Source`               |
//! |---|---------------------------------------------|----------------------------------|--------------------------|
//! | 1 | cached, `age < soft_refresh`                | serve cached                     | `Cache-Fresh`            |
//! | 2 | cached, lock held                           | serve cached                     | `Cache-UpdateInProgress` |
//! | 3 | cached, last attempt `< min_retry_delay` ago| serve cached                     | `Cache-RateLimited`      |
//! | 4 | cached, retry delay elapsed                 | lock, background deep scan, serve cached | `Cache-Proactive` |
//! | 5 | not cached                                  | lock, blocking sprint with timeout | `Live-Fetch`           |
//!
//! Row 5 details:
//!
//! - A live peer lock makes the request poll the cache for a while first; a
//!   payload that shows up is served as `Cache-UpdateInProgress`.
//! - If the blocking fetch fails, the cache is read once more and a payload
//!   written by a peer meanwhile is served as `Cache-Fallback-Error`.
//!
//! Cached rows return the stored bytes untouched.

use std::sync::Arc;
use std::time::Duration;

use movers_core::config::EngineConfig;
use movers_core::kv::SharedKv;
use movers_core::time_util::SharedClock;
use movers_core::{CachedPayload, FetchMode, MoversError, ServeSource};
use movers_sources::DataSource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::lock::Acquire;
use crate::refresh::{RefreshKind, Refresher};
use crate::scheduler::Scheduler;

/// A response body and the branch that produced it.
#[derive(Debug, Clone)]
pub struct Served {
    pub body: Vec<u8>,
    pub source: ServeSource,
}

impl Served {
    fn new(body: Vec<u8>, source: ServeSource) -> Self {
        Self { body, source }
    }
}

/// A parsed cache entry with its raw bytes.
struct Cached {
    bytes: Vec<u8>,
    payload: CachedPayload,
}

pub struct RefreshEngine {
    kv: SharedKv,
    clock: SharedClock,
    cfg: EngineConfig,
    refresher: Arc<Refresher>,
    scheduler: Scheduler,
}

impl RefreshEngine {
    pub fn new(
        kv: SharedKv,
        clock: SharedClock,
        cfg: EngineConfig,
        refresher: Arc<Refresher>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            kv,
            clock,
            cfg,
            refresher,
            scheduler,
        }
    }

    /// Decide and execute the serving strategy for `source`.
    pub async fn serve(&self, source: Arc<dyn DataSource>) -> Result<Served, MoversError> {
        let name = source.name().to_string();
        let policy = source.policy().clone();
        let lock = self.refresher.lock_for(source.as_ref());
        let now = self.clock.now_ms();

        let (cached, lock_held) = tokio::join!(self.read_cached(source.cache_key()), lock.is_held(now));

        if let Some(cached) = cached {
            let age = cached.payload.age_ms(now);
            let tag = if age < policy.soft_refresh_ms {
                ServeSource::CacheFresh
            } else if lock_held {
                ServeSource::CacheUpdateInProgress
            } else if cached.payload.since_last_attempt_ms(now) < policy.min_retry_delay_ms {
                ServeSource::CacheRateLimited
            } else if lock.acquire(now).await.is_owned() {
                let refresher = self.refresher.clone();
                let prior = cached.payload.clone();
                let task_source = source.clone();
                self.scheduler.spawn(format!("refresh {name}"), move |cancel| async move {
                    refresher
                        .run(task_source, FetchMode::DeepScan, Some(prior), cancel)
                        .await
                });
                ServeSource::CacheProactive
            } else {
                // Lost the conditional write to a peer.
                ServeSource::CacheUpdateInProgress
            };
            debug!("[engine] {name}: age={age}ms -> {tag}");
            return Ok(Served::new(cached.bytes, tag));
        }

        // Cold path.
        let mut waited = false;
        if lock_held {
            waited = true;
            if let Some(found) = self.wait_for_peer(&name, source.cache_key()).await {
                return Ok(found);
            }
        }
        if lock.acquire(self.clock.now_ms()).await == Acquire::Lost && !waited {
            if let Some(found) = self.wait_for_peer(&name, source.cache_key()).await {
                return Ok(found);
            }
        }
        // Either we own the lock or the peer did not deliver in time.

        match self.blocking_refresh(source.clone()).await {
            Ok(outcome) => {
                let tag = match outcome.kind {
                    RefreshKind::Fresh => ServeSource::LiveFetch,
                    RefreshKind::Fallback => ServeSource::CacheFallbackError,
                };
                info!("[engine] {name}: cold fetch served -> {tag}");
                Ok(Served::new(outcome.bytes, tag))
            }
            Err(e) => {
                if let Some(cached) = self.read_cached(source.cache_key()).await {
                    warn!("[engine] {name}: live fetch failed ({e}), serving peer payload");
                    return Ok(Served::new(cached.bytes, ServeSource::CacheFallbackError));
                }
                warn!("[engine] {name}: live fetch failed with no cached data: {e}");
                Err(e)
            }
        }
    }

    /// Read and parse the cache key. Missing, unreadable and malformed all
    /// read as absent.
    async fn read_cached(&self, key: &str) -> Option<Cached> {
        let bytes = match self.kv.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("[engine] cache read {key} failed: {e}");
                return None;
            }
        };
        match CachedPayload::from_slice(key, &bytes) {
            Ok(payload) => Some(Cached { bytes, payload }),
            Err(e) => {
                warn!("[engine] {e}, treating as absent");
                None
            }
        }
    }

    /// Poll the cache while a peer's cold fetch is in flight.
    async fn wait_for_peer(&self, name: &str, key: &str) -> Option<Served> {
        let wait = self.cfg.cold_start_wait();
        if wait.is_zero() {
            return None;
        }
        debug!("[engine] {name}: cold cache with a live lock, waiting up to {wait:?}");
        let deadline = tokio::time::Instant::now() + wait;
        let poll = self.cfg.cold_start_poll();
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(poll.min(deadline - tokio::time::Instant::now())).await;
            if let Some(cached) = self.read_cached(key).await {
                debug!("[engine] {name}: peer delivered during cold wait");
                return Some(Served::new(cached.bytes, ServeSource::CacheUpdateInProgress));
            }
        }
        None
    }

    /// Sprint refresh bounded by the blocking timeout.
    ///
    /// On timeout the cycle is cancelled but still awaited, so it releases
    /// its lock before [`MoversError::Timeout`] is returned.
    async fn blocking_refresh(
        &self,
        source: Arc<dyn DataSource>,
    ) -> Result<crate::refresh::RefreshOutcome, MoversError> {
        let cancel = CancellationToken::new();
        let run = self.refresher.run(source, FetchMode::Sprint, None, cancel.clone());
        tokio::pin!(run);
        let timeout = self.cfg.blocking_timeout();

        tokio::select! {
            r = &mut run => r,
            _ = tokio::time::sleep(timeout) => {
                cancel.cancel();
                match run.await {
                    Ok(outcome) => Ok(outcome),
                    Err(_) => Err(MoversError::Timeout),
                }
            }
        }
    }

    /// Wait for background refreshes on shutdown.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.scheduler.shutdown(grace).await
    }
}
