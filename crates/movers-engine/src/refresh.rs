//! One refresh cycle for one source.
//!
//! Shared by the blocking (cold cache) and background (stale cache) paths:
//!
//! 1. reload the exclusion set
//! 2. fetch from the source
//! 3. no entities:
//!    - with a prior payload: re-stamp it as failed, store with the short TTL
//!    - without: return the error, store nothing
//! 4. exclude, rank, side-load metadata, format, store with the long TTL
//! 5. release the lock, whatever happened above

use std::sync::Arc;

use movers_core::kv::SharedKv;
use movers_core::time_util::SharedClock;
use movers_core::{CachedPayload, FetchMode, MoversError};
use movers_sources::DataSource;
use movers_sources::exclusion::ExclusionFilter;
use movers_sources::ranking;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::lock::RefreshLock;

/// How a refresh cycle ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// New ranked data was produced.
    Fresh,
    /// Upstream gave nothing; the prior payload was re-stamped as failed.
    Fallback,
}

/// Result of a successful cycle: the stored payload and its exact bytes.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub kind: RefreshKind,
    pub payload: CachedPayload,
    pub bytes: Vec<u8>,
}

/// Runs refresh cycles against the shared store.
pub struct Refresher {
    kv: SharedKv,
    clock: SharedClock,
    exclusions: ExclusionFilter,
}

impl Refresher {
    pub fn new(kv: SharedKv, clock: SharedClock, exclusions: ExclusionFilter) -> Self {
        Self {
            kv,
            clock,
            exclusions,
        }
    }

    pub fn lock_for(&self, source: &dyn DataSource) -> RefreshLock {
        let policy = source.policy();
        RefreshLock::new(
            self.kv.clone(),
            source.lock_key(),
            policy.lock_timeout_ms,
            policy.lock_ttl(),
        )
    }

    /// Run one cycle and release the source's lock afterwards.
    pub async fn run(
        &self,
        source: Arc<dyn DataSource>,
        mode: FetchMode,
        prior: Option<CachedPayload>,
        cancel: CancellationToken,
    ) -> Result<RefreshOutcome, MoversError> {
        let result = self.cycle(source.as_ref(), mode, prior, &cancel).await;
        self.lock_for(source.as_ref()).release().await;
        result
    }

    async fn cycle(
        &self,
        source: &dyn DataSource,
        mode: FetchMode,
        prior: Option<CachedPayload>,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome, MoversError> {
        let name = source.name();
        let attempt_ms = self.clock.now_ms();
        let exclusions = self.exclusions.load().await;

        let fetched = match source.fetch(mode, cancel).await {
            Ok(outcome) if !outcome.entities.is_empty() => outcome,
            Ok(_) => {
                return self
                    .fall_back(source, prior, attempt_ms, MoversError::NoData("upstream returned no data".into()))
                    .await;
            }
            Err(e) => return self.fall_back(source, prior, attempt_ms, e).await,
        };

        let scanned = fetched.scanned.max(fetched.entities.len());
        let (kept, excluded_count) = exclusions.apply(fetched.entities);
        let spec = source.rank_spec();
        let mut selection = ranking::select(&kept, spec);
        source.enrich(&mut selection, cancel).await;
        let (gainers, losers) = ranking::format(&selection, spec);

        let payload = CachedPayload {
            timestamp: self.clock.now_ms(),
            last_update_attempt: attempt_ms,
            last_update_failed: false,
            last_error: None,
            total_scanned: scanned,
            excluded_count,
            is_partial: fetched.partial,
            network: source.network().map(|n| n.id().to_string()),
            gainers,
            losers,
        };
        let bytes = payload.to_vec()?;
        if let Err(e) = self
            .kv
            .put(source.cache_key(), bytes.clone(), source.policy().payload_ttl())
            .await
        {
            warn!("[refresh] {name}: storing payload failed: {e}");
        }

        info!(
            "[refresh] {name} {mode}: {} gainers / {} losers from {scanned} scanned ({excluded_count} excluded{})",
            payload.gainers.len(),
            payload.losers.len(),
            if payload.is_partial { ", partial" } else { "" }
        );
        Ok(RefreshOutcome {
            kind: RefreshKind::Fresh,
            payload,
            bytes,
        })
    }

    /// Keep the prior payload alive with failure metadata, or give up.
    async fn fall_back(
        &self,
        source: &dyn DataSource,
        prior: Option<CachedPayload>,
        attempt_ms: u64,
        error: MoversError,
    ) -> Result<RefreshOutcome, MoversError> {
        let name = source.name();
        let Some(prior) = prior else {
            warn!("[refresh] {name}: no data and no prior payload: {error}");
            return Err(error);
        };

        let payload = prior.restamp_failure(attempt_ms, error.to_string());
        let bytes = payload.to_vec()?;
        if let Err(e) = self
            .kv
            .put(source.cache_key(), bytes.clone(), source.policy().fallback_ttl())
            .await
        {
            warn!("[refresh] {name}: storing fallback failed: {e}");
        }
        warn!("[refresh] {name}: refresh failed, kept payload from {}: {error}", payload.timestamp);
        Ok(RefreshOutcome {
            kind: RefreshKind::Fallback,
            payload,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use movers_core::kv::{KvStore, MemoryKv};
    use movers_core::time_util::ManualClock;
    use movers_core::LockMarker;
    use movers_sources::FetchOutcome;
    use movers_sources::exclusion::AssetSource;

    use super::*;
    use crate::testing::*;

    struct OneList(&'static str);

    #[async_trait]
    impl AssetSource for OneList {
        async fn fetch(&self, _path: &str) -> Result<Vec<u8>, MoversError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    fn setup(list: &'static str) -> (Arc<ManualClock>, SharedKv, Refresher) {
        let clock = Arc::new(ManualClock::new(T0));
        let kv: SharedKv = Arc::new(MemoryKv::new(clock.clone()));
        let filter = ExclusionFilter::new(Arc::new(OneList(list)), vec!["/exclusions/a.json".into()]);
        let refresher = Refresher::new(kv.clone(), clock.clone(), filter);
        (clock, kv, refresher)
    }

    #[tokio::test]
    async fn excluded_symbols_never_ranked() {
        let (_, _, refresher) = setup(r#"["usdt", "MOON"]"#);
        let mut outcome = spread();
        // The most extreme movers are on the deny-list.
        outcome.entities.push(entity("MOON", 5_000.0));
        outcome.entities.push(entity("USDT", -99.0));
        outcome.scanned = outcome.entities.len();
        let src = Arc::new(FakeSource::new(Ok(outcome)));

        let out = refresher
            .run(src, FetchMode::Sprint, None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.kind, RefreshKind::Fresh);
        assert_eq!(out.payload.excluded_count, 2);
        assert_eq!(out.payload.total_scanned, 52);
        let all = out.payload.gainers.iter().chain(out.payload.losers.iter());
        assert!(all.clone().all(|e| e.symbol != "MOON" && e.symbol != "USDT"));
        assert!((out.payload.gainers[0].change_24h - 120.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn partial_fetch_is_flagged() {
        let (_, _, refresher) = setup("[]");
        let mut outcome = spread();
        outcome.partial = true;
        let src = Arc::new(FakeSource::new(Ok(outcome)));
        let out = refresher
            .run(src, FetchMode::DeepScan, None, CancellationToken::new())
            .await
            .unwrap();
        assert!(out.payload.is_partial);
    }

    #[tokio::test]
    async fn fallback_expires_after_short_ttl() {
        let (clock, kv, refresher) = setup("[]");
        let prior = {
            let src = Arc::new(FakeSource::new(Ok(spread())));
            refresher
                .run(src, FetchMode::Sprint, None, CancellationToken::new())
                .await
                .unwrap()
                .payload
        };

        clock.advance(Duration::from_secs(13 * 60));
        let failing = Arc::new(FakeSource::new(Err(MoversError::RateLimited("HTTP 429".into()))));
        let out = refresher
            .run(failing, FetchMode::DeepScan, Some(prior.clone()), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.kind, RefreshKind::Fallback);
        assert_eq!(out.payload.timestamp, prior.timestamp);
        assert_eq!(out.payload.gainers, prior.gainers);
        assert!(out.payload.last_error.as_deref().unwrap().contains("429"));

        clock.advance(Duration::from_secs(5 * 60));
        assert!(kv.get("market_data_v7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lock_released_even_on_error() {
        let (_, kv, refresher) = setup("[]");
        kv.put("market_data_lock", LockMarker::new(T0).encode(), Duration::from_secs(120))
            .await
            .unwrap();
        let src = Arc::new(FakeSource::new(Err(MoversError::Unavailable("down".into()))));
        let err = refresher
            .run(src, FetchMode::Sprint, None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MoversError::Unavailable(_)));
        assert!(kv.get("market_data_lock").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unrankable_entities_dropped() {
        let (_, _, refresher) = setup("[]");
        let mut ghost = entity("GHOST", 500.0);
        ghost.price = None;
        let src = Arc::new(FakeSource::new(Ok(FetchOutcome {
            entities: vec![ghost, entity("REAL", 1.0)],
            partial: false,
            scanned: 2,
        })));
        let out = refresher
            .run(src, FetchMode::Sprint, None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.payload.gainers.len(), 1);
        assert_eq!(out.payload.gainers[0].symbol, "REAL");
    }
}
