//! Test doubles shared by the engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use movers_core::config::{EngineConfig, RefreshPolicy};
use movers_core::kv::{MemoryKv, SharedKv};
use movers_core::time_util::ManualClock;
use movers_core::{ChangeSet, ChangeWindow, FetchMode, MoversError, Network, RawEntity};
use movers_sources::exclusion::ExclusionFilter;
use movers_sources::ranking::{RankSpec, SignPolicy};
use movers_sources::{DataSource, FetchOutcome};
use tokio_util::sync::CancellationToken;

use crate::{RefreshEngine, Refresher, Scheduler};

pub const T0: u64 = 1_700_000_000_000;
pub const MIN: u64 = 60_000;

pub fn entity(symbol: &str, change: f64) -> RawEntity {
    RawEntity {
        id: symbol.to_lowercase(),
        symbol: symbol.into(),
        name: symbol.into(),
        price: Some(1.0),
        market_cap: Some(1e9),
        changes: ChangeSet {
            h24: Some(change),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// 50 entities spread evenly over -40%..+120%.
pub fn spread() -> FetchOutcome {
    let entities: Vec<RawEntity> = (0..50)
        .map(|i| entity(&format!("T{i}"), -40.0 + 160.0 * i as f64 / 49.0))
        .collect();
    FetchOutcome {
        scanned: entities.len(),
        entities,
        partial: false,
    }
}

/// Scripted [`DataSource`]. Replays queued results, then repeats `default`.
pub struct FakeSource {
    policy: RefreshPolicy,
    rank: RankSpec,
    network: Option<Network>,
    queue: Mutex<VecDeque<Result<FetchOutcome, MoversError>>>,
    default: Result<FetchOutcome, MoversError>,
    delay: Duration,
    peer_write: Option<(SharedKv, Vec<u8>)>,
    calls: AtomicUsize,
    modes: Mutex<Vec<FetchMode>>,
}

impl FakeSource {
    pub fn new(default: Result<FetchOutcome, MoversError>) -> Self {
        Self {
            policy: RefreshPolicy::cex(),
            rank: RankSpec {
                window: ChangeWindow::H24,
                top_n: 20,
                sign: SignPolicy::Both,
                placeholder_image: "/generic.png".into(),
            },
            network: None,
            queue: Mutex::new(VecDeque::new()),
            default,
            delay: Duration::ZERO,
            peer_write: None,
            calls: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self.rank.sign = SignPolicy::Split;
        self
    }

    /// Store `bytes` at the cache key during every fetch, as a racing peer would.
    pub fn with_peer_write(mut self, kv: SharedKv, bytes: Vec<u8>) -> Self {
        self.peer_write = Some((kv, bytes));
        self
    }

    pub fn push(&self, result: Result<FetchOutcome, MoversError>) {
        self.queue.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn modes(&self) -> Vec<FetchMode> {
        self.modes.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn cache_key(&self) -> &str {
        "market_data_v7"
    }

    fn lock_key(&self) -> &str {
        "market_data_lock"
    }

    fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    fn rank_spec(&self) -> &RankSpec {
        &self.rank
    }

    fn network(&self) -> Option<Network> {
        self.network
    }

    async fn fetch(
        &self,
        mode: FetchMode,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, MoversError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.modes.lock().unwrap().push(mode);
        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(MoversError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        if let Some((kv, bytes)) = &self.peer_write {
            kv.put(self.cache_key(), bytes.clone(), Duration::from_secs(60)).await?;
        }
        let queued = self.queue.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| self.default.clone())
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub kv: SharedKv,
    pub engine: RefreshEngine,
}

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        blocking_timeout_ms: 2_000,
        cold_start_wait_ms: 0,
        cold_start_poll_ms: 5,
        background_task_timeout_ms: 5_000,
        shutdown_grace_ms: 5_000,
    }
}

pub fn harness(cfg: EngineConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(T0));
    let kv: SharedKv = Arc::new(MemoryKv::new(clock.clone()));
    let refresher = Arc::new(Refresher::new(kv.clone(), clock.clone(), ExclusionFilter::disabled()));
    let scheduler = Scheduler::new(cfg.background_task_timeout());
    let engine = RefreshEngine::new(kv.clone(), clock.clone(), cfg, refresher, scheduler);
    Harness { clock, kv, engine }
}
