//! In-process app with stub sources, for router tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use movers_core::config::{EngineConfig, RefreshPolicy};
use movers_core::kv::{MemoryKv, SharedKv};
use movers_core::time_util::ManualClock;
use movers_core::{ChangeSet, ChangeWindow, FetchMode, MoversError, Network, RawEntity};
use movers_engine::{RefreshEngine, Refresher, Scheduler};
use movers_sources::exclusion::ExclusionFilter;
use movers_sources::ranking::{RankSpec, SignPolicy};
use movers_sources::registry::SourceRegistry;
use movers_sources::{DataSource, FetchOutcome};
use tokio_util::sync::CancellationToken;

use crate::config::ImageProxyConfig;
use crate::state::AppState;

pub const T0: u64 = 1_700_000_000_000;

/// 50 entities spread evenly over -40%..+120%.
pub fn spread() -> FetchOutcome {
    let entities: Vec<RawEntity> = (0..50)
        .map(|i| RawEntity {
            id: format!("t{i}"),
            symbol: format!("T{i}"),
            name: format!("Token {i}"),
            price: Some(1.0),
            market_cap: Some(1e9),
            changes: ChangeSet {
                h24: Some(-40.0 + 160.0 * i as f64 / 49.0),
                ..Default::default()
            },
            ..Default::default()
        })
        .collect();
    FetchOutcome {
        scanned: entities.len(),
        entities,
        partial: false,
    }
}

/// Source that answers every fetch with the same result.
pub struct StubSource {
    name: String,
    cache_key: String,
    lock_key: String,
    policy: RefreshPolicy,
    rank: RankSpec,
    network: Option<Network>,
    result: Result<FetchOutcome, MoversError>,
}

impl StubSource {
    pub fn cex(result: Result<FetchOutcome, MoversError>) -> Arc<dyn DataSource> {
        Arc::new(Self {
            name: "stub-cex".into(),
            cache_key: "market_data_v7".into(),
            lock_key: "market_data_lock".into(),
            policy: RefreshPolicy::cex(),
            rank: RankSpec {
                window: ChangeWindow::H24,
                top_n: 20,
                sign: SignPolicy::Both,
                placeholder_image: "/generic.png".into(),
            },
            network: None,
            result,
        })
    }

    pub fn dex(network: Network, result: Result<FetchOutcome, MoversError>) -> Arc<dyn DataSource> {
        Arc::new(Self {
            name: format!("stub-dex:{network}"),
            cache_key: format!("dex_data_v7:{network}"),
            lock_key: format!("dex_data_lock:{network}"),
            policy: RefreshPolicy::dex(),
            rank: RankSpec {
                window: ChangeWindow::H24,
                top_n: 20,
                sign: SignPolicy::Split,
                placeholder_image: "/generic.png".into(),
            },
            network: Some(network),
            result,
        })
    }
}

#[async_trait]
impl DataSource for StubSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn cache_key(&self) -> &str {
        &self.cache_key
    }

    fn lock_key(&self) -> &str {
        &self.lock_key
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
        _mode: FetchMode,
        _cancel: &CancellationToken,
    ) -> Result<FetchOutcome, MoversError> {
        self.result.clone()
    }
}

/// DEX stubs for every network, all returning [`spread`].
pub fn dex_sources() -> HashMap<Network, Arc<dyn DataSource>> {
    std::iter::once(Network::All)
        .chain(Network::CONCRETE)
        .map(|n| (n, StubSource::dex(n, Ok(spread()))))
        .collect()
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub kv: SharedKv,
}

impl TestApp {
    pub fn router(&self) -> Router {
        crate::app(self.state.clone(), "/nonexistent-static-dir")
    }
}

/// Test app whose image proxy may reach loopback origins.
pub fn test_app(
    cex: Arc<dyn DataSource>,
    dex: HashMap<Network, Arc<dyn DataSource>>,
) -> TestApp {
    let image_proxy = ImageProxyConfig {
        allow_private_hosts: true,
        ..ImageProxyConfig::default()
    };
    test_app_with_image_proxy(cex, dex, image_proxy)
}

pub fn test_app_with_image_proxy(
    cex: Arc<dyn DataSource>,
    dex: HashMap<Network, Arc<dyn DataSource>>,
    image_proxy: ImageProxyConfig,
) -> TestApp {
    let clock = Arc::new(ManualClock::new(T0));
    let kv: SharedKv = Arc::new(MemoryKv::new(clock.clone()));
    let cfg = EngineConfig {
        cold_start_wait_ms: 0,
        ..EngineConfig::default()
    };
    let refresher = Arc::new(Refresher::new(kv.clone(), clock.clone(), ExclusionFilter::disabled()));
    let scheduler = Scheduler::new(cfg.background_task_timeout());
    let engine = RefreshEngine::new(kv.clone(), clock.clone(), cfg, refresher, scheduler);
    let state = Arc::new(AppState {
        engine,
        registry: SourceRegistry::from_parts(cex, dex),
        kv: kv.clone(),
        http: reqwest::Client::builder().no_proxy().build().unwrap(),
        image_proxy,
    });
    TestApp { state, clock, kv }
}
