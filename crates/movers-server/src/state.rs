use std::sync::Arc;

use anyhow::Context;
use movers_core::config::{KvBackend, KvConfig};
use movers_core::kv::{MemoryKv, PrefixedKv, SharedKv};
use movers_core::time_util::{SharedClock, SystemClock};
use movers_engine::{RefreshEngine, Refresher, Scheduler};
use movers_sources::exclusion::{DirAssets, ExclusionFilter};
use movers_sources::registry::SourceRegistry;
use tracing::info;

use crate::config::{AppConfig, ImageProxyConfig};

/// Everything a handler needs, built once at startup.
pub struct AppState {
    pub engine: RefreshEngine,
    pub registry: SourceRegistry,
    pub kv: SharedKv,
    pub http: reqwest::Client,
    pub image_proxy: ImageProxyConfig,
}

impl AppState {
    pub async fn build(config: &AppConfig) -> anyhow::Result<Arc<Self>> {
        let clock: SharedClock = Arc::new(SystemClock);
        let kv = open_kv(&config.kv, clock.clone()).await?;

        let registry = SourceRegistry::build(config.coingecko.clone(), config.cmc.clone(), kv.clone())
            .context("building data sources")?;

        let assets = Arc::new(DirAssets::new(&config.server.static_dir));
        let exclusions = ExclusionFilter::new(assets, config.exclusions.files.clone());
        let refresher = Arc::new(Refresher::new(kv.clone(), clock.clone(), exclusions));
        let scheduler = Scheduler::new(config.engine.background_task_timeout());
        let engine = RefreshEngine::new(kv.clone(), clock, config.engine.clone(), refresher, scheduler);

        let http = crate::routes::image::build_client(&config.image_proxy).context("building image proxy client")?;

        Ok(Arc::new(Self {
            engine,
            registry,
            kv,
            http,
            image_proxy: config.image_proxy.clone(),
        }))
    }
}

async fn open_kv(cfg: &KvConfig, clock: SharedClock) -> anyhow::Result<SharedKv> {
    let kv: SharedKv = match cfg.backend {
        KvBackend::Memory => {
            info!("[state] kv backend: memory (state is lost on restart)");
            Arc::new(MemoryKv::new(clock))
        }
        KvBackend::Redis => open_redis(cfg).await?,
    };
    if cfg.key_prefix.is_empty() {
        Ok(kv)
    } else {
        Ok(Arc::new(PrefixedKv::new(kv, cfg.key_prefix.clone())))
    }
}

#[cfg(feature = "redis")]
async fn open_redis(cfg: &KvConfig) -> anyhow::Result<SharedKv> {
    let url = cfg
        .redis_url
        .as_deref()
        .context("kv.backend is redis but kv.redis_url is not set")?;
    let kv = movers_core::kv::RedisKv::connect(url)
        .await
        .with_context(|| format!("connecting to redis at {url}"))?;
    info!("[state] kv backend: redis");
    Ok(Arc::new(kv))
}

#[cfg(not(feature = "redis"))]
async fn open_redis(_cfg: &KvConfig) -> anyhow::Result<SharedKv> {
    anyhow::bail!("kv.backend is redis but this binary was built without the `redis` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_build_without_cmc_key() {
        let mut config = AppConfig::default();
        config.cmc.api_key = None;
        let state = AppState::build(&config).await.unwrap();
        assert_eq!(state.registry.cex().cache_key(), "market_data_v7");
        let err = state.registry.dex(movers_core::Network::Solana).err().unwrap();
        assert!(err.is_configuration());
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn redis_backend_needs_feature() {
        let mut config = AppConfig::default();
        config.kv.backend = KvBackend::Redis;
        assert!(AppState::build(&config).await.is_err());
    }
}
