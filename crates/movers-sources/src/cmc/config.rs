//! CoinMarketCap DEX client settings.

use std::time::Duration;

use movers_core::config::RefreshPolicy;
use movers_core::{MoversError, Network};
use serde::Deserialize;

use crate::coingecko::config::GENERIC_COIN_IMAGE;
use crate::paging::RetryPolicy;

/// Environment variable that overrides `api_key`.
pub const API_KEY_ENV: &str = "CMC_PRO_API_KEY";

/// Message surfaced when no API key is configured.
pub const MISSING_KEY_MESSAGE: &str = "Server Config Error: Missing CMC Key";

/// Order of `spot-pairs/latest` by 24h change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    /// Biggest gainers first.
    Desc,
    /// Biggest losers first.
    Asc,
}

impl SortDir {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desc => "desc",
            Self::Asc => "asc",
        }
    }
}

/// Parsed CMC configuration. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CmcConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Pairs per `spot-pairs/latest` page.
    pub page_limit: u32,
    pub sprint_pages: usize,
    pub deep_pages: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub inter_page_delay_ms: u64,
    pub request_timeout_ms: u64,
    /// Pools below this USD liquidity are dropped.
    pub liquidity_min: f64,
    /// FDV above which a pool must clear `fake_mc_min_liquidity`.
    pub fake_mc_threshold: f64,
    pub fake_mc_min_liquidity: f64,
    /// Most asset ids sent in one logo side-load.
    pub logo_limit: usize,
    pub top_n: usize,
    /// Cache key is `{cache_key_prefix}:{network}`.
    pub cache_key_prefix: String,
    /// Lock key is `{lock_key_prefix}:{network}`.
    pub lock_key_prefix: String,
    pub networks_cache_key: String,
    pub networks_ttl_secs: u64,
    pub placeholder_image: String,
    pub policy: RefreshPolicy,
}

impl Default for CmcConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pro-api.coinmarketcap.com".into(),
            api_key: None,
            page_limit: 100,
            sprint_pages: 1,
            deep_pages: 3,
            max_attempts: 2,
            retry_backoff_ms: 2_000,
            inter_page_delay_ms: 0,
            request_timeout_ms: 20_000,
            liquidity_min: 20_000.0,
            fake_mc_threshold: 3_000_000.0,
            fake_mc_min_liquidity: 150_000.0,
            logo_limit: 100,
            top_n: 20,
            cache_key_prefix: "dex_data_v7".into(),
            lock_key_prefix: "dex_data_lock".into(),
            networks_cache_key: "dex_networks_map".into(),
            networks_ttl_secs: 24 * 3600,
            placeholder_image: GENERIC_COIN_IMAGE.into(),
            policy: RefreshPolicy::dex(),
        }
    }
}

impl CmcConfig {
    /// The configured key, trimmed. Missing or blank is a configuration error.
    pub fn require_api_key(&self) -> Result<&str, MoversError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| MoversError::Configuration(MISSING_KEY_MESSAGE.into()))
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
            inter_page_delay: Duration::from_millis(self.inter_page_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn networks_ttl(&self) -> Duration {
        Duration::from_secs(self.networks_ttl_secs)
    }

    pub fn cache_key(&self, network: Network) -> String {
        format!("{}:{}", self.cache_key_prefix, network.id())
    }

    pub fn lock_key(&self, network: Network) -> String {
        format!("{}:{}", self.lock_key_prefix, network.id())
    }

    fn root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// `spot-pairs/latest` URL. `slugs` is a comma-separated network list.
    pub fn pairs_url(&self, slugs: &str, dir: SortDir, scroll_id: Option<&str>) -> String {
        let mut url = format!(
            "{}/v4/dex/spot-pairs/latest?limit={}&sort=percent_change_24h&sort_dir={}&network_slug={}&liquidity_min={}",
            self.root(),
            self.page_limit,
            dir.as_str(),
            urlencoding::encode(slugs),
            self.liquidity_min
        );
        if let Some(id) = scroll_id {
            url.push_str("&scroll_id=");
            url.push_str(&urlencoding::encode(id));
        }
        url
    }

    pub fn networks_url(&self) -> String {
        format!("{}/v4/dex/networks/list", self.root())
    }

    pub fn info_url(&self, ids: &[u64]) -> String {
        let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
        format!("{}/v2/cryptocurrency/info?id={}", self.root(), ids.join(","))
    }
}
