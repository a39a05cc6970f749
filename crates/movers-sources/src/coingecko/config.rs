//! CoinGecko client settings.

use std::time::Duration;

use movers_core::config::RefreshPolicy;
use serde::Deserialize;

use crate::paging::RetryPolicy;

/// Placeholder logo for entities without an image.
pub const GENERIC_COIN_IMAGE: &str = "https://cryptomovers.pages.dev/images/generic-coin.png";

/// Parsed CoinGecko configuration. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoinGeckoConfig {
    /// API root, e.g. `https://api.coingecko.com/api/v3`.
    pub base_url: String,
    /// Optional demo/pro key, sent as `x-cg-demo-api-key`.
    pub api_key: Option<String>,
    pub per_page: u32,
    /// Pages fetched on a cold (blocking) fetch.
    pub sprint_pages: usize,
    /// Pages fetched by background refreshes.
    pub deep_pages: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub inter_page_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub top_n: usize,
    pub cache_key: String,
    pub lock_key: String,
    pub placeholder_image: String,
    pub policy: RefreshPolicy,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".into(),
            api_key: None,
            per_page: 250,
            sprint_pages: 1,
            deep_pages: 6,
            max_attempts: 2,
            retry_backoff_ms: 2_000,
            inter_page_delay_ms: 2_000,
            request_timeout_ms: 20_000,
            top_n: 50,
            cache_key: "market_data_v7".into(),
            lock_key: "market_data_lock".into(),
            placeholder_image: GENERIC_COIN_IMAGE.into(),
            policy: RefreshPolicy::cex(),
        }
    }
}

impl CoinGeckoConfig {
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

    /// `/coins/markets` URL for a 1-based page number.
    pub fn markets_url(&self, page: usize) -> String {
        format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page={}&price_change_percentage=1h,24h,7d,30d,1y",
            self.base_url.trim_end_matches('/'),
            self.per_page,
            page
        )
    }
}
