//! Application config file.
//!
//! One JSON document, every section optional:
//!
//! ```json
//! {
//!   "server": { "bind": "0.0.0.0", "port": 8787, "static_dir": "static" },
//!   "kv": { "backend": "memory" },
//!   "engine": { "blocking_timeout_ms": 45000 },
//!   "coingecko": { "per_page": 250, "deep_pages": 6 },
//!   "cmc": { "api_key": "..." },
//!   "exclusions": { "files": ["/exclusions/stablecoins-exclusion-list.json"] },
//!   "image_proxy": { "ttl_secs": 604800 }
//! }
//! ```
//!
//! `CMC_PRO_API_KEY` in the environment wins over `cmc.api_key`.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use movers_core::config::{EngineConfig, KvConfig};
use movers_sources::cmc::config::{API_KEY_ENV, CmcConfig};
use movers_sources::coingecko::config::CoinGeckoConfig;
use movers_sources::exclusion::DEFAULT_EXCLUSION_FILES;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub kv: KvConfig,
    pub engine: EngineConfig,
    pub coingecko: CoinGeckoConfig,
    pub cmc: CmcConfig,
    pub exclusions: ExclusionConfig,
    pub image_proxy: ImageProxyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Directory served for every path the router does not handle.
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8787,
            static_dir: "static".into(),
        }
    }
}

/// Deny-list documents, as paths under `server.static_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    pub files: Vec<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            files: DEFAULT_EXCLUSION_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageProxyConfig {
    /// KV lifetime of a cached image.
    pub ttl_secs: u64,
    /// Images larger than this are passed through but not cached.
    pub max_cached_bytes: usize,
    pub request_timeout_ms: u64,
    /// Let the proxy fetch loopback and private-network addresses.
    pub allow_private_hosts: bool,
}

impl ImageProxyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ImageProxyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 7 * 24 * 3600,
            max_cached_bytes: 2 * 1024 * 1024,
            request_timeout_ms: 10_000,
            allow_private_hosts: false,
        }
    }
}

/// Load the config file, or defaults when `path` is `None`, then apply
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => AppConfig::default(),
    };
    Ok(apply_env(config, |k| std::env::var(k).ok()))
}

fn apply_env(mut config: AppConfig, lookup: impl Fn(&str) -> Option<String>) -> AppConfig {
    if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
        config.cmc.api_key = Some(key);
    }
    config
}
