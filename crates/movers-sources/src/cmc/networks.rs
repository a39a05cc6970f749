//! DEX network slug discovery.
//!
//! CMC identifies networks by slugs that have changed over time (`bsc` vs
//! `bnb`), so the slugs are discovered from `/v4/dex/networks/list`, and
//! the resolved map is stored in the KV store for a day. When discovery
//! fails the built-in defaults are used and nothing is cached, so the next
//! refresh tries again.
//!
//! Name matching (first match per network wins):
//!
//! | Network    | Name contains          |
//! |------------|------------------------|
//! | `ethereum` | `ethereum`             |
//! | `bnb`      | `bnb` or `binance`     |
//! | `solana`   | `solana`               |
//! | `base`     | the word `base`        |

use std::collections::BTreeMap;

use movers_core::kv::SharedKv;
use movers_core::{MoversError, Network};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::CmcConfig;
use super::json_parser;
use crate::http;

/// Resolved slug per concrete network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSlugs(BTreeMap<String, String>);

impl Default for NetworkSlugs {
    fn default() -> Self {
        Self(
            Network::CONCRETE
                .iter()
                .filter_map(|n| Some((n.id().to_string(), n.default_slug()?.to_string())))
                .collect(),
        )
    }
}

impl NetworkSlugs {
    /// Slug for one network, falling back to its default.
    fn slug(&self, network: Network) -> Option<String> {
        self.0
            .get(network.id())
            .cloned()
            .or_else(|| network.default_slug().map(str::to_string))
    }

    /// The `network_slug` query value: one slug, or all of them for
    /// [`Network::All`].
    pub fn query_value(&self, network: Network) -> String {
        let nets: &[Network] = match network {
            Network::All => &Network::CONCRETE,
            _ => std::slice::from_ref(&network),
        };
        nets.iter()
            .filter_map(|n| self.slug(*n))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Match upstream `(lower-cased name, slug)` entries to our networks.
    pub fn from_listing(listing: &[(String, String)]) -> Option<Self> {
        let mut map = BTreeMap::new();
        for (name, slug) in listing {
            let Some(network) = classify(name) else {
                continue;
            };
            map.entry(network.id().to_string()).or_insert_with(|| slug.clone());
        }
        (!map.is_empty()).then_some(Self(map))
    }

    fn to_json(&self) -> Result<Vec<u8>, MoversError> {
        serde_json::to_vec(&self.0).map_err(|e| MoversError::Store(format!("encode network map: {e}")))
    }

    fn from_json(bytes: &[u8]) -> Option<Self> {
        let map: BTreeMap<String, String> = serde_json::from_slice(bytes).ok()?;
        (!map.is_empty()).then_some(Self(map))
    }
}

fn classify(name: &str) -> Option<Network> {
    if name.contains("ethereum") {
        Some(Network::Ethereum)
    } else if name.contains("bnb") || name.contains("binance") {
        Some(Network::Bnb)
    } else if name.contains("solana") {
        Some(Network::Solana)
    } else if name.split(|c: char| !c.is_alphanumeric()).any(|w| w == "base") {
        Some(Network::Base)
    } else {
        None
    }
}

/// Resolves and caches [`NetworkSlugs`].
pub struct NetworkDirectory {
    cfg: CmcConfig,
    client: reqwest::Client,
    api_key: String,
    kv: SharedKv,
}

impl NetworkDirectory {
    pub fn new(cfg: CmcConfig, client: reqwest::Client, api_key: String, kv: SharedKv) -> Self {
        Self {
            cfg,
            client,
            api_key,
            kv,
        }
    }

    /// Cached map, else a fresh discovery, else the defaults.
    pub async fn resolve(&self, cancel: &CancellationToken) -> NetworkSlugs {
        let key = self.cfg.networks_cache_key.as_str();
        match self.kv.get(key).await {
            Ok(Some(bytes)) => {
                if let Some(slugs) = NetworkSlugs::from_json(&bytes) {
                    return slugs;
                }
                debug!("[cmc] ignoring unreadable network map at {key}");
            }
            Ok(None) => {}
            Err(e) => warn!("[cmc] network map read failed: {e}"),
        }

        let discovered = tokio::select! {
            _ = cancel.cancelled() => Err(MoversError::Cancelled),
            r = self.discover() => r,
        };
        match discovered {
            Ok(slugs) => {
                info!("[cmc] discovered network slugs: {:?}", slugs.0);
                match slugs.to_json() {
                    Ok(bytes) => {
                        if let Err(e) = self.kv.put(key, bytes, self.cfg.networks_ttl()).await {
                            warn!("[cmc] network map write failed: {e}");
                        }
                    }
                    Err(e) => warn!("[cmc] {e}"),
                }
                slugs
            }
            Err(e) => {
                warn!("[cmc] network discovery failed, using defaults: {e}");
                NetworkSlugs::default()
            }
        }
    }

    async fn discover(&self) -> Result<NetworkSlugs, MoversError> {
        let req = self
            .client
            .get(self.cfg.networks_url())
            .header("X-CMC_PRO_API_KEY", &self.api_key);
        let body = http::send_json(req, "cmc networks").await?;
        let listing = json_parser::parse_networks(&body)?;
        NetworkSlugs::from_listing(&listing)
            .ok_or_else(|| MoversError::NoData("no known networks in listing".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use movers_core::kv::{KvStore, MemoryKv};

    use super::*;

    fn listing(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(n, s)| (n.to_string(), s.to_string())).collect()
    }

    #[test]
    fn defaults_cover_every_network() {
        let slugs = NetworkSlugs::default();
        assert_eq!(slugs.query_value(Network::Solana), "solana");
        assert_eq!(slugs.query_value(Network::All), "solana,ethereum,bnb,base");
    }

    #[test]
    fn listing_matches_by_name() {
        let slugs = NetworkSlugs::from_listing(&listing(&[
            ("ethereum", "ethereum"),
            ("bnb smart chain (bep20)", "bsc"),
            ("solana", "solana"),
            ("base", "base"),
            ("basechain testnet", "nope"),
            ("ethereum classic", "etc"),
        ]))
        .unwrap();
        assert_eq!(slugs.query_value(Network::Bnb), "bsc");
        assert_eq!(slugs.query_value(Network::Ethereum), "ethereum");
        assert_eq!(slugs.query_value(Network::Base), "base");
    }

    #[test]
    fn partial_listing_falls_back_per_network() {
        let slugs = NetworkSlugs::from_listing(&listing(&[("binance smart chain", "bsc")])).unwrap();
        assert_eq!(slugs.query_value(Network::All), "solana,ethereum,bsc,base");
        assert!(NetworkSlugs::from_listing(&listing(&[("tron", "tron")])).is_none());
    }

    #[tokio::test]
    async fn cached_map_is_used_without_network() {
        let kv: SharedKv = Arc::new(MemoryKv::system());
        let cfg = CmcConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        };
        kv.put(
            &cfg.networks_cache_key,
            br#"{"bnb":"bsc"}"#.to_vec(),
            std::time::Duration::from_secs(60),
        )
        .await
        .unwrap();
        let dir = NetworkDirectory::new(cfg, reqwest::Client::new(), "k".into(), kv);
        let slugs = dir.resolve(&CancellationToken::new()).await;
        assert_eq!(slugs.query_value(Network::Bnb), "bsc");
    }

    #[tokio::test]
    async fn failed_discovery_uses_defaults_and_caches_nothing() {
        let kv: SharedKv = Arc::new(MemoryKv::system());
        let cfg = CmcConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        };
        let key = cfg.networks_cache_key.clone();
        let dir = NetworkDirectory::new(cfg, reqwest::Client::new(), "k".into(), kv.clone());
        let slugs = dir.resolve(&CancellationToken::new()).await;
        assert_eq!(slugs, NetworkSlugs::default());
        assert!(kv.get(&key).await.unwrap().is_none());
    }
}
