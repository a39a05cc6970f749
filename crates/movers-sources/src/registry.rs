//! Source registry: builds every configured [`DataSource`] once at startup.
//!
//! The CEX source always exists. DEX sources need a CMC API key; without one
//! the registry keeps the configuration error and hands it back for every DEX
//! lookup instead of failing startup.

use std::collections::HashMap;
use std::sync::Arc;

use movers_core::kv::SharedKv;
use movers_core::{MoversError, Network};
use tracing::{info, warn};

use crate::DataSource;
use crate::cmc::config::CmcConfig;
use crate::cmc::{CmcDex, CmcShared};
use crate::coingecko::CoinGecko;
use crate::coingecko::config::CoinGeckoConfig;

pub struct SourceRegistry {
    cex: Arc<dyn DataSource>,
    dex: HashMap<Network, Arc<dyn DataSource>>,
    dex_error: Option<MoversError>,
}

impl SourceRegistry {
    pub fn build(cg: CoinGeckoConfig, cmc: CmcConfig, kv: SharedKv) -> Result<Self, MoversError> {
        let cex: Arc<dyn DataSource> = Arc::new(CoinGecko::new(cg)?);

        let (dex, dex_error) = match CmcShared::new(cmc, kv) {
            Ok(shared) => {
                let dex = std::iter::once(Network::All)
                    .chain(Network::CONCRETE)
                    .map(|n| (n, Arc::new(CmcDex::new(shared.clone(), n)) as Arc<dyn DataSource>))
                    .collect();
                (dex, None)
            }
            Err(e) => {
                warn!("[registry] DEX sources disabled: {e}");
                (HashMap::new(), Some(e))
            }
        };

        info!("[registry] sources: {} + {} DEX network(s)", cex.name(), dex.len());
        Ok(Self { cex, dex, dex_error })
    }

    /// Registry over explicit sources.
    pub fn from_parts(cex: Arc<dyn DataSource>, dex: HashMap<Network, Arc<dyn DataSource>>) -> Self {
        Self {
            cex,
            dex,
            dex_error: None,
        }
    }

    pub fn cex(&self) -> Arc<dyn DataSource> {
        self.cex.clone()
    }

    /// Source for `network`, falling back to the all-networks aggregate.
    pub fn dex(&self, network: Network) -> Result<Arc<dyn DataSource>, MoversError> {
        if let Some(e) = &self.dex_error {
            return Err(e.clone());
        }
        self.dex
            .get(&network)
            .or_else(|| self.dex.get(&Network::All))
            .cloned()
            .ok_or_else(|| MoversError::Configuration(format!("no DEX source for {network}")))
    }
}

#[cfg(test)]
mod tests {
    use movers_core::kv::MemoryKv;

    use super::*;

    fn kv() -> SharedKv {
        Arc::new(MemoryKv::system())
    }

    #[test]
    fn builds_all_networks_with_key() {
        let cmc = CmcConfig {
            api_key: Some("k".into()),
            ..Default::default()
        };
        let reg = SourceRegistry::build(CoinGeckoConfig::default(), cmc, kv()).unwrap();
        assert_eq!(reg.cex().name(), "coingecko");
        assert_eq!(reg.dex(Network::Base).unwrap().cache_key(), "dex_data_v7:base");
        assert_eq!(reg.dex(Network::All).unwrap().name(), "cmc:all");
    }

    #[test]
    fn missing_key_is_reported_per_lookup() {
        let reg = SourceRegistry::build(CoinGeckoConfig::default(), CmcConfig::default(), kv()).unwrap();
        let err = reg.dex(Network::Solana).err().unwrap();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Server Config Error: Missing CMC Key");
    }
}
