//! Pre-ranking entity snapshots.
//!
//! Source clients normalize vendor JSON into [`RawEntity`]. Numeric fields stay
//! optional here because upstreams routinely return `null` for thin markets;
//! the formatter drops anything it cannot order before projecting to
//! [`RankedEntity`](super::RankedEntity).

use serde::{Deserialize, Serialize};

use super::enums::ChangeWindow;

/// Percentage changes over the standard windows. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub h1: Option<f64>,
    pub h24: Option<f64>,
    pub d7: Option<f64>,
    pub d30: Option<f64>,
    pub y1: Option<f64>,
}

impl ChangeSet {
    pub fn get(&self, window: ChangeWindow) -> Option<f64> {
        match window {
            ChangeWindow::H1 => self.h1,
            ChangeWindow::H24 => self.h24,
            ChangeWindow::D7 => self.d7,
            ChangeWindow::D30 => self.d30,
            ChangeWindow::Y1 => self.y1,
        }
    }
}

/// One instrument as reported by an upstream, before filtering and ranking.
///
/// `market_cap` is only ever filled by centralized-exchange sources and
/// `liquidity` only by DEX sources; the two are never substituted for each
/// other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    /// Upstream identifier (CoinGecko id, or DEX pair / contract address).
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub liquidity: Option<f64>,
    pub volume_24h: Option<f64>,
    pub changes: ChangeSet,

    // -- DEX-only provenance --
    pub platform: Option<String>,
    pub contract: Option<String>,
    pub dex_url: Option<String>,

    /// Key used to side-load metadata (logos) after ranking. Never published.
    pub asset_id: Option<u64>,
}

impl RawEntity {
    /// Lower-cased symbol, the key of the exclusion deny-lists.
    pub fn symbol_key(&self) -> String {
        self.symbol.to_lowercase()
    }

    /// Whether this entity can be ordered by `window`.
    pub fn is_rankable(&self, window: ChangeWindow) -> bool {
        let finite = |v: Option<f64>| v.is_some_and(f64::is_finite);
        finite(self.price) && finite(self.changes.h24) && finite(self.changes.get(window))
    }
}
