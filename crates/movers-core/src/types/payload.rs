//! The materialized result for one cache key.
//!
//! A [`CachedPayload`] is produced by a successful refresh cycle, stored as JSON
//! in the KV store, and served verbatim on cache hits. The only in-place
//! mutation is [`CachedPayload::restamp_failure`], used by the fallback path to
//! record a failed attempt without touching the ranked lists.

use serde::{Deserialize, Serialize};

use super::entity::RawEntity;
use super::enums::ChangeWindow;
use crate::error::MoversError;
use crate::time_util::elapsed_ms;

// ---------------------------------------------------------------------------
// RankedEntity
// ---------------------------------------------------------------------------

/// Public projection of one instrument. Immutable once formatted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntity {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: String,
    pub price: f64,

    /// Centralized-exchange market capitalisation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,

    /// DEX pool liquidity. Distinct from `market_cap`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<f64>,

    pub change_24h: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_1h: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_7d: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_30d: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_1y: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dex_url: Option<String>,
}

impl RankedEntity {
    /// Project a rankable [`RawEntity`] onto the public shape.
    ///
    /// Returns `None` when price or the 24h change is missing.
    pub fn project(raw: &RawEntity, placeholder_image: &str) -> Option<Self> {
        Some(Self {
            id: raw.id.clone(),
            symbol: raw.symbol.clone(),
            name: raw.name.clone(),
            image: raw
                .image
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| placeholder_image.to_string()),
            price: raw.price?,
            market_cap: raw.market_cap,
            liquidity: raw.liquidity,
            volume_24h: raw.volume_24h,
            change_24h: raw.changes.h24?,
            change_1h: raw.changes.h1,
            change_7d: raw.changes.d7,
            change_30d: raw.changes.d30,
            change_1y: raw.changes.y1,
            platform: raw.platform.clone(),
            contract: raw.contract.clone(),
            dex_url: raw.dex_url.clone(),
        })
    }

    pub fn change(&self, window: ChangeWindow) -> Option<f64> {
        match window {
            ChangeWindow::H1 => self.change_1h,
            ChangeWindow::H24 => Some(self.change_24h),
            ChangeWindow::D7 => self.change_7d,
            ChangeWindow::D30 => self.change_30d,
            ChangeWindow::Y1 => self.change_1y,
        }
    }
}

// ---------------------------------------------------------------------------
// CachedPayload
// ---------------------------------------------------------------------------

/// The stored and served result for one cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPayload {
    /// When the ranked data was produced (epoch ms).
    pub timestamp: u64,

    /// When the most recent refresh attempt started (epoch ms).
    #[serde(default)]
    pub last_update_attempt: u64,

    #[serde(default)]
    pub last_update_failed: bool,

    /// Present only when `last_update_failed` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Raw entities returned by the upstream before filtering.
    #[serde(default)]
    pub total_scanned: usize,

    /// Entities dropped by the exclusion deny-lists.
    #[serde(default)]
    pub excluded_count: usize,

    /// At least one page or partition was abandoned.
    #[serde(default)]
    pub is_partial: bool,

    /// DEX network id this payload was built for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    #[serde(default)]
    pub gainers: Vec<RankedEntity>,

    #[serde(default)]
    pub losers: Vec<RankedEntity>,
}

impl CachedPayload {
    /// Decode a stored payload. Any parse failure is a [`MoversError::MalformedCache`].
    pub fn from_slice(key: &str, bytes: &[u8]) -> Result<Self, MoversError> {
        serde_json::from_slice(bytes).map_err(|_| MoversError::MalformedCache(key.to_string()))
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, MoversError> {
        serde_json::to_vec(self).map_err(|e| MoversError::Store(format!("encode payload: {e}")))
    }

    /// `now - timestamp`.
    pub fn age_ms(&self, now: u64) -> u64 {
        elapsed_ms(now, self.timestamp)
    }

    /// `now - last_update_attempt`. A payload that never recorded an attempt is
    /// treated as infinitely old.
    pub fn since_last_attempt_ms(&self, now: u64) -> u64 {
        if self.last_update_attempt == 0 {
            return u64::MAX;
        }
        elapsed_ms(now, self.last_update_attempt)
    }

    /// Copy of this payload recording a failed refresh attempt.
    ///
    /// `timestamp`, `gainers` and `losers` are preserved exactly; only the
    /// attempt metadata changes.
    pub fn restamp_failure(&self, now: u64, reason: impl Into<String>) -> Self {
        Self {
            last_update_attempt: now,
            last_update_failed: true,
            last_error: Some(reason.into()),
            ..self.clone()
        }
    }
}
