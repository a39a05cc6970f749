//! Enumerations used throughout the movers system.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Fetch modes
// ---------------------------------------------------------------------------

/// How much of the upstream universe a refresh scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Few pages, bounded latency. Used when no cached data exists yet.
    Sprint,
    /// Full multi-page scan. Used by background refreshes.
    DeepScan,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sprint => write!(f, "sprint"),
            Self::DeepScan => write!(f, "deep-scan"),
        }
    }
}

// ---------------------------------------------------------------------------
// Serve source (X-Source header)
// ---------------------------------------------------------------------------

/// Which branch of the freshness state machine produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServeSource {
    CacheFresh,
    CacheUpdateInProgress,
    CacheRateLimited,
    CacheProactive,
    LiveFetch,
    CacheFallbackError,
}

impl ServeSource {
    /// Value of the `X-Source` response header.
    pub fn header_value(self) -> &'static str {
        match self {
            Self::CacheFresh => "Cache-Fresh",
            Self::CacheUpdateInProgress => "Cache-UpdateInProgress",
            Self::CacheRateLimited => "Cache-RateLimited",
            Self::CacheProactive => "Cache-Proactive",
            Self::LiveFetch => "Live-Fetch",
            Self::CacheFallbackError => "Cache-Fallback-Error",
        }
    }

    /// True when the body came from the KV store rather than a live fetch.
    pub fn is_cached(self) -> bool {
        !matches!(self, Self::LiveFetch)
    }
}

impl std::fmt::Display for ServeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.header_value())
    }
}

// ---------------------------------------------------------------------------
// Change windows
// ---------------------------------------------------------------------------

/// Percentage-change window used to rank entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeWindow {
    H1,
    #[default]
    H24,
    D7,
    D30,
    Y1,
}

impl std::fmt::Display for ChangeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::H1 => write!(f, "1h"),
            Self::H24 => write!(f, "24h"),
            Self::D7 => write!(f, "7d"),
            Self::D30 => write!(f, "30d"),
            Self::Y1 => write!(f, "1y"),
        }
    }
}

// ---------------------------------------------------------------------------
// DEX networks
// ---------------------------------------------------------------------------

/// Supported DEX networks, plus the cross-network aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    All,
    Solana,
    Ethereum,
    Bnb,
    Base,
}

impl Network {
    /// Every concrete (non-aggregate) network.
    pub const CONCRETE: [Network; 4] = [Self::Solana, Self::Ethereum, Self::Bnb, Self::Base];

    /// Parse a `?network=` value.
    ///
    /// Accepts the canonical ids and common aliases. Anything unrecognized maps
    /// to [`Network::All`].
    pub fn from_query(value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return Self::All;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "solana" | "sol" => Self::Solana,
            "ethereum" | "eth" => Self::Ethereum,
            "bnb" | "bsc" => Self::Bnb,
            "base" => Self::Base,
            _ => Self::All,
        }
    }

    /// Canonical id, echoed back to clients as `"network"`.
    pub fn id(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Solana => "solana",
            Self::Ethereum => "ethereum",
            Self::Bnb => "bnb",
            Self::Base => "base",
        }
    }

    /// Fallback upstream slug when network discovery is unavailable.
    pub fn default_slug(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Solana => Some("solana"),
            Self::Ethereum => Some("ethereum"),
            Self::Bnb => Some("bnb"),
            Self::Base => Some("base"),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}
