//! # movers-sources
//!
//! Upstream market-data clients and the pure stages that turn their output
//! into ranked lists.
//!
//! ## Architecture
//!
//! Each upstream implements [`DataSource`]: it knows its cache and lock keys,
//! its [`RefreshPolicy`], how to rank its entities, and how to fetch them.
//! The refresh engine is written once against this trait.
//!
//! ```text
//! DataSource::fetch ──► ExclusionSet::apply ──► ranking::select
//!                                                     │
//!                         ranking::format ◄── DataSource::enrich
//! ```
//!
//! ## Shared infrastructure
//!
//! - [`paging`]: page loop with retry, backoff and 429 abort
//! - [`http`]: client construction and status → error mapping
//! - [`exclusion`]: deny-list loading
//! - [`ranking`]: top-N selection and projection
//! - [`json_util`]: lenient JSON number parsing
//! - [`registry`]: builds the configured sources

pub mod cmc;
pub mod coingecko;
pub mod exclusion;
pub mod http;
pub mod json_util;
pub mod paging;
pub mod ranking;
pub mod registry;

use async_trait::async_trait;
use movers_core::config::RefreshPolicy;
use movers_core::{FetchMode, MoversError, Network, RawEntity};
use tokio_util::sync::CancellationToken;

use crate::ranking::{RankSpec, Selection};

/// Raw output of one upstream fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub entities: Vec<RawEntity>,
    /// Some page or partition was abandoned.
    pub partial: bool,
    /// Entities seen upstream before source-side quality filters.
    pub scanned: usize,
}

/// One cacheable upstream view (the CEX market list, or DEX pairs on one network).
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Log label, e.g. `coingecko` or `cmc:solana`.
    fn name(&self) -> &str;

    fn cache_key(&self) -> &str;

    fn lock_key(&self) -> &str;

    fn policy(&self) -> &RefreshPolicy;

    fn rank_spec(&self) -> &RankSpec;

    /// DEX network recorded in the payload. `None` for CEX sources.
    fn network(&self) -> Option<Network> {
        None
    }

    /// Fetch and normalize entities. Must stop promptly once `cancel` fires.
    async fn fetch(
        &self,
        mode: FetchMode,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, MoversError>;

    /// Best-effort metadata side-load for the selected entities.
    async fn enrich(&self, _selection: &mut Selection, _cancel: &CancellationToken) {}
}
