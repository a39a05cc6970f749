//! CoinMarketCap DEX movers, one [`DataSource`] per network.
//!
//! `spot-pairs/latest` is sorted by 24h change and paged with a scroll cursor.
//! Each fetch scans both ends of that ordering: descending for the gainers
//! and ascending for the losers, merged by pair id. Pools are screened by liquidity and the fake-market-cap trap before
//! ranking; gainers and losers are split by sign. After ranking, logos for the
//! selected assets are side-loaded in a single `cryptocurrency/info` call.

pub mod config;
pub mod json_parser;
pub mod networks;

use std::sync::Arc;

use async_trait::async_trait;
use movers_core::config::RefreshPolicy;
use movers_core::kv::SharedKv;
use movers_core::{FetchMode, MoversError, Network, RawEntity};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use self::config::{CmcConfig, SortDir};
use self::json_parser::DexPair;
use self::networks::NetworkDirectory;
use crate::paging::{Page, PageFetcher, PagePlan, PagedResult, Pagination, fetch_pages};
use crate::ranking::{RankSpec, Selection, SignPolicy};
use crate::{DataSource, FetchOutcome, http};

const USER_AGENT: &str = "movers/0.1";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// State shared by every network's source.
pub struct CmcShared {
    cfg: CmcConfig,
    client: reqwest::Client,
    api_key: String,
    directory: NetworkDirectory,
}

impl CmcShared {
    /// Fails with [`MoversError::Configuration`] when no API key is set.
    pub fn new(cfg: CmcConfig, kv: SharedKv) -> Result<Arc<Self>, MoversError> {
        let api_key = cfg.require_api_key()?.to_string();
        let client = http::build_client(cfg.request_timeout(), USER_AGENT)?;
        let directory = NetworkDirectory::new(cfg.clone(), client.clone(), api_key.clone(), kv);
        Ok(Arc::new(Self {
            cfg,
            client,
            api_key,
            directory,
        }))
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url).header(API_KEY_HEADER, &self.api_key)
    }

    /// Liquidity floor and fake-market-cap trap.
    fn passes_quality(&self, pair: &DexPair) -> bool {
        let liquidity = pair.entity.liquidity.unwrap_or(0.0);
        if liquidity < self.cfg.liquidity_min {
            return false;
        }
        let fdv = pair.fdv.unwrap_or(0.0);
        !(fdv > self.cfg.fake_mc_threshold && liquidity < self.cfg.fake_mc_min_liquidity)
    }
}

/// Pages `spot-pairs/latest` for one slug list in one direction.
struct PairPager<'a> {
    shared: &'a CmcShared,
    slugs: &'a str,
    dir: SortDir,
}

#[async_trait]
impl<'a> PageFetcher for PairPager<'a> {
    type Item = DexPair;

    async fn fetch_page(
        &self,
        _index: usize,
        cursor: Option<&str>,
    ) -> Result<Page<DexPair>, MoversError> {
        let url = self.shared.cfg.pairs_url(self.slugs, self.dir, cursor);
        let body = http::send_json(self.shared.get(&url), "cmc pairs").await?;
        let page = json_parser::parse_pairs(&body)?;
        Ok(Page {
            items: page.pairs,
            next_cursor: page.scroll_id,
        })
    }
}

/// CMC DEX [`DataSource`] for one [`Network`].
pub struct CmcDex {
    shared: Arc<CmcShared>,
    network: Network,
    label: String,
    cache_key: String,
    lock_key: String,
    rank: RankSpec,
}

impl CmcDex {
    pub fn new(shared: Arc<CmcShared>, network: Network) -> Self {
        let cfg = &shared.cfg;
        let rank = RankSpec {
            window: Default::default(),
            top_n: cfg.top_n,
            sign: SignPolicy::Split,
            placeholder_image: cfg.placeholder_image.clone(),
        };
        Self {
            label: format!("cmc:{network}"),
            cache_key: cfg.cache_key(network),
            lock_key: cfg.lock_key(network),
            rank,
            network,
            shared,
        }
    }

    fn plan(&self, mode: FetchMode) -> PagePlan {
        let cfg = &self.shared.cfg;
        let pages = match mode {
            FetchMode::Sprint => cfg.sprint_pages,
            FetchMode::DeepScan => cfg.deep_pages,
        };
        PagePlan {
            label: self.label.clone(),
            mode,
            pages: pages.max(1),
            pagination: Pagination::Cursor,
            retry: cfg.retry(),
        }
    }
}

/// Runs the page loop over the top (`desc`) then the bottom (`asc`) of the
/// 24h ordering and merges the two.
///
/// A failed descending scan fails the fetch. The ascending scan is skipped
/// after a 429 and otherwise only degrades the result to partial.
async fn scan_both_ends<F>(
    plan: &PagePlan,
    desc: &F,
    asc: &F,
    cancel: &CancellationToken,
) -> Result<PagedResult<DexPair>, MoversError>
where
    F: PageFetcher<Item = DexPair> + ?Sized,
{
    let mut merged = fetch_pages(plan, desc, cancel).await?;
    if merged.rate_limited {
        warn!("[{}] skipping ascending scan after 429", plan.label);
        return Ok(merged);
    }

    let bottom = match fetch_pages(plan, asc, cancel).await {
        Ok(bottom) => bottom,
        Err(e @ (MoversError::Cancelled | MoversError::Timeout)) => return Err(e),
        Err(e) => {
            warn!("[{}] ascending scan failed, losers may be short: {e}", plan.label);
            merged.partial = true;
            return Ok(merged);
        }
    };

    let mut seen: ahash::AHashSet<String> = merged
        .items
        .iter()
        .filter(|p| !p.entity.id.is_empty())
        .map(|p| p.entity.id.clone())
        .collect();
    let before = merged.items.len();
    merged.items.extend(
        bottom
            .items
            .into_iter()
            .filter(|p| p.entity.id.is_empty() || seen.insert(p.entity.id.clone())),
    );
    debug!(
        "[{}] ascending scan added {} pair(s) over {} page(s)",
        plan.label,
        merged.items.len() - before,
        bottom.pages_fetched
    );
    merged.partial |= bottom.partial;
    merged.rate_limited |= bottom.rate_limited;
    merged.pages_fetched += bottom.pages_fetched;
    Ok(merged)
}

/// Unique asset ids in selection order, at most `limit`.
fn logo_ids(selection: &Selection, limit: usize) -> Vec<u64> {
    let mut seen = ahash::AHashSet::new();
    selection
        .iter()
        .filter(|e| e.image.is_none())
        .filter_map(|e| e.asset_id)
        .filter(|id| seen.insert(*id))
        .take(limit)
        .collect()
}

#[async_trait]
impl DataSource for CmcDex {
    fn name(&self) -> &str {
        &self.label
    }

    fn cache_key(&self) -> &str {
        &self.cache_key
    }

    fn lock_key(&self) -> &str {
        &self.lock_key
    }

    fn policy(&self) -> &RefreshPolicy {
        &self.shared.cfg.policy
    }

    fn rank_spec(&self) -> &RankSpec {
        &self.rank
    }

    fn network(&self) -> Option<Network> {
        Some(self.network)
    }

    async fn fetch(
        &self,
        mode: FetchMode,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, MoversError> {
        let slugs = self.shared.directory.resolve(cancel).await.query_value(self.network);
        debug!("[{}] using network slugs {slugs}", self.label);

        let pager = |dir| PairPager {
            shared: &self.shared,
            slugs: &slugs,
            dir,
        };
        let paged = scan_both_ends(&self.plan(mode), &pager(SortDir::Desc), &pager(SortDir::Asc), cancel).await?;
        let scanned = paged.items.len();
        let entities: Vec<RawEntity> = paged
            .items
            .into_iter()
            .filter(|p| self.shared.passes_quality(p))
            .map(|p| p.entity)
            .collect();

        info!(
            "[{}] {mode}: {} of {scanned} pairs passed quality filters{}",
            self.label,
            entities.len(),
            if paged.partial { " (partial)" } else { "" }
        );
        Ok(FetchOutcome {
            entities,
            partial: paged.partial,
            scanned,
        })
    }

    async fn enrich(&self, selection: &mut Selection, cancel: &CancellationToken) {
        let ids = logo_ids(selection, self.shared.cfg.logo_limit);
        if ids.is_empty() {
            return;
        }
        let url = self.shared.cfg.info_url(&ids);
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            r = http::send_json(self.shared.get(&url), "cmc info") => r,
        };
        let logos = match result {
            Ok(body) => json_parser::parse_logos(&body),
            Err(e) => {
                warn!("[{}] logo side-load failed: {e}", self.label);
                return;
            }
        };
        for entity in selection.iter_mut() {
            if entity.image.is_none() {
                entity.image = entity.asset_id.and_then(|id| logos.get(&id).cloned());
            }
        }
        debug!("[{}] side-loaded {} logo(s) for {} asset(s)", self.label, logos.len(), ids.len());
    }
}
