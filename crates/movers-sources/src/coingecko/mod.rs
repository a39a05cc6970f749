//! CoinGecko centralized-exchange market list.
//!
//! Pages through `/coins/markets` ordered by market cap. A sprint fetch reads
//! one page; a deep scan reads up to `deep_pages` with a pause between pages.
//! Both ranked lists draw from the whole valid universe.

pub mod config;
pub mod json_parser;

use async_trait::async_trait;
use movers_core::config::RefreshPolicy;
use movers_core::{FetchMode, MoversError};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER};
use tokio_util::sync::CancellationToken;
use tracing::info;

use self::config::CoinGeckoConfig;
use crate::paging::{Page, PageFetcher, PagePlan, Pagination, fetch_pages};
use crate::ranking::{RankSpec, SignPolicy};
use crate::{DataSource, FetchOutcome, http};

const USER_AGENT: &str = "Mozilla/5.0";
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// CoinGecko [`DataSource`].
pub struct CoinGecko {
    cfg: CoinGeckoConfig,
    client: reqwest::Client,
    rank: RankSpec,
}

impl CoinGecko {
    pub fn new(cfg: CoinGeckoConfig) -> Result<Self, MoversError> {
        let client = http::build_client(cfg.request_timeout(), USER_AGENT)?;
        let rank = RankSpec {
            window: Default::default(),
            top_n: cfg.top_n,
            sign: SignPolicy::Both,
            placeholder_image: cfg.placeholder_image.clone(),
        };
        Ok(Self { cfg, client, rank })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.coingecko.com/"));
        if let Some(key) = self.cfg.api_key.as_deref() {
            if let Ok(v) = HeaderValue::from_str(key) {
                headers.insert(API_KEY_HEADER, v);
            }
        }
        headers
    }

    fn plan(&self, mode: FetchMode) -> PagePlan {
        let pages = match mode {
            FetchMode::Sprint => self.cfg.sprint_pages,
            FetchMode::DeepScan => self.cfg.deep_pages,
        };
        PagePlan {
            label: "coingecko".into(),
            mode,
            pages: pages.max(1),
            pagination: Pagination::Numbered,
            retry: self.cfg.retry(),
        }
    }
}

#[async_trait]
impl PageFetcher for CoinGecko {
    type Item = movers_core::RawEntity;

    async fn fetch_page(
        &self,
        index: usize,
        _cursor: Option<&str>,
    ) -> Result<Page<Self::Item>, MoversError> {
        let url = self.cfg.markets_url(index + 1);
        let body = http::send_json(self.client.get(&url).headers(self.headers()), "coingecko").await?;
        json_parser::parse_markets(&body).map(Page::numbered)
    }
}

#[async_trait]
impl DataSource for CoinGecko {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn cache_key(&self) -> &str {
        &self.cfg.cache_key
    }

    fn lock_key(&self) -> &str {
        &self.cfg.lock_key
    }

    fn policy(&self) -> &RefreshPolicy {
        &self.cfg.policy
    }

    fn rank_spec(&self) -> &RankSpec {
        &self.rank
    }

    async fn fetch(
        &self,
        mode: FetchMode,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, MoversError> {
        let plan = self.plan(mode);
        let paged = fetch_pages(&plan, self, cancel).await?;
        info!(
            "[coingecko] {mode}: {} coins from {} page(s){}",
            paged.items.len(),
            paged.pages_fetched,
            if paged.partial { " (partial)" } else { "" }
        );
        Ok(FetchOutcome {
            scanned: paged.items.len(),
            entities: paged.items,
            partial: paged.partial,
        })
    }
}
