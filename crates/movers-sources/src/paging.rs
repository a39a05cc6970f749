//! Paginated fetch loop with bounded retry and rate-limit abort.
//!
//! Every source client pages through its upstream with the same rules:
//!
//! - A non-429 failure is retried up to `max_attempts` times with linear
//!   backoff (`backoff * attempt`). When retries run out the page is abandoned
//!   and the loop moves on, marking the result partial, so data from other
//!   pages is kept.
//! - An HTTP 429 aborts all remaining pages immediately. Retrying would only
//!   amplify load while the provider is throttling.
//! - In [`FetchMode::Sprint`] a failure of the *first* page fails the whole
//!   fetch: with a single bounded page there is nothing else to fall back on.
//! - Cursor-driven upstreams cannot skip a page, so an abandoned page ends the
//!   loop.
//! - The cancellation token aborts the in-flight request and any pending sleep.
//!
//! ```text
//! page 0 ──ok──► page 1 ──err──► retry ──err──► (abandon, partial) ──► page 2 ...
//!                          └─429─► stop (partial)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use movers_core::{FetchMode, MoversError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One page of upstream results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque continuation token for cursor-driven upstreams.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn numbered(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// How consecutive pages are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// `page=1,2,3...`; pages are independent.
    Numbered,
    /// Each page returns the cursor of the next one.
    Cursor,
}

/// Retry and pacing bounds for one page loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per page, including the first.
    pub max_attempts: u32,
    /// Linear backoff unit between attempts.
    pub backoff: Duration,
    /// Pause between consecutive successful pages.
    pub inter_page_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(2),
            inter_page_delay: Duration::ZERO,
        }
    }
}

/// Everything the loop needs besides the fetcher.
#[derive(Debug, Clone)]
pub struct PagePlan {
    pub label: String,
    pub mode: FetchMode,
    pub pages: usize,
    pub pagination: Pagination,
    pub retry: RetryPolicy,
}

/// Aggregated output of a page loop.
#[derive(Debug, Clone)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// At least one page was abandoned or the loop was cut short by a 429.
    pub partial: bool,
    /// The loop stopped on a 429 after collecting some items.
    pub rate_limited: bool,
    pub pages_fetched: usize,
}

/// Fetches a single page. Implemented by each source client.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    type Item: Send;

    /// Fetch page `index` (0-based). `cursor` is the previous page's
    /// continuation token, if any.
    async fn fetch_page(
        &self,
        index: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Self::Item>, MoversError>;
}

/// Sleep unless cancelled first.
async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), MoversError> {
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(MoversError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Run the page loop described by `plan`.
pub async fn fetch_pages<F>(
    plan: &PagePlan,
    fetcher: &F,
    cancel: &CancellationToken,
) -> Result<PagedResult<F::Item>, MoversError>
where
    F: PageFetcher + ?Sized,
{
    let mut items = Vec::new();
    let mut partial = false;
    let mut rate_limited = false;
    let mut pages_fetched = 0usize;
    let mut cursor: Option<String> = None;
    let mut last_error: Option<MoversError> = None;
    let label = plan.label.as_str();

    'pages: for index in 0..plan.pages {
        if cancel.is_cancelled() {
            return Err(MoversError::Cancelled);
        }

        let mut attempt = 0u32;
        let page = loop {
            attempt += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MoversError::Cancelled),
                r = fetcher.fetch_page(index, cursor.as_deref()) => r,
            };

            match result {
                Ok(page) => break Some(page),
                Err(e @ MoversError::RateLimited(_)) => {
                    warn!("[{label}] page {} rate limited, aborting remaining pages", index + 1);
                    if items.is_empty() {
                        return Err(e);
                    }
                    partial = true;
                    rate_limited = true;
                    break 'pages;
                }
                Err(e @ (MoversError::Cancelled | MoversError::Timeout)) => return Err(e),
                Err(e) if attempt < plan.retry.max_attempts => {
                    debug!("[{label}] page {} attempt {attempt} failed: {e}", index + 1);
                    pause(plan.retry.backoff * attempt, cancel).await?;
                }
                Err(e) => {
                    if index == 0 && plan.mode == FetchMode::Sprint {
                        return Err(e);
                    }
                    warn!("[{label}] page {} abandoned after {attempt} attempt(s): {e}", index + 1);
                    partial = true;
                    last_error = Some(e);
                    break None;
                }
            }
        };

        let Some(page) = page else {
            match plan.pagination {
                Pagination::Numbered => continue,
                Pagination::Cursor => break,
            }
        };

        pages_fetched += 1;
        if page.items.is_empty() {
            break;
        }
        items.extend(page.items);

        if plan.pagination == Pagination::Cursor {
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        if index + 1 < plan.pages {
            pause(plan.retry.inter_page_delay, cancel).await?;
        }
    }

    if items.is_empty() {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    Ok(PagedResult {
        items,
        partial,
        rate_limited,
        pages_fetched,
    })
}
