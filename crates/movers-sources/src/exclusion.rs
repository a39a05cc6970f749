//! Symbol deny-lists (stablecoins, wrapped tokens, reward tokens).
//!
//! The lists are plain JSON arrays of symbols served as static assets. They
//! are re-read on every refresh cycle so edits take effect on the next
//! refresh without a restart. A document that cannot be read or parsed is
//! skipped with a debug log; it never fails the refresh.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use ahash::AHashSet;
use async_trait::async_trait;
use futures_util::future::join_all;
use movers_core::{MoversError, RawEntity};
use serde::Deserialize;
use tracing::debug;

/// Default deny-list documents, relative to the static asset root.
pub const DEFAULT_EXCLUSION_FILES: [&str; 3] = [
    "/exclusions/stablecoins-exclusion-list.json",
    "/exclusions/wrapped-tokens-exclusion-list.json",
    "/exclusions/rewards-tokens-exclusion-list.json",
];

// ---------------------------------------------------------------------------
// Asset collaborator
// ---------------------------------------------------------------------------

/// Read-only access to static assets.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, MoversError>;
}

/// Assets served from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `path` under the root, rejecting anything that escapes it.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let rel = Path::new(path.trim_start_matches('/'));
        rel.components()
            .all(|c| matches!(c, Component::Normal(_)))
            .then(|| self.root.join(rel))
    }
}

#[async_trait]
impl AssetSource for DirAssets {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, MoversError> {
        let full = self
            .resolve(path)
            .ok_or_else(|| MoversError::Unavailable(format!("asset path rejected: {path}")))?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| MoversError::Unavailable(format!("asset {path}: {e}")))
    }
}

// ---------------------------------------------------------------------------
// ExclusionSet
// ---------------------------------------------------------------------------

/// Lower-cased symbols to drop before ranking.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    symbols: AHashSet<String>,
}

impl ExclusionSet {
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(&symbol.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Split `entities` into those kept and the number excluded.
    pub fn apply(&self, entities: Vec<RawEntity>) -> (Vec<RawEntity>, usize) {
        let before = entities.len();
        let kept: Vec<RawEntity> = entities
            .into_iter()
            .filter(|e| !self.symbols.contains(&e.symbol_key()))
            .collect();
        let excluded = before - kept.len();
        (kept, excluded)
    }
}

// ---------------------------------------------------------------------------
// ExclusionFilter
// ---------------------------------------------------------------------------

/// A deny-list document: either a bare array or `{ "symbols": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListDoc {
    Bare(Vec<String>),
    Wrapped { symbols: Vec<String> },
}

impl ListDoc {
    fn into_symbols(self) -> Vec<String> {
        match self {
            Self::Bare(s) | Self::Wrapped { symbols: s } => s,
        }
    }
}

/// Loads and merges the configured deny-list documents.
#[derive(Clone)]
pub struct ExclusionFilter {
    assets: Arc<dyn AssetSource>,
    files: Vec<String>,
}

impl ExclusionFilter {
    pub fn new(assets: Arc<dyn AssetSource>, files: Vec<String>) -> Self {
        Self { assets, files }
    }

    /// Filter with no documents; every load yields an empty set.
    pub fn disabled() -> Self {
        Self::new(Arc::new(DirAssets::new(".")), Vec::new())
    }

    /// Load every document in parallel and union the results.
    pub async fn load(&self) -> ExclusionSet {
        let loads = self.files.iter().map(|path| async move {
            let bytes = match self.assets.fetch(path).await {
                Ok(b) => b,
                Err(e) => {
                    debug!("[exclusion] skipping {path}: {e}");
                    return Vec::new();
                }
            };
            match serde_json::from_slice::<ListDoc>(&bytes) {
                Ok(doc) => doc.into_symbols(),
                Err(e) => {
                    debug!("[exclusion] skipping malformed {path}: {e}");
                    Vec::new()
                }
            }
        });

        let set = ExclusionSet::from_symbols(join_all(loads).await.into_iter().flatten());
        debug!("[exclusion] loaded {} symbols from {} file(s)", set.len(), self.files.len());
        set
    }
}
