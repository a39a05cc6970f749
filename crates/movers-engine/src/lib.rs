//! # movers-engine
//!
//! The cache freshness state machine and the machinery it drives.
//!
//! - [`engine`]: per-request decision table ([`RefreshEngine::serve`])
//! - [`refresh`]: one fetch → filter → rank → store cycle
//! - [`lock`]: advisory refresh lock on a KV key
//! - [`scheduler`]: background refresh tasks that outlive the request
//!
//! Timing thresholds come from [`RefreshPolicy`](movers_core::config::RefreshPolicy)
//! (per source) and [`EngineConfig`](movers_core::config::EngineConfig); time
//! itself comes from an injected [`Clock`](movers_core::time_util::Clock).

pub mod engine;
pub mod lock;
pub mod refresh;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use engine::{RefreshEngine, Served};
pub use refresh::{RefreshKind, RefreshOutcome, Refresher};
pub use scheduler::Scheduler;
