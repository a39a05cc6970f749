//! # movers-core
//!
//! Core crate for the movers cache-and-refresh proxy, providing:
//!
//! - **Types** (`types`): cached payloads, ranked/raw entities, lock marker, enums
//! - **Configuration** (`config`): refresh policies, engine budgets, KV selection
//! - **Error types** (`error`): the `MoversError` failure taxonomy via thiserror
//! - **KV store** (`kv`): async TTL'd key-value adapter with memory and Redis backends
//! - **Time utilities** (`time_util`): epoch-millisecond clock, injectable for tests
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod kv;
pub mod logging;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use error::MoversError;
pub use types::*;
