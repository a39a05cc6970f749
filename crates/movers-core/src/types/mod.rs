//! Core data types shared by the sources, the refresh engine and the router.
//!
//! - [`payload`]: the materialized [`CachedPayload`] and its [`RankedEntity`] rows
//! - [`entity`]: pre-ranking [`RawEntity`] snapshots produced by source clients
//! - [`enums`]: fetch modes, serve-source tags, change windows, DEX networks
//! - [`lock`]: the advisory [`LockMarker`]

pub mod entity;
pub mod enums;
pub mod lock;
pub mod payload;

pub use entity::*;
pub use enums::*;
pub use lock::*;
pub use payload::*;
