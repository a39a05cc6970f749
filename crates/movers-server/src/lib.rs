//! # movers-server
//!
//! HTTP front of the market movers cache.
//!
//! ```text
//! GET /api/stats ─────────┐
//! GET /api/dex-stats ─────┼──► SourceRegistry ──► RefreshEngine::serve ──► KV / upstream
//! GET /api/image-proxy ───┼──► KV blob cache ──► live fetch on miss
//! GET /health             │
//! anything else ──────────┴──► static_dir
//! ```

pub mod config;
pub mod error;
pub mod response;
pub mod routes;
pub mod state;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Full application router: API routes, health check, static fallback.
pub fn app(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .merge(routes::api_router())
        .route("/health", get(health))
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
