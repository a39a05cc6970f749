//! Market mover endpoints.
//!
//! | Route                        | Source                          |
//! |------------------------------|---------------------------------|
//! | `GET /api/stats`             | CEX                             |
//! | `GET /api/stats?network=X`   | DEX on X                        |
//! | `GET /api/dex-stats?network=X` | DEX on X (absent X: all networks) |
//!
//! Unknown network values select the all-networks aggregate.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use movers_core::Network;
use movers_sources::DataSource;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stats", get(stats))
        .route("/api/dex-stats", get(dex_stats))
}

#[derive(Debug, Deserialize)]
pub struct NetworkQuery {
    network: Option<String>,
}

async fn stats(
    State(state): State<Arc<AppState>>,
    Query(q): Query<NetworkQuery>,
) -> Result<Response, ApiError> {
    let network = q.network.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let source = match network {
        None => state.registry.cex(),
        Some(raw) => state.registry.dex(Network::from_query(Some(raw)))?,
    };
    serve(&state, source).await
}

async fn dex_stats(
    State(state): State<Arc<AppState>>,
    Query(q): Query<NetworkQuery>,
) -> Result<Response, ApiError> {
    let source = state.registry.dex(Network::from_query(q.network.as_deref()))?;
    serve(&state, source).await
}

async fn serve(state: &AppState, source: Arc<dyn DataSource>) -> Result<Response, ApiError> {
    let name = source.name().to_string();
    let out = state.engine.serve(source).await?;
    debug!(
        "[http] {name}: {} ({} bytes, {})",
        out.source.header_value(),
        out.body.len(),
        if out.source.is_cached() { "from cache" } else { "live" }
    );
    Ok(response::served(out))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use movers_core::MoversError;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::testing::*;

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Option<String>, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let source = resp
            .headers()
            .get("x-source")
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, source, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn cex_cold_then_fresh() {
        let t = test_app(StubSource::cex(Ok(spread())), dex_sources());

        let (status, source, body) = get_json(t.router(), "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.as_deref(), Some("Live-Fetch"));
        assert_eq!(body["gainers"].as_array().unwrap().len(), 20);
        assert_eq!(body["losers"].as_array().unwrap().len(), 20);
        assert!(body.get("network").is_none());

        let (status, source, again) = get_json(t.router(), "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.as_deref(), Some("Cache-Fresh"));
        assert_eq!(again, body);
    }

    #[tokio::test]
    async fn stale_cache_served_while_refreshing() {
        let t = test_app(StubSource::cex(Ok(spread())), dex_sources());
        get_json(t.router(), "/api/stats").await;

        t.clock.advance(Duration::from_secs(13 * 60));
        let (status, source, body) = get_json(t.router(), "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.as_deref(), Some("Cache-Proactive"));
        assert_eq!(body["gainers"].as_array().unwrap().len(), 20);
        assert!(t.state.engine.shutdown(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn stats_with_network_goes_to_dex() {
        let t = test_app(StubSource::cex(Ok(spread())), dex_sources());
        let (status, _, body) = get_json(t.router(), "/api/stats?network=sol").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["network"], "solana");
    }

    #[tokio::test]
    async fn dex_stats_defaults_to_all() {
        let t = test_app(StubSource::cex(Ok(spread())), dex_sources());
        let (_, _, body) = get_json(t.router(), "/api/dex-stats").await;
        assert_eq!(body["network"], "all");
        let (_, _, body) = get_json(t.router(), "/api/dex-stats?network=dogechain").await;
        assert_eq!(body["network"], "all");
        let (_, _, body) = get_json(t.router(), "/api/dex-stats?network=BSC").await;
        assert_eq!(body["network"], "bnb");
    }

    #[tokio::test]
    async fn empty_network_param_means_cex() {
        let t = test_app(StubSource::cex(Ok(spread())), dex_sources());
        let (_, _, body) = get_json(t.router(), "/api/stats?network=").await;
        assert!(body.get("network").is_none());
    }

    #[tokio::test]
    async fn cold_failure_is_500_with_message() {
        let failing = StubSource::cex(Err(MoversError::Unavailable("HTTP 503".into())));
        let t = test_app(failing, dex_sources());
        let (status, source, body) = get_json(t.router(), "/api/stats").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(source.is_none());
        assert_eq!(body["error"], true);
        assert!(body["message"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn missing_dex_source_is_configuration_error() {
        let t = test_app(StubSource::cex(Ok(spread())), Default::default());
        let (status, _, body) = get_json(t.router(), "/api/dex-stats?network=base").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], true);
    }
}
