//! `GET /api/image-proxy?url=<target>`: image pass-through with a KV blob cache.
//!
//! Cache keys are `img:{url}` (bytes) and `img:{url}:type` (content type),
//! keyed by the decoded target URL. A miss, or any KV failure, degrades to a
//! live fetch.
//!
//! Targets must be `http(s)` URLs on a public host. Loopback, private,
//! link-local and similar literal addresses (and `localhost`) are refused, on
//! the first request and on every redirect hop, unless
//! `image_proxy.allow_private_hosts` is set. Host names are not resolved.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ImageProxyConfig;
use crate::error::ApiError;
use crate::state::AppState;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const USER_AGENT: &str = "Mozilla/5.0";
const MAX_REDIRECTS: usize = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/image-proxy", get(image_proxy))
}

/// HTTP client for the proxy. Redirects are followed only to allowed hosts.
pub fn build_client(cfg: &ImageProxyConfig) -> reqwest::Result<reqwest::Client> {
    let allow_private = cfg.allow_private_hosts;
    let redirects = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if allow_private || is_public_target(attempt.url()) {
            attempt.follow()
        } else {
            attempt.error("redirect to a non-public host")
        }
    });
    reqwest::Client::builder()
        .timeout(cfg.request_timeout())
        .user_agent(USER_AGENT)
        .redirect(redirects)
        .build()
}

/// Parse and vet a proxy target.
fn check_target(raw: &str, allow_private: bool) -> Result<reqwest::Url, ApiError> {
    let url = reqwest::Url::parse(raw).map_err(|_| ApiError::BadRequest(format!("unsupported url: {raw}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(format!("unsupported url: {raw}")));
    }
    if !allow_private && !is_public_target(&url) {
        return Err(ApiError::BadRequest(format!("host not allowed: {raw}")));
    }
    Ok(url)
}

fn is_public_target(url: &reqwest::Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") {
        return false;
    }
    match host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => is_public_v4(ip),
        Ok(IpAddr::V6(ip)) => is_public_v6(ip),
        Err(_) => true,
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    let shared = a == 100 && (64..128).contains(&b);
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || shared
        || a == 0)
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_public_v4(v4);
    }
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_unique_local()
        || ip.is_unicast_link_local())
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    url: Option<String>,
}

async fn image_proxy(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    let url = q
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing url parameter".into()))?;
    let target = check_target(&url, state.image_proxy.allow_private_hosts)?;

    let body_key = format!("img:{url}");
    let type_key = format!("{body_key}:type");
    let max_age = state.image_proxy.ttl_secs;

    match state.kv.get(&body_key).await {
        Ok(Some(bytes)) => {
            let content_type = state
                .kv
                .get(&type_key)
                .await
                .ok()
                .flatten()
                .and_then(|t| String::from_utf8(t).ok())
                .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
            debug!("[image] hit {url}");
            return Ok(image_response(bytes, content_type, max_age, "HIT"));
        }
        Ok(None) => {}
        Err(e) => warn!("[image] cache read failed for {url}: {e}"),
    }

    let resp = state
        .http
        .get(target)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("{url}: {e}")))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ApiError::Upstream(format!("{url}: HTTP {}", status.as_u16())));
    }
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string();
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| ApiError::Upstream(format!("{url}: {e}")))?
        .to_vec();

    if bytes.len() <= state.image_proxy.max_cached_bytes {
        let ttl = state.image_proxy.ttl();
        let stored = async {
            state.kv.put(&body_key, bytes.clone(), ttl).await?;
            state.kv.put(&type_key, content_type.clone().into_bytes(), ttl).await
        };
        if let Err(e) = stored.await {
            warn!("[image] cache write failed for {url}: {e}");
        }
    }
    debug!("[image] miss {url} ({} bytes)", bytes.len());
    Ok(image_response(bytes, content_type, max_age, "MISS"))
}

fn image_response(body: Vec<u8>, content_type: String, max_age: u64, cache: &'static str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, format!("public, max-age={max_age}, immutable")),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
            (header::HeaderName::from_static("x-cache"), cache.to_string()),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::testing::*;

    async fn call(app: axum::Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// Serve a fixed PNG on a loopback port.
    async fn origin() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(
            "/logo.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![0x89u8, b'P', b'N', b'G']) }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/logo.png")
    }

    #[tokio::test]
    async fn cached_image_served_without_fetch() {
        let t = test_app(StubSource::cex(Ok(spread())), dex_sources());
        let url = "https://img.example/coin.webp";
        let ttl = Duration::from_secs(60);
        t.kv.put(&format!("img:{url}"), b"WEBP".to_vec(), ttl).await.unwrap();
        t.kv.put(&format!("img:{url}:type"), b"image/webp".to_vec(), ttl).await.unwrap();

        let resp = call(t.router(), &format!("/api/image-proxy?url={url}")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/webp");
        assert_eq!(resp.headers()["x-cache"], "HIT");
        assert!(resp.headers()[header::CACHE_CONTROL].to_str().unwrap().contains("max-age=604800"));
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), b"WEBP");
    }

    #[tokio::test]
    async fn miss_fetches_live_then_caches() {
        let t = test_app(StubSource::cex(Ok(spread())), dex_sources());
        let url = origin().await;
        let uri = format!("/api/image-proxy?url={}", urlencoding::encode(&url));

        let first = call(t.router(), &uri).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["x-cache"], "MISS");
        assert_eq!(first.headers()[header::CONTENT_TYPE], "image/png");

        assert_eq!(t.kv.get(&format!("img:{url}")).await.unwrap().unwrap(), b"\x89PNG".to_vec());
        let second = call(t.router(), &uri).await;
        assert_eq!(second.headers()["x-cache"], "HIT");
    }

    #[tokio::test]
    async fn rejects_missing_or_odd_urls() {
        let t = test_app(StubSource::cex(Ok(spread())), dex_sources());
        assert_eq!(call(t.router(), "/api/image-proxy").await.status(), StatusCode::BAD_REQUEST);
        let resp = call(t.router(), "/api/image-proxy?url=file:///etc/passwd").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn private_hosts_refused_by_default() {
        let t = test_app_with_image_proxy(StubSource::cex(Ok(spread())), dex_sources(), ImageProxyConfig::default());
        let live = origin().await;
        for target in [
            live.as_str(),
            "http://10.0.0.1/x.png",
            "http://localhost:8080/x.png",
            "http://169.254.169.254/latest/meta-data",
            "http://[::1]/x.png",
            "http://2130706433/x.png",
        ] {
            let resp = call(t.router(), &format!("/api/image-proxy?url={}", urlencoding::encode(target))).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{target}");
        }
        assert!(t.kv.get(&format!("img:{live}")).await.unwrap().is_none());
    }

    #[test]
    fn public_targets_pass() {
        for target in ["https://assets.coingecko.com/coins/images/1/large/bitcoin.png", "http://8.8.8.8/x.png", "https://[2606:4700::1]/x"] {
            assert!(check_target(target, false).is_ok(), "{target}");
        }
        for target in ["http://192.168.1.1/", "http://[fd00::1]/", "http://[::ffff:127.0.0.1]/", "http://100.64.0.1/", "http://app.localhost/"] {
            assert!(check_target(target, false).is_err(), "{target}");
            assert!(check_target(target, true).is_ok(), "{target}");
        }
    }

    #[tokio::test]
    async fn upstream_error_is_502() {
        let t = test_app(StubSource::cex(Ok(spread())), dex_sources());
        let missing = origin().await.replace("logo.png", "missing.png");
        let resp = call(t.router(), &format!("/api/image-proxy?url={missing}")).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
