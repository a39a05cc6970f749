//! Response builders for the JSON endpoints.
//!
//! Payload bodies are the exact bytes stored in the KV; they are never
//! re-serialized on the way out.

use axum::http::header::{self, HeaderName};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use movers_engine::Served;

pub const X_SOURCE: HeaderName = HeaderName::from_static("x-source");
/// `HIT` when the body came from the KV, `MISS` after a live fetch.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Headers every JSON response carries, success or error.
pub const NO_CACHE_HEADERS: [(HeaderName, &str); 4] = [
    (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, proxy-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
];

/// 200 with the payload bytes and the provenance tags.
pub fn served(out: Served) -> Response {
    let cache = if out.source.is_cached() { "HIT" } else { "MISS" };
    (
        StatusCode::OK,
        NO_CACHE_HEADERS,
        [
            (header::CONTENT_TYPE, "application/json"),
            (X_SOURCE, out.source.header_value()),
            (X_CACHE, cache),
        ],
        out.body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use movers_core::ServeSource;

    use super::*;

    #[tokio::test]
    async fn body_passes_through_untouched() {
        let body = br#"{"timestamp":1,  "gainers":[]}"#.to_vec();
        let resp = served(Served {
            body: body.clone(),
            source: ServeSource::CacheFresh,
        });
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-source"], "Cache-Fresh");
        assert_eq!(resp.headers()["x-cache"], "HIT");
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(
            resp.headers()[header::CACHE_CONTROL],
            "no-store, no-cache, must-revalidate, proxy-revalidate"
        );
        assert_eq!(resp.headers()[header::EXPIRES], "0");
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), body.as_slice());
    }

    #[test]
    fn live_fetch_is_a_cache_miss() {
        let served_from = |source| served(Served { body: b"{}".to_vec(), source });
        assert_eq!(served_from(ServeSource::LiveFetch).headers()["x-cache"], "MISS");
        for source in [ServeSource::CacheRateLimited, ServeSource::CacheProactive, ServeSource::CacheFallbackError] {
            assert_eq!(served_from(source).headers()["x-cache"], "HIT");
        }
    }
}
