use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use movers_core::MoversError;
use serde_json::json;

use crate::response::NO_CACHE_HEADERS;

/// Errors a handler can surface to the client.
#[derive(Debug)]
pub enum ApiError {
    /// The engine had nothing to serve.
    Movers(MoversError),
    BadRequest(String),
    /// The image proxy could not reach its target.
    Upstream(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Movers(e) => write!(f, "{e}"),
            Self::BadRequest(msg) => write!(f, "bad_request: {msg}"),
            Self::Upstream(msg) => write!(f, "upstream_error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Movers(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        let body = json!({ "error": true, "message": message });
        (status, NO_CACHE_HEADERS, axum::Json(body)).into_response()
    }
}

impl From<MoversError> for ApiError {
    fn from(e: MoversError) -> Self {
        Self::Movers(e)
    }
}
