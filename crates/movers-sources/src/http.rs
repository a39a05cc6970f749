//! HTTP plumbing shared by the source clients.
//!
//! Maps transport outcomes onto the [`MoversError`] taxonomy:
//!
//! | Outcome                 | Error                          |
//! |-------------------------|--------------------------------|
//! | HTTP 429                | [`MoversError::RateLimited`]   |
//! | other non-2xx / network | [`MoversError::Unavailable`]   |
//! | body is not JSON        | [`MoversError::Decode`]        |

use std::time::Duration;

use movers_core::MoversError;
use reqwest::StatusCode;
use serde_json::Value;

/// Longest upstream error text carried into an error message.
const MAX_ERROR_TEXT: usize = 200;

/// Build a client with a per-request timeout.
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, MoversError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| MoversError::Configuration(format!("http client: {e}")))
}

/// Send `req` and decode a JSON body.
pub async fn send_json(req: reqwest::RequestBuilder, label: &str) -> Result<Value, MoversError> {
    let resp = req.send().await.map_err(|e| {
        if e.is_timeout() {
            MoversError::Unavailable(format!("{label}: request timed out"))
        } else {
            MoversError::Unavailable(format!("{label}: {e}"))
        }
    })?;

    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(MoversError::RateLimited(format!("{label}: HTTP 429")));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(MoversError::Unavailable(format!(
            "{label}: HTTP {}: {}",
            status.as_u16(),
            upstream_message(&body)
        )));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| MoversError::Unavailable(format!("{label}: body read failed: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| MoversError::Decode(format!("{label}: {e}")))
}

/// Best human-readable reason from an upstream error body.
///
/// Understands the `{"status": {"error_message": ...}}` envelope; otherwise
/// returns the (truncated) raw text.
pub fn upstream_message(body: &str) -> String {
    let structured = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.pointer("/status/error_message")
            .or_else(|| v.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    structured.unwrap_or_else(|| body.chars().take(MAX_ERROR_TEXT).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_error_message() {
        let body = r#"{"status":{"error_code":1002,"error_message":"API key missing."}}"#;
        assert_eq!(upstream_message(body), "API key missing.");
    }

    #[test]
    fn plain_error_is_truncated() {
        let body = "x".repeat(1000);
        assert_eq!(upstream_message(&body).len(), MAX_ERROR_TEXT);
        assert_eq!(upstream_message("Bad Gateway"), "Bad Gateway");
    }
}
