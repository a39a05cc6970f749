//! Shared JSON parsing helpers used by all source parsers.
//!
//! Aggregator APIs are inconsistent about numeric encoding: the same field may
//! arrive as a JSON number, a numeric string, or `null` depending on the
//! endpoint and the instrument.

use serde_json::Value;

/// Parse a JSON value (string or number) as `f64`.
///
/// Handles the common pattern where numeric values may be encoded as either
/// JSON strings (`"30000.5"`) or native numbers (`30000.5`). Non-finite
/// results are rejected.
#[inline]
pub fn parse_str_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    let parsed = if let Some(s) = v.as_str() {
        fast_float2::parse(s.trim()).ok()
    } else {
        v.as_f64()
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Parse a JSON value (string or number) as `u64`.
#[inline]
pub fn parse_str_u64(v: Option<&Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.trim().parse().ok()
    } else {
        v.as_u64()
    }
}

/// Parse a named field on a JSON object as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// First of several fields that parses as `f64`.
#[inline]
pub fn parse_f64_any(v: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| parse_f64_field(v, k))
}

/// Non-empty string field.
#[inline]
pub fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
