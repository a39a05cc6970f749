//! Advisory refresh lock marker.
//!
//! The marker is a plain KV entry holding the epoch-millisecond instant a
//! refresh started. Its presence plus recency is the only synchronization
//! signal; two requests may still both observe it absent and both refresh.

use crate::time_util::elapsed_ms;

/// Decoded lock entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockMarker {
    pub started_ms: u64,
}

impl LockMarker {
    pub fn new(started_ms: u64) -> Self {
        Self { started_ms }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.started_ms.to_string().into_bytes()
    }

    /// Decode a stored marker. Garbage decodes to `None` (lock not held).
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        text.trim().parse().ok().map(Self::new)
    }

    /// A marker is held while it is younger than `timeout_ms`.
    pub fn is_held(&self, now: u64, timeout_ms: u64) -> bool {
        elapsed_ms(now, self.started_ms) < timeout_ms
    }
}
