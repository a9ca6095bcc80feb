//! Shared retry/backoff primitives.
//!
//! Grounds both the LLM Gateway's rate-limit retry policy (initial delay
//! 2s, multiplier 2, jitter +/-50%, cap 60s, up to 5 attempts) and the
//! Dashboard/Schema Source clients' 5xx retry policy.

use std::sync::atomic::{AtomicU64, Ordering};

static JITTER_COUNTER: AtomicU64 = AtomicU64::new(1);
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A process-unique, human-greppable request id for correlating a single
/// outbound call across retry attempts in logs.
pub fn new_request_id() -> String {
    let millis = crate::time_utils::current_unix_timestamp_ms();
    let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("dm-{millis}-{count}")
}

/// Exponential backoff schedule: `base_ms * 2^attempt`, capped at `cap_ms`.
pub fn exponential_backoff_ms(attempt: usize, base_ms: u64, cap_ms: u64) -> u64 {
    let shift = attempt.min(16);
    base_ms.saturating_mul(1_u64 << shift).min(cap_ms)
}

/// Applies +/-50% jitter around a deterministic backoff value: the result
/// ranges over `[0.5*base, 1.5*base]`, clamped to `cap_ms`. Deterministic in
/// tests via an internal atomic counter rather than a wall-clock RNG, so
/// repeated calls within one process produce a reproducible sequence.
pub fn jittered_backoff_ms(attempt: usize, base_ms: u64, cap_ms: u64, jitter_enabled: bool) -> u64 {
    let base = exponential_backoff_ms(attempt, base_ms, cap_ms);
    if !jitter_enabled || base <= 1 {
        return base;
    }

    let low = base / 2;
    let width = base.saturating_sub(low);
    let seed = JITTER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mixed = seed
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .rotate_left(17)
        ^ 0xA24B_AED4_963E_E407;
    let jitter = if width == 0 { 0 } else { mixed % (width.saturating_mul(2).saturating_add(1)) };
    low.saturating_add(jitter).min(cap_ms)
}

/// HTTP statuses that should be retried: a 429 rate limit or any 5xx.
pub fn should_retry_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Returns true when a message string carries a provider-agnostic
/// rate-limit marker: HTTP 429, or an error string containing "rate limit".
pub fn message_indicates_rate_limit(message: &str) -> bool {
    message.to_ascii_lowercase().contains("rate limit")
}

/// Parses a `Retry-After` header value (seconds, or an HTTP-date) into a
/// millisecond delay.
pub fn parse_retry_after_ms(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds.saturating_mul(1_000));
    }
    let retry_at = chrono::DateTime::parse_from_rfc2822(raw)
        .ok()?
        .with_timezone(&chrono::Utc);
    let now = chrono::Utc::now();
    let delay_ms = retry_at.signed_duration_since(now).num_milliseconds();
    if delay_ms <= 0 {
        return Some(0);
    }
    u64::try_from(delay_ms).ok()
}
