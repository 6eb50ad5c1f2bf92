//! Central configuration constants for runtime limits and defaults.

/// Default number of remote writes in flight during one push batch.
pub const DEFAULT_PUSH_CONCURRENCY: usize = 4;

/// Minimum allowed push concurrency.
pub const MIN_PUSH_CONCURRENCY: usize = 1;

/// Maximum allowed push concurrency.
pub const MAX_PUSH_CONCURRENCY: usize = 16;

/// Length of the pull window when the caller doesn't pick one.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Outbound request budget shared by every remote collection.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;

/// Per-request timeout. A timed-out write leaves the record `Failed`.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Convenience function to clamp a concurrency value into allowed range.
pub fn clamp_push_concurrency(v: usize) -> usize {
    v.clamp(MIN_PUSH_CONCURRENCY, MAX_PUSH_CONCURRENCY)
}
