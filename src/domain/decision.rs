//! Rate limit check results.

use serde::Serialize;
use std::time::Duration;

/// Outcome of a rate limit check.
///
/// Carries everything the HTTP middleware needs to build a throttling
/// response: `X-RateLimit-Limit` / `-Remaining` / `-Reset` headers on allow,
/// plus `Retry-After` on reject. A rejection is a normal outcome, not an
/// error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// The configured maximum for the strategy.
    pub limit: u32,
    /// Whole units of capacity left after this check.
    pub remaining: u32,
    /// When the quota resets, as an offset from `UNIX_EPOCH`.
    pub reset_at: Duration,
    /// How long to wait before retrying; only set on rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    /// An allowing decision.
    pub fn allow(limit: u32, remaining: u32, reset_at: Duration) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at,
            retry_after: None,
        }
    }

    /// A rejecting decision with a retry hint.
    pub fn reject(limit: u32, remaining: u32, reset_at: Duration, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            limit,
            remaining,
            reset_at,
            retry_after: Some(retry_after),
        }
    }

    /// `Retry-After` in whole seconds, rounded up so clients never retry
    /// early. Present only on rejections.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after
            .map(|d| d.as_secs_f64().ceil().max(1.0) as u64)
    }

    /// `X-RateLimit-Reset` as whole seconds since the epoch.
    pub fn reset_at_secs(&self) -> u64 {
        self.reset_at.as_secs()
    }
}
