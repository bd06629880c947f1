// fraudgate/src/workers/velocity.rs
//
// Velocity worker — fixed-window rate limiting keyed by (client, action).
//
// The increment that crosses the limit is still counted, so with limit L the
// (L+1)th call in a window is the first to report limited and every later
// call in that window keeps reporting limited.

use chrono::Duration;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::{require_non_empty, require_positive_window, Result, RiskError};
use crate::state::RiskSignalStore;

/// Limit policy for one action namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit:  u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Out-of-range millisecond counts are clamped here and rejected by
    /// validation.
    pub fn per_ms(limit: u32, window_ms: i64) -> Self {
        Self::new(limit, Duration::milliseconds(window_ms.max(-i64::MAX)))
    }

    fn validate(&self) -> Result<()> {
        if self.limit == 0 { return Err(RiskError::ZeroLimit); }
        require_positive_window("rate limit window", self.window)
    }
}

/// 5 actions per 60 seconds.
impl Default for RateLimit {
    fn default() -> Self { Self::per_ms(5, 60_000) }
}

impl From<RateLimitConfig> for RateLimit {
    fn from(c: RateLimitConfig) -> Self { Self::per_ms(c.limit, c.window_ms) }
}

pub fn is_rate_limited(
    store:      &RiskSignalStore,
    identifier: &str,
    action:     &str,
    policy:     RateLimit,
) -> Result<bool> {
    require_non_empty("identifier", identifier)?;
    require_non_empty("action", action)?;
    policy.validate()?;

    let count   = store.hit_rate_limit(identifier, action, policy.window)?;
    let limited = count > policy.limit;
    if limited {
        debug!(identifier, action, count, limit = policy.limit, "rate limited");
    }
    Ok(limited)
}
