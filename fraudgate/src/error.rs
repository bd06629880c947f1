// fraudgate/src/error.rs
//
// Precondition taxonomy for the risk gate.
//
// Nothing in the gate performs I/O, so there is nothing to retry. Every error
// here is a caller mistake (empty key, zero limit, nonsensical window) and is
// raised before the signal store is touched.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("rate limit must allow at least one action")]
    ZeroLimit,

    #[error("{name} must be positive, got {millis}ms")]
    NonPositiveWindow { name: &'static str, millis: i64 },

    #[error("{name} of {millis}ms exceeds the {max}ms maximum")]
    WindowOutOfRange { name: &'static str, millis: i64, max: i64 },

    #[error("order total must be a finite non-negative amount, got {0}")]
    InvalidOrderTotal(f64),

    #[error("reaper needs a running tokio runtime (server context)")]
    NoRuntime,

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RiskError>;

/// Longest accepted window: 100 years. Keeps every `now + window` and
/// `Duration::days` in range.
pub const MAX_WINDOW_MS: i64 = 100 * 365 * 86_400_000;

/// Reject empty identifiers. Whitespace-only keys count as empty.
pub(crate) fn require_non_empty(name: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RiskError::EmptyField(name));
    }
    Ok(())
}

pub(crate) fn require_positive_window(name: &'static str, window: chrono::Duration) -> Result<()> {
    let millis = window.num_milliseconds();
    if millis <= 0 {
        return Err(RiskError::NonPositiveWindow { name, millis });
    }
    if millis > MAX_WINDOW_MS {
        return Err(RiskError::WindowOutOfRange { name, millis, max: MAX_WINDOW_MS });
    }
    Ok(())
}
