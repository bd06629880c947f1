// fraudgate/src/config.rs
//
// Tunables for the risk gate. Defaults match the storefront's reference
// thresholds; a JSON file may override any subset of them.
//
// Example (every key optional):
//   {
//     "checkout_rate_limit": { "limit": 20, "window_ms": 3600000 },
//     "device_max_users": 5,
//     "reaper_interval_secs": 900
//   }

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, MAX_WINDOW_MS};

const MS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub limit:     u32,
    pub window_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    // ── Rate limiting ─────────────────────────────────────────────────────────
    pub default_rate_limit:  RateLimitConfig,   // 5 per minute
    pub checkout_rate_limit: RateLimitConfig,   // 10 per hour (order factor 1)

    // ── Device fingerprints ───────────────────────────────────────────────────
    pub device_max_users:      usize,           // >3 distinct users = suspicious
    pub device_retention_days: i64,             // evicted 90d after first sight

    // ── Behavioral patterns ───────────────────────────────────────────────────
    pub failed_login_window_ms:     i64,
    pub failed_login_max_attempts:  usize,
    pub failed_login_max_emails:    usize,
    pub account_creation_window_ms: i64,
    pub account_creation_max:       usize,
    pub checkout_window_ms:         i64,
    pub checkout_max_attempts:      usize,
    pub checkout_max_cards:         usize,
    pub pattern_retention_ms:       i64,        // reaper's outer bound for all three

    // ── Order scoring ─────────────────────────────────────────────────────────
    pub high_value_total:     f64,
    pub new_account_age_days: i64,
    pub medium_score:         u32,
    pub high_score:           u32,

    // ── Reaper ────────────────────────────────────────────────────────────────
    pub reaper_interval_secs: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            default_rate_limit:         RateLimitConfig { limit: 5,  window_ms: 60_000 },
            checkout_rate_limit:        RateLimitConfig { limit: 10, window_ms: 3_600_000 },
            device_max_users:           3,
            device_retention_days:      90,
            failed_login_window_ms:     3_600_000,
            failed_login_max_attempts:  5,
            failed_login_max_emails:    3,
            account_creation_window_ms: 86_400_000,
            account_creation_max:       3,
            checkout_window_ms:         3_600_000,
            checkout_max_attempts:      5,
            checkout_max_cards:         3,
            pattern_retention_ms:       86_400_000,
            high_value_total:           500.0,
            new_account_age_days:       7,
            medium_score:               30,
            high_score:                 50,
            reaper_interval_secs:       3600,
        }
    }
}

impl RiskConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), RiskError> {
        for (name, rl) in [("default_rate_limit", self.default_rate_limit),
                           ("checkout_rate_limit", self.checkout_rate_limit)] {
            if rl.limit == 0 {
                return Err(RiskError::InvalidConfig(format!("{name}.limit must be positive")));
            }
            if rl.window_ms <= 0 || rl.window_ms > MAX_WINDOW_MS {
                return Err(RiskError::InvalidConfig(format!(
                    "{name}.window_ms must be in 1..={MAX_WINDOW_MS}"
                )));
            }
        }

        // (name, value, upper bound)
        let windows = [
            ("failed_login_window_ms",     self.failed_login_window_ms,     MAX_WINDOW_MS),
            ("account_creation_window_ms", self.account_creation_window_ms, MAX_WINDOW_MS),
            ("checkout_window_ms",         self.checkout_window_ms,         MAX_WINDOW_MS),
            ("pattern_retention_ms",       self.pattern_retention_ms,       MAX_WINDOW_MS),
            ("device_retention_days",      self.device_retention_days,      MAX_WINDOW_MS / MS_PER_DAY),
            ("new_account_age_days",       self.new_account_age_days,       MAX_WINDOW_MS / MS_PER_DAY),
            ("reaper_interval_secs",       self.reaper_interval_secs.min(i64::MAX as u64) as i64,
                                                                            MAX_WINDOW_MS / 1000),
        ];
        if let Some((name, _, max)) = windows.iter().find(|(_, v, max)| *v <= 0 || *v > *max) {
            return Err(RiskError::InvalidConfig(format!("{name} must be in 1..={max}")));
        }
        if !self.high_value_total.is_finite() || self.high_value_total < 0.0 {
            return Err(RiskError::InvalidConfig("high_value_total must be a finite amount".into()));
        }
        if self.medium_score > self.high_score {
            return Err(RiskError::InvalidConfig(format!(
                "medium_score {} exceeds high_score {}", self.medium_score, self.high_score
            )));
        }
        Ok(())
    }

    pub fn failed_login_window(&self) -> Duration { Duration::milliseconds(self.failed_login_window_ms) }
    pub fn account_creation_window(&self) -> Duration { Duration::milliseconds(self.account_creation_window_ms) }
    pub fn checkout_window(&self) -> Duration { Duration::milliseconds(self.checkout_window_ms) }
    pub fn pattern_retention(&self) -> Duration { Duration::milliseconds(self.pattern_retention_ms) }
    pub fn device_retention(&self) -> Duration { Duration::days(self.device_retention_days) }
    pub fn new_account_age(&self) -> Duration { Duration::days(self.new_account_age_days) }

    pub fn reaper_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reaper_interval_secs)
    }
}
