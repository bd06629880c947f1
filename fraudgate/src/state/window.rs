// fraudgate/src/state/window.rs
//
// Per-key entries held by the signal store.
//
//   RateLimitEntry         (client, action) → fixed window counter
//   DeviceFingerprintEntry fingerprint      → distinct users seen on the device
//   PatternWindow          client ip        → rolling event timestamps
//                                             + cumulative distinct values
//
// Entries never read the clock themselves; the caller passes `now` so every
// mutation in one evaluation sees the same instant.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};

// ── Rate limit counter ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count:    u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitEntry {
    /// `reset_at` is `now + window`, computed by the caller with checked
    /// arithmetic.
    pub fn new(reset_at: DateTime<Utc>) -> Self {
        Self { count: 0, reset_at }
    }

    /// Count one action and return the count for the current window.
    /// The window restarts only once `now` is strictly past `reset_at`;
    /// `next_reset` is the deadline a restarted window gets.
    pub fn hit(&mut self, now: DateTime<Utc>, next_reset: DateTime<Utc>) -> u32 {
        if now > self.reset_at {
            self.count    = 0;
            self.reset_at = next_reset;
        }
        self.count = self.count.saturating_add(1);
        self.count
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_at
    }
}

// ── Device fingerprint ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DeviceFingerprintEntry {
    pub user_ids:   HashSet<String>,
    pub first_seen: DateTime<Utc>,
}

impl DeviceFingerprintEntry {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_ids:   HashSet::from([user_id.to_string()]),
            first_seen: now,
        }
    }

    /// Returns true if `user_id` had not been seen on this device before.
    pub fn observe(&mut self, user_id: &str) -> bool {
        !self.user_ids.contains(user_id) && self.user_ids.insert(user_id.to_string())
    }

    /// Age is measured from first sight, not last activity.
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        now - self.first_seen > retention
    }
}

// ── Behavioral pattern window ─────────────────────────────────────────────────

/// Rolling event history for one client. `events` is pruned to the pattern's
/// window on every write; `distinct` accumulates for the life of the entry.
#[derive(Debug, Clone, Default)]
pub struct PatternWindow {
    pub events:   VecDeque<DateTime<Utc>>,
    pub distinct: HashSet<String>,
}

impl PatternWindow {
    pub fn new() -> Self { Self::default() }

    pub fn record(&mut self, now: DateTime<Utc>, window: Duration, value: Option<&str>) {
        self.events.push_back(now);
        if let Some(v) = value {
            if !self.distinct.contains(v) {
                self.distinct.insert(v.to_string());
            }
        }
        self.prune(now, window);
    }

    /// Keep only events strictly younger than `window`.
    pub fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        self.events.retain(|t| now - *t < window);
    }

    pub fn count(&self) -> usize { self.events.len() }

    pub fn distinct_count(&self) -> usize { self.distinct.len() }

    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.events.iter().max().copied()
    }

    pub fn is_stale(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        match self.newest() {
            Some(t) => now - t > retention,
            None    => true,
        }
    }
}
