// fraudgate/src/state/store.rs
//
// RiskSignalStore — the process-local signal store shared by all evaluators.
// DashMap = sharded concurrent HashMap. Every read-modify-write on an entry
// runs under that entry's shard lock (`entry()` guard), so concurrent requests
// hitting the same key never lose an update.
//
// Maps:
//   rate_limits        (identifier, action) → RateLimitEntry
//   devices            fingerprint          → DeviceFingerprintEntry
//   failed_logins      ip                   → PatternWindow (distinct = emails)
//   account_creations  ip                   → PatternWindow
//   checkout_attempts  ip                   → PatternWindow (distinct = cards)
//
// Nothing here is persisted. A restart starts from empty maps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::RiskConfig;
use crate::error::{Result, RiskError, MAX_WINDOW_MS};
use crate::state::window::{DeviceFingerprintEntry, PatternWindow, RateLimitEntry};

type RateKey = (String, String);

/// The three behavioral pattern families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    FailedLogin,
    AccountCreation,
    CheckoutAttempt,
}

impl PatternKind {
    pub fn window(&self, config: &RiskConfig) -> Duration {
        match self {
            Self::FailedLogin     => config.failed_login_window(),
            Self::AccountCreation => config.account_creation_window(),
            Self::CheckoutAttempt => config.checkout_window(),
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailedLogin     => write!(f, "failed_login"),
            Self::AccountCreation => write!(f, "account_creation"),
            Self::CheckoutAttempt => write!(f, "checkout_attempt"),
        }
    }
}

/// Pattern state right after a write, pruned to the pattern's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternSnapshot {
    pub events:   usize,
    pub distinct: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceObservation {
    FirstSight,
    KnownUser,
    NewUser { distinct_users: usize },
}

/// Eviction counts from one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub rate_limits:       usize,
    pub devices:           usize,
    pub failed_logins:     usize,
    pub account_creations: usize,
    pub checkout_attempts: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.rate_limits + self.devices + self.failed_logins
            + self.account_creations + self.checkout_attempts
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreStats {
    pub rate_limits:       usize,
    pub devices:           usize,
    pub failed_logins:     usize,
    pub account_creations: usize,
    pub checkout_attempts: usize,
    pub evaluations:       u64,
    pub high_risk_orders:  u64,
    pub sweeps:            u64,
}

pub struct RiskSignalStore {
    rate_limits:       DashMap<RateKey, RateLimitEntry>,
    devices:           DashMap<String, DeviceFingerprintEntry>,
    failed_logins:     DashMap<String, PatternWindow>,
    account_creations: DashMap<String, PatternWindow>,
    checkout_attempts: DashMap<String, PatternWindow>,

    config: RiskConfig,
    clock:  Arc<dyn Clock>,

    // Global counters
    pub total_evaluations: AtomicU64,
    pub high_risk_orders:  AtomicU64,
    pub total_sweeps:      AtomicU64,
}

impl RiskSignalStore {
    /// Store with reference thresholds and the wall clock.
    pub fn new() -> Self {
        Self::build(RiskConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(config: RiskConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: RiskConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            rate_limits:       DashMap::new(),
            devices:           DashMap::new(),
            failed_logins:     DashMap::new(),
            account_creations: DashMap::new(),
            checkout_attempts: DashMap::new(),
            config,
            clock,
            total_evaluations: AtomicU64::new(0),
            high_risk_orders:  AtomicU64::new(0),
            total_sweeps:      AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RiskConfig { &self.config }

    pub fn now(&self) -> DateTime<Utc> { self.clock.now() }

    fn patterns(&self, kind: PatternKind) -> &DashMap<String, PatternWindow> {
        match kind {
            PatternKind::FailedLogin     => &self.failed_logins,
            PatternKind::AccountCreation => &self.account_creations,
            PatternKind::CheckoutAttempt => &self.checkout_attempts,
        }
    }

    // ── Mutations (one entry guard each) ──────────────────────────────────────

    pub(crate) fn hit_rate_limit(&self, identifier: &str, action: &str, window: Duration) -> Result<u32> {
        let now = self.now();
        let next_reset = now.checked_add_signed(window).ok_or(RiskError::WindowOutOfRange {
            name:   "rate limit window",
            millis: window.num_milliseconds(),
            max:    MAX_WINDOW_MS,
        })?;
        let mut entry = self.rate_limits
            .entry((identifier.to_string(), action.to_string()))
            .or_insert_with(|| RateLimitEntry::new(next_reset));
        Ok(entry.hit(now, next_reset))
    }

    pub(crate) fn observe_device(&self, fingerprint: &str, user_id: &str) -> DeviceObservation {
        let now = self.now();
        match self.devices.entry(fingerprint.to_string()) {
            Entry::Vacant(v) => {
                v.insert(DeviceFingerprintEntry::new(user_id, now));
                DeviceObservation::FirstSight
            }
            Entry::Occupied(mut o) => {
                let device = o.get_mut();
                if device.observe(user_id) {
                    DeviceObservation::NewUser { distinct_users: device.user_ids.len() }
                } else {
                    DeviceObservation::KnownUser
                }
            }
        }
    }

    pub(crate) fn record_pattern(
        &self,
        kind:  PatternKind,
        ip:    &str,
        value: Option<&str>,
    ) -> PatternSnapshot {
        let now    = self.now();
        let window = kind.window(&self.config);
        let mut entry = self.patterns(kind).entry(ip.to_string()).or_default();
        entry.record(now, window, value);
        PatternSnapshot { events: entry.count(), distinct: entry.distinct_count() }
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn rate_limit(&self, identifier: &str, action: &str) -> Option<RateLimitEntry> {
        self.rate_limits
            .get(&(identifier.to_string(), action.to_string()))
            .map(|e| e.clone())
    }

    pub fn device_users(&self, fingerprint: &str) -> Option<usize> {
        self.devices.get(fingerprint).map(|d| d.user_ids.len())
    }

    pub fn pattern(&self, kind: PatternKind, ip: &str) -> Option<PatternWindow> {
        self.patterns(kind).get(ip).map(|p| p.clone())
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            rate_limits:       self.rate_limits.len(),
            devices:           self.devices.len(),
            failed_logins:     self.failed_logins.len(),
            account_creations: self.account_creations.len(),
            checkout_attempts: self.checkout_attempts.len(),
            evaluations:       self.total_evaluations.load(Ordering::Relaxed),
            high_risk_orders:  self.high_risk_orders.load(Ordering::Relaxed),
            sweeps:            self.total_sweeps.load(Ordering::Relaxed),
        }
    }

    // ── Housekeeping ──────────────────────────────────────────────────────────

    /// Evict expired entries from every map. This is the only time-driven
    /// mutation; the reaper calls it on a fixed interval.
    pub fn cleanup(&self) -> SweepReport {
        let now       = self.now();
        let device_ttl = self.config.device_retention();
        let retention  = self.config.pattern_retention();

        let mut report = SweepReport {
            rate_limits: sweep(&self.rate_limits, |e| e.is_expired(now)),
            devices:     sweep(&self.devices, |d| d.is_expired(now, device_ttl)),
            ..SweepReport::default()
        };
        report.failed_logins     = sweep(&self.failed_logins, |p| p.is_stale(now, retention));
        report.account_creations = sweep(&self.account_creations, |p| p.is_stale(now, retention));
        report.checkout_attempts = sweep(&self.checkout_attempts, |p| p.is_stale(now, retention));

        self.total_sweeps.fetch_add(1, Ordering::Relaxed);
        debug!(
            evicted = report.total(),
            rate_limits = report.rate_limits,
            devices = report.devices,
            "signal store sweep"
        );
        report
    }
}

impl Default for RiskSignalStore { fn default() -> Self { Self::new() } }

fn sweep<K, V>(map: &DashMap<K, V>, expired: impl Fn(&V) -> bool) -> usize
where
    K: Eq + std::hash::Hash,
{
    let before = map.len();
    map.retain(|_, v| !expired(&*v));
    before.saturating_sub(map.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn store() -> (Arc<ManualClock>, RiskSignalStore) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 8, 9, 0, 0).unwrap()));
        let store = RiskSignalStore::with_config(RiskConfig::default(), clock.clone()).unwrap();
        (clock, store)
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = RiskConfig { reaper_interval_secs: 0, ..RiskConfig::default() };
        assert!(RiskSignalStore::with_config(cfg, Arc::new(SystemClock)).is_err());
    }

    #[test]
    fn device_observation_sequence() {
        let (_, s) = store();
        assert_eq!(s.observe_device("fp", "a"), DeviceObservation::FirstSight);
        assert_eq!(s.observe_device("fp", "a"), DeviceObservation::KnownUser);
        assert_eq!(s.observe_device("fp", "b"), DeviceObservation::NewUser { distinct_users: 2 });
        assert_eq!(s.device_users("fp"), Some(2));
    }

    #[test]
    fn pattern_families_are_independent() {
        let (_, s) = store();
        s.record_pattern(PatternKind::FailedLogin, "1.1.1.1", Some("x@example.com"));
        s.record_pattern(PatternKind::FailedLogin, "1.1.1.1", Some("y@example.com"));
        let snap = s.record_pattern(PatternKind::CheckoutAttempt, "1.1.1.1", Some("411111:1111"));
        assert_eq!(snap, PatternSnapshot { events: 1, distinct: 1 });
        assert_eq!(s.pattern(PatternKind::FailedLogin, "1.1.1.1").unwrap().count(), 2);
        assert!(s.pattern(PatternKind::AccountCreation, "1.1.1.1").is_none());
    }

    #[test]
    fn cleanup_evicts_each_family_on_its_own_horizon() {
        let (clock, s) = store();
        s.hit_rate_limit("1.1.1.1", "login", Duration::seconds(60)).unwrap();
        s.observe_device("fp", "a");
        s.record_pattern(PatternKind::FailedLogin, "1.1.1.1", Some("a@example.com"));
        s.record_pattern(PatternKind::AccountCreation, "2.2.2.2", None);

        clock.advance(Duration::minutes(2));
        let r = s.cleanup();
        assert_eq!(r.rate_limits, 1);
        assert_eq!(r.total(), 1);

        // Pattern entries outlive their own window until the 24h outer bound
        clock.advance(Duration::hours(24));
        let r = s.cleanup();
        assert_eq!(r.failed_logins, 1);
        assert_eq!(r.account_creations, 1);
        assert_eq!(r.devices, 0);

        clock.advance(Duration::days(90));
        assert_eq!(s.cleanup().devices, 1);

        let stats = s.stats();
        assert_eq!(stats.rate_limits + stats.devices + stats.failed_logins, 0);
        assert_eq!(stats.sweeps, 3);
    }

    #[test]
    fn concurrent_hits_are_not_lost() {
        let (_, s) = store();
        let s = Arc::new(s);
        let handles: Vec<_> = (0..8).map(|_| {
            let s = Arc::clone(&s);
            std::thread::spawn(move || {
                for _ in 0..250 {
                    s.hit_rate_limit("9.9.9.9", "checkout", Duration::hours(1)).unwrap();
                }
            })
        }).collect();
        for h in handles { h.join().unwrap(); }
        assert_eq!(s.rate_limit("9.9.9.9", "checkout").unwrap().count, 2_000);
    }

    #[test]
    fn rate_window_past_the_end_of_time_is_an_error() {
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::MAX_UTC - Duration::hours(1)));
        let s = RiskSignalStore::with_config(RiskConfig::default(), clock).unwrap();
        assert!(matches!(
            s.hit_rate_limit("1.1.1.1", "login", Duration::days(1)),
            Err(RiskError::WindowOutOfRange { .. })
        ));
        assert_eq!(s.stats().rate_limits, 0);
    }
}
