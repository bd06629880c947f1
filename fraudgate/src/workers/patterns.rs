// fraudgate/src/workers/patterns.rs
//
// Behavioral pattern recorders — failed logins, account creations and
// checkout attempts, each keyed by client IP.
//
//   failed_login      1h window   >5 attempts   OR >3 distinct emails
//   account_creation  24h window  >3 creations
//   checkout_attempt  1h window   >3 distinct cards OR >5 attempts
//
// Event timestamps are pruned on every write. The distinct email/card sets
// are NOT pruned by time: an IP that slowly works through many emails or
// cards over days still trips the diversity check until the reaper drops
// the whole entry (24h after its last event).

use tracing::debug;

use crate::error::{require_non_empty, Result};
use crate::events::PaymentDetails;
use crate::state::{PatternKind, RiskSignalStore};

pub fn record_failed_login(store: &RiskSignalStore, ip: &str, email: &str) -> Result<bool> {
    require_non_empty("ip", ip)?;
    require_non_empty("email", email)?;

    let cfg  = store.config();
    let snap = store.record_pattern(PatternKind::FailedLogin, ip, Some(email));
    let suspicious = snap.events > cfg.failed_login_max_attempts
        || snap.distinct > cfg.failed_login_max_emails;

    if suspicious {
        debug!(ip, attempts = snap.events, emails = snap.distinct, "suspicious login failures");
    }
    Ok(suspicious)
}

pub fn record_account_creation(store: &RiskSignalStore, ip: &str) -> Result<bool> {
    require_non_empty("ip", ip)?;

    let snap = store.record_pattern(PatternKind::AccountCreation, ip, None);
    let suspicious = snap.events > store.config().account_creation_max;

    if suspicious {
        debug!(ip, created = snap.events, "account creation burst");
    }
    Ok(suspicious)
}

pub fn record_checkout_attempt(store: &RiskSignalStore, ip: &str, card_fingerprint: &str) -> Result<bool> {
    require_non_empty("ip", ip)?;
    require_non_empty("card fingerprint", card_fingerprint)?;

    let cfg  = store.config();
    let snap = store.record_pattern(PatternKind::CheckoutAttempt, ip, Some(card_fingerprint));
    let suspicious = snap.distinct > cfg.checkout_max_cards
        || snap.events > cfg.checkout_max_attempts;

    if suspicious {
        debug!(ip, attempts = snap.events, cards = snap.distinct, "card cycling");
    }
    Ok(suspicious)
}

/// Compact card identity: `{bin}:{last4}`.
pub fn card_fingerprint(payment: &PaymentDetails) -> String {
    format!("{}:{}", payment.card_bin, payment.card_last4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::{Duration, TimeZone, Utc};
    use crate::clock::ManualClock;
    use crate::config::RiskConfig;
    use crate::error::RiskError;

    fn store() -> (Arc<ManualClock>, RiskSignalStore) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 8, 9, 0, 0).unwrap()));
        let store = RiskSignalStore::with_config(RiskConfig::default(), clock.clone()).unwrap();
        (clock, store)
    }

    #[test]
    fn six_failures_in_an_hour_flag() {
        let (clock, s) = store();
        for _ in 0..5 {
            assert!(!record_failed_login(&s, "1.2.3.4", "victim@example.com").unwrap());
            clock.advance(Duration::minutes(5));
        }
        assert!(record_failed_login(&s, "1.2.3.4", "victim@example.com").unwrap());
    }

    #[test]
    fn failures_older_than_an_hour_do_not_count() {
        let (clock, s) = store();
        record_failed_login(&s, "1.2.3.4", "v@example.com").unwrap();
        record_failed_login(&s, "1.2.3.4", "v@example.com").unwrap();

        // Exactly one hour later the first two are out of the window
        clock.advance_ms(3_600_000);
        for _ in 0..3 {
            assert!(!record_failed_login(&s, "1.2.3.4", "v@example.com").unwrap());
        }
        // 6 events total, only 4 inside the window
        assert!(!record_failed_login(&s, "1.2.3.4", "v@example.com").unwrap());
        assert_eq!(s.pattern(PatternKind::FailedLogin, "1.2.3.4").unwrap().count(), 4);
    }

    #[test]
    fn fourth_distinct_email_flags_even_across_days() {
        let (clock, s) = store();
        for email in ["a@x.io", "b@x.io", "c@x.io"] {
            assert!(!record_failed_login(&s, "5.5.5.5", email).unwrap());
            clock.advance(Duration::hours(20));
        }
        assert!(record_failed_login(&s, "5.5.5.5", "d@x.io").unwrap());
    }

    #[test]
    fn fourth_account_in_a_day_flags() {
        let (clock, s) = store();
        for _ in 0..3 {
            assert!(!record_account_creation(&s, "7.7.7.7").unwrap());
            clock.advance(Duration::hours(6));
        }
        assert!(record_account_creation(&s, "7.7.7.7").unwrap());

        // A day later the old creations have aged out
        clock.advance(Duration::hours(24));
        assert!(!record_account_creation(&s, "7.7.7.7").unwrap());
    }

    #[test]
    fn checkout_flags_on_card_diversity_or_volume() {
        let (_, s) = store();
        for last4 in ["0001", "0002", "0003"] {
            assert!(!record_checkout_attempt(&s, "ip-a", &format!("411111:{last4}")).unwrap());
        }
        assert!(record_checkout_attempt(&s, "ip-a", "411111:0004").unwrap());

        for _ in 0..5 {
            assert!(!record_checkout_attempt(&s, "ip-b", "555555:4444").unwrap());
        }
        assert!(record_checkout_attempt(&s, "ip-b", "555555:4444").unwrap());
    }

    #[test]
    fn checkouts_older_than_an_hour_do_not_count() {
        let (clock, s) = store();
        for _ in 0..2 {
            assert!(!record_checkout_attempt(&s, "6.6.6.6", "411111:1111").unwrap());
        }

        clock.advance_ms(3_600_000);
        for _ in 0..3 {
            assert!(!record_checkout_attempt(&s, "6.6.6.6", "411111:1111").unwrap());
        }
        // Sixth attempt overall, fourth inside the hour
        assert!(!record_checkout_attempt(&s, "6.6.6.6", "411111:1111").unwrap());
        assert_eq!(s.pattern(PatternKind::CheckoutAttempt, "6.6.6.6").unwrap().count(), 4);
    }

    #[test]
    fn card_fingerprint_joins_bin_and_last4() {
        let p = PaymentDetails { card_bin: "411111".into(), card_last4: "1111".into() };
        assert_eq!(card_fingerprint(&p), "411111:1111");
    }

    #[test]
    fn empty_ip_is_rejected() {
        let (_, s) = store();
        assert_eq!(record_account_creation(&s, " "), Err(RiskError::EmptyField("ip")));
        assert_eq!(record_checkout_attempt(&s, "ip", ""), Err(RiskError::EmptyField("card fingerprint")));
    }
}
