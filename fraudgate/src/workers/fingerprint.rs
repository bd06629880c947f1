// fraudgate/src/workers/fingerprint.rs
//
// Fingerprint worker — coarse device identity + multi-account detection.
//
// The fingerprint is SHA256 over the six device attributes joined with '|'
// in fixed order. No similarity scoring: a single changed attribute (e.g. a
// new IP after a network change) yields an unrelated fingerprint.
//
// A device is suspicious on the call that introduces its 4th distinct user
// and on every later call that introduces yet another one. Returning users
// never trip it, however crowded the device already is.

use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{require_non_empty, Result};
use crate::events::DeviceAttributes;
use crate::state::{DeviceObservation, RiskSignalStore};

pub fn generate_device_fingerprint(device: &DeviceAttributes) -> String {
    let canonical = [
        device.user_agent.as_str(),
        device.ip.as_str(),
        device.screen_resolution.as_str(),
        device.timezone.as_str(),
        device.language.as_str(),
        device.platform.as_str(),
    ].join("|");

    let mut h = Sha256::new();
    h.update(canonical.as_bytes());
    hex::encode(h.finalize())
}

pub fn is_suspicious_device(store: &RiskSignalStore, fingerprint: &str, user_id: &str) -> Result<bool> {
    require_non_empty("fingerprint", fingerprint)?;
    require_non_empty("user id", user_id)?;

    match store.observe_device(fingerprint, user_id) {
        DeviceObservation::FirstSight | DeviceObservation::KnownUser => Ok(false),
        DeviceObservation::NewUser { distinct_users } => {
            let suspicious = distinct_users > store.config().device_max_users;
            if suspicious {
                let short: String = fingerprint.chars().take(12).collect();
                info!(fingerprint = %short, distinct_users, "device shared across accounts");
            }
            Ok(suspicious)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use proptest::prelude::*;
    use crate::clock::SystemClock;
    use crate::config::RiskConfig;
    use crate::error::RiskError;

    fn device() -> DeviceAttributes {
        DeviceAttributes {
            user_agent:        "Mozilla/5.0 (Macintosh)".into(),
            ip:                "1.2.3.4".into(),
            screen_resolution: "1920x1080".into(),
            timezone:          "America/New_York".into(),
            language:          "en-US".into(),
            platform:          "MacIntel".into(),
        }
    }

    #[test]
    fn fingerprint_is_sha256_of_pipe_joined_fields() {
        let fp = generate_device_fingerprint(&device());
        let mut h = Sha256::new();
        h.update(b"Mozilla/5.0 (Macintosh)|1.2.3.4|1920x1080|America/New_York|en-US|MacIntel");
        assert_eq!(fp, hex::encode(h.finalize()));
        assert_eq!(fp.len(), 64);
    }

    #[test]
    fn ip_change_changes_fingerprint() {
        let mut moved = device();
        moved.ip = "5.6.7.8".into();
        assert_ne!(generate_device_fingerprint(&device()), generate_device_fingerprint(&moved));
    }

    #[test]
    fn fourth_distinct_user_trips_suspicion() {
        let s = RiskSignalStore::with_config(RiskConfig::default(), Arc::new(SystemClock)).unwrap();
        let fp = generate_device_fingerprint(&device());

        assert!(!is_suspicious_device(&s, &fp, "A").unwrap());
        assert!(!is_suspicious_device(&s, &fp, "B").unwrap());
        assert!(!is_suspicious_device(&s, &fp, "C").unwrap());
        assert!(is_suspicious_device(&s, &fp, "D").unwrap());

        // Known users never flag on their own
        for known in ["A", "B", "C", "D"] {
            assert!(!is_suspicious_device(&s, &fp, known).unwrap());
        }
        assert!(is_suspicious_device(&s, &fp, "E").unwrap());
        assert_eq!(s.device_users(&fp), Some(5));
    }

    #[test]
    fn empty_user_id_is_rejected() {
        let s = RiskSignalStore::new();
        assert_eq!(is_suspicious_device(&s, "fp", ""), Err(RiskError::EmptyField("user id")));
        assert_eq!(s.device_users("fp"), None);
    }

    fn arb_device() -> impl Strategy<Value = DeviceAttributes> {
        ("[ -~]{0,24}", "[0-9.]{1,15}", "[0-9x]{0,9}", "[A-Za-z/_]{0,20}", "[a-z-]{0,5}", "[A-Za-z0-9]{0,10}")
            .prop_map(|(ua, ip, res, tz, lang, plat)| DeviceAttributes {
                user_agent: ua, ip, screen_resolution: res, timezone: tz, language: lang, platform: plat,
            })
    }

    proptest! {
        #[test]
        fn fingerprint_is_deterministic(d in arb_device()) {
            prop_assert_eq!(generate_device_fingerprint(&d), generate_device_fingerprint(&d.clone()));
        }

        #[test]
        fn changing_platform_changes_fingerprint(d in arb_device(), suffix in "[A-Za-z0-9]{1,4}") {
            let mut other = d.clone();
            other.platform.push_str(&suffix);
            prop_assert_ne!(generate_device_fingerprint(&d), generate_device_fingerprint(&other));
        }
    }
}
