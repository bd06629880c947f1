pub mod fingerprint;
pub mod patterns;
pub mod velocity;

pub use fingerprint::{generate_device_fingerprint, is_suspicious_device};
pub use patterns::{card_fingerprint, record_account_creation, record_checkout_attempt, record_failed_login};
pub use velocity::{is_rate_limited, RateLimit};
