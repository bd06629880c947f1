// fraudgate/src/lib.rs
//
// fraudgate — in-memory fraud-risk gate for storefront checkout flows.
//
// Request handlers call the evaluators synchronously with a shared
// RiskSignalStore and decide what to do with the verdict (block, hold for
// review, allow). Nothing is persisted; the reaper bounds memory.
//
//   workers::velocity     is_rate_limited
//   workers::fingerprint  generate_device_fingerprint, is_suspicious_device
//   workers::patterns     record_failed_login, record_account_creation,
//                         record_checkout_attempt
//   engine::fusion        assess_order_risk
//   reaper                start_reaper / ReaperHandle

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod reaper;
pub mod state;
pub mod workers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RateLimitConfig, RiskConfig};
pub use engine::assess_order_risk;
pub use error::{Result, RiskError};
pub use events::{
    Address, DeviceAttributes, Order, OrderRiskAssessment, PaymentDetails, RiskFactor, RiskLevel,
    UserProfile,
};
pub use reaper::{start_reaper, ReaperHandle};
pub use state::{PatternKind, RiskSignalStore, StoreStats, SweepReport};
pub use workers::{
    card_fingerprint, generate_device_fingerprint, is_rate_limited, is_suspicious_device,
    record_account_creation, record_checkout_attempt, record_failed_login, RateLimit,
};
