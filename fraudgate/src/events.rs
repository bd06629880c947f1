// fraudgate/src/events.rs
//
// Domain types flowing through the risk gate.
//
// Field names serialize in camelCase so storefront route handlers can pass
// their order/user/device payloads straight through without a mapping layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Caller-supplied records ───────────────────────────────────────────────────

/// Browser/device attributes collected at checkout. Opaque strings; the
/// fingerprint only cares that all six are present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAttributes {
    pub user_agent:        String,
    pub ip:                String,
    pub screen_resolution: String,
    pub timezone:          String,
    pub language:          String,
    pub platform:          String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub card_bin:   String, // first 6 digits
    pub card_last4: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id:               Option<String>,
    pub total:            f64,
    pub billing_address:  Address,
    pub shipping_address: Address,
    pub payment:          PaymentDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id:         String,
    pub created_at: DateTime<Utc>,
}

// ── Assessment ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low    => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High   => write!(f, "high"),
        }
    }
}

/// Order risk factors, declared in evaluation order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    HighCheckoutFrequency,
    SharedDevice,
    CountryMismatch,
    HighValueNewAccount,
    CardCycling,
}

impl RiskFactor {
    pub fn description(&self) -> &'static str {
        match self {
            Self::HighCheckoutFrequency => "High checkout frequency",
            Self::SharedDevice          => "Device associated with multiple users",
            Self::CountryMismatch       => "Mismatched billing and shipping countries",
            Self::HighValueNewAccount   => "High-value order from new account",
            Self::CardCycling           => "Multiple cards used from same IP",
        }
    }
}

impl std::fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Result of one checkout evaluation. Computed fresh per call, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRiskAssessment {
    pub risk_score:      u32,
    pub risk_level:      RiskLevel,
    pub risk_factors:    Vec<String>,
    pub requires_review: bool,
}

// ── Daemon feed ───────────────────────────────────────────────────────────────

/// One line of the JSONL risk-event feed consumed by the `fraudgate` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp:  Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub kind:       RiskEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskEventKind {
    FailedLogin {
        ip:    String,
        email: String,
    },
    AccountCreation {
        ip: String,
    },
    Checkout {
        order:  Order,
        user:   UserProfile,
        device: DeviceAttributes,
    },
    RateCheck {
        identifier: String,
        action:     String,
        #[serde(default)]
        limit:      Option<u32>,
        #[serde(default)]
        window_ms:  Option<i64>,
    },
}

impl RiskEventKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FailedLogin { .. }     => "failed_login",
            Self::AccountCreation { .. } => "account_creation",
            Self::Checkout { .. }        => "checkout",
            Self::RateCheck { .. }       => "rate_check",
        }
    }

    /// Client key the event is accounted under.
    pub fn subject(&self) -> &str {
        match self {
            Self::FailedLogin { ip, .. }
            | Self::AccountCreation { ip }  => ip,
            Self::Checkout { device, .. }   => &device.ip,
            Self::RateCheck { identifier, .. } => identifier,
        }
    }
}

/// Outcome of one feed event, written by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub request_id: Option<String>,
    pub kind:       String,
    pub subject:    String,
    pub flagged:    bool,
    pub assessment: Option<OrderRiskAssessment>,
    pub timestamp:  DateTime<Utc>,
}

impl RiskVerdict {
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
