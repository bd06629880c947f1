// fraudgate/src/engine/fusion.rs
//
// Weighted factor fusion for checkout attempts.
//
// Five independent factors, evaluated in fixed order. Only triggered factors
// add weight and appear in the assessment:
//
//   #  Factor                 Weight  Trigger
//   1  HighCheckoutFrequency    20    >10 "checkout" actions from the IP in 1h
//   2  SharedDevice             30    device fingerprint gains its 4th+ user
//   3  CountryMismatch          15    billing country != shipping country
//   4  HighValueNewAccount      25    total > 500 and account younger than 7d
//   5  CardCycling              35    checkout-attempt pattern is suspicious
//
// Bands: score >= 50 high (requires review), >= 30 medium, else low.
//
// Not idempotent. Factors 1, 2 and 5 record the attempt in the signal store,
// so callers evaluate each genuine checkout exactly once.

use std::sync::atomic::Ordering;

use tracing::info;

use crate::config::RiskConfig;
use crate::error::{require_non_empty, Result, RiskError};
use crate::events::{DeviceAttributes, Order, OrderRiskAssessment, RiskFactor, RiskLevel, UserProfile};
use crate::state::RiskSignalStore;
use crate::workers::{
    card_fingerprint, generate_device_fingerprint, is_rate_limited, is_suspicious_device,
    record_checkout_attempt,
};

pub const CHECKOUT_ACTION: &str = "checkout";

// Factor weights, in evaluation order
const WEIGHTS: &[(RiskFactor, u32)] = &[
    (RiskFactor::HighCheckoutFrequency, 20),
    (RiskFactor::SharedDevice,          30),
    (RiskFactor::CountryMismatch,       15),
    (RiskFactor::HighValueNewAccount,   25),
    (RiskFactor::CardCycling,           35),
];

pub fn weight(factor: RiskFactor) -> u32 {
    WEIGHTS.iter()
        .find(|(f, _)| *f == factor)
        .map(|(_, w)| *w)
        .unwrap_or(0)
}

pub fn classify(score: u32, config: &RiskConfig) -> RiskLevel {
    if score >= config.high_score {
        RiskLevel::High
    } else if score >= config.medium_score {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn assess_order_risk(
    store:  &RiskSignalStore,
    order:  &Order,
    user:   &UserProfile,
    device: &DeviceAttributes,
) -> Result<OrderRiskAssessment> {
    // Reject bad input before any factor writes to the store
    require_non_empty("device ip", &device.ip)?;
    require_non_empty("user id", &user.id)?;
    require_non_empty("card bin", &order.payment.card_bin)?;
    require_non_empty("card last4", &order.payment.card_last4)?;
    if !order.total.is_finite() || order.total < 0.0 {
        return Err(RiskError::InvalidOrderTotal(order.total));
    }

    let cfg = store.config();
    let now = store.now();
    let mut triggered: Vec<RiskFactor> = Vec::with_capacity(WEIGHTS.len());

    if is_rate_limited(store, &device.ip, CHECKOUT_ACTION, cfg.checkout_rate_limit.into())? {
        triggered.push(RiskFactor::HighCheckoutFrequency);
    }

    let fingerprint = generate_device_fingerprint(device);
    if is_suspicious_device(store, &fingerprint, &user.id)? {
        triggered.push(RiskFactor::SharedDevice);
    }

    if order.billing_address.country != order.shipping_address.country {
        triggered.push(RiskFactor::CountryMismatch);
    }

    let account_age = now - user.created_at;
    if order.total > cfg.high_value_total && account_age < cfg.new_account_age() {
        triggered.push(RiskFactor::HighValueNewAccount);
    }

    if record_checkout_attempt(store, &device.ip, &card_fingerprint(&order.payment))? {
        triggered.push(RiskFactor::CardCycling);
    }

    let risk_score: u32 = triggered.iter().map(|f| weight(*f)).sum();
    let risk_level      = classify(risk_score, cfg);

    store.total_evaluations.fetch_add(1, Ordering::Relaxed);
    if risk_level == RiskLevel::High {
        store.high_risk_orders.fetch_add(1, Ordering::Relaxed);
        info!(
            ip = %device.ip,
            user = %user.id,
            score = risk_score,
            factors = triggered.len(),
            "high-risk checkout"
        );
    }

    Ok(OrderRiskAssessment {
        risk_score,
        risk_level,
        risk_factors:    triggered.iter().map(|f| f.description().to_string()).collect(),
        requires_review: risk_level == RiskLevel::High,
    })
}
