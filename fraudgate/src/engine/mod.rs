pub mod dispatcher;
pub mod fusion;

pub use fusion::{assess_order_risk, classify, CHECKOUT_ACTION};
