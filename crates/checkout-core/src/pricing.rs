//! Pricing Calculator
//!
//! Order total math over the eligible selections. All arithmetic runs on
//! `rust_decimal::Decimal`; rounding to cents happens once, when a quote
//! is assembled, never on intermediate values.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::product::SelectedProduct;

/// A coupon discount
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Discount {
    /// Percentage of the subtotal (e.g. 10 = 10%)
    Percentage(Decimal),

    /// Fixed amount, capped at the subtotal
    Flat(Decimal),
}

/// An applied coupon
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Coupon code as validated by the merchant backend
    pub code: String,

    /// The discount this coupon grants
    pub discount: Discount,

    /// When the coupon was applied to the session
    pub applied_at: DateTime<Utc>,
}

impl Coupon {
    pub fn new(code: impl Into<String>, discount: Discount) -> Self {
        Self {
            code: code.into(),
            discount,
            applied_at: Utc::now(),
        }
    }
}

/// Discount amount for a given subtotal
///
/// Never negative and never more than the subtotal, whatever the coupon
/// claims.
pub fn discount_amount(subtotal: Decimal, discount: &Discount) -> Decimal {
    let raw = match discount {
        Discount::Percentage(percent) => subtotal * *percent / Decimal::from(100),
        Discount::Flat(amount) => *amount,
    };
    raw.max(Decimal::ZERO).min(subtotal)
}

/// A priced order snapshot, every figure rounded to cents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
    /// Sum of line totals over eligible products
    pub subtotal: Decimal,

    /// Coupon discount applied to the subtotal
    pub discount: Decimal,

    /// Provider consultation fee, added after the discount
    pub consultation_fee: Decimal,

    /// subtotal - discount + consultation fee
    pub total: Decimal,
}

/// Price the eligible selections
///
/// Pure and idempotent: the same inputs always produce the same quote.
/// Callers pass the eligibility engine's eligible view; ineligible
/// selections must never reach this function.
pub fn quote(
    eligible: &[&SelectedProduct],
    consultation_fee: Decimal,
    coupon: Option<&Coupon>,
) -> OrderQuote {
    let subtotal: Decimal = eligible.iter().map(|s| s.line_total()).sum();
    let discount = coupon
        .map(|c| discount_amount(subtotal, &c.discount))
        .unwrap_or(Decimal::ZERO);
    let total = subtotal - discount + consultation_fee;

    OrderQuote {
        subtotal: round_money(subtotal),
        discount: round_money(discount),
        consultation_fee: round_money(consultation_fee),
        total: round_money(total),
    }
}

/// Round to cents, half-up
fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
