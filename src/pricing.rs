//! Pricing calculator.
//!
//! Pure functions over cart lines and the discount/voucher context. No
//! side effects, no error conditions: totals are defined for any cart
//! (an empty cart has subtotal 0), and the grand total is floored at 0.

use serde::{Deserialize, Serialize};

use crate::models::{AppliedVoucher, CartLineItem, VoucherType};

/// Computed totals for a cart at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: f64,
    pub manual_discount: f64,
    pub voucher_discount: f64,
    pub tip: f64,
    pub total: f64,
}

/// Sum of line totals before any discount or tip.
pub fn subtotal(lines: &[CartLineItem]) -> f64 {
    lines.iter().map(CartLineItem::line_total).sum()
}

/// Discount contributed by the applied voucher, if any. Percent vouchers
/// round to the nearest currency unit.
pub fn voucher_discount(voucher: Option<&AppliedVoucher>, subtotal: f64) -> f64 {
    match voucher {
        None => 0.0,
        Some(v) => match v.voucher_type {
            VoucherType::Fixed => v.value,
            VoucherType::Percent => (subtotal * v.value / 100.0).round(),
        },
    }
}

/// `total = max(0, subtotal − manual_discount − voucher_discount + tip)`.
pub fn compute_totals(
    lines: &[CartLineItem],
    manual_discount: f64,
    voucher: Option<&AppliedVoucher>,
    tip: f64,
) -> Totals {
    let subtotal = subtotal(lines);
    let voucher_discount = voucher_discount(voucher, subtotal);
    let total = (subtotal - manual_discount - voucher_discount + tip).max(0.0);
    Totals {
        subtotal,
        manual_discount,
        voucher_discount,
        tip,
        total,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
