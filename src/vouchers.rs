//! Voucher resolver.
//!
//! Validates a voucher code against the static catalog and the current
//! order subtotal. Only one voucher can be bound to the cart session at a
//! time; the binding itself lives in [`crate::cart::CartState`]. A failed
//! resolution never mutates the applied-voucher state.

use tracing::info;

use crate::error::PosError;
use crate::models::{AppliedVoucher, Voucher};

/// Resolve `code` against the catalog for a cart with the given subtotal.
///
/// Lookup is a case-insensitive exact match. Fails with `VoucherNotFound`
/// when no code matches and `MinimumOrderNotMet` (carrying the threshold)
/// when the subtotal is below the voucher's minimum.
pub fn resolve(code: &str, subtotal: f64, catalog: &[Voucher]) -> Result<AppliedVoucher, PosError> {
    let trimmed = code.trim();
    let voucher = catalog
        .iter()
        .find(|v| v.code.eq_ignore_ascii_case(trimmed))
        .ok_or_else(|| PosError::VoucherNotFound {
            code: trimmed.to_string(),
        })?;

    if subtotal < voucher.min_order {
        return Err(PosError::MinimumOrderNotMet {
            min_order: voucher.min_order,
            subtotal,
        });
    }

    info!(code = %voucher.code, subtotal = subtotal, "Voucher applied");

    Ok(AppliedVoucher {
        code: voucher.code.clone(),
        voucher_type: voucher.voucher_type,
        value: voucher.value,
        description: voucher.description.clone(),
    })
}

// ===========================================================================
// Tests
// ===========================================================================
