//! Cart engine.
//!
//! Owns the mutable line-item list of the active checkout session plus the
//! applied voucher and the selected customer. The whole session is held
//! behind one mutex so every mutation is a complete, non-interleaved state
//! transition; UI layers treat `CartState` as an injected dependency, not
//! an ambient global.
//!
//! Two deliberate behaviors to be aware of:
//! - repeated adds of the same product+options append a new line each time
//!   (no dedup into a single line's quantity);
//! - quantity updates clamp at 1 — removal only ever happens through
//!   `remove_item`.

use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::PosError;
use crate::models::{
    AppliedVoucher, CartLineItem, CustomerRef, Product, SelectedOption, Voucher,
};
use crate::pricing::{self, Totals};
use crate::vouchers;

/// Full snapshot of the checkout session: lines, voucher binding, and the
/// selected customer. Cloneable so held bills can stash it whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartSession {
    pub lines: Vec<CartLineItem>,
    pub voucher: Option<AppliedVoucher>,
    pub customer: Option<CustomerRef>,
}

/// Managed cart state. All access goes through the methods below.
#[derive(Default)]
pub struct CartState {
    inner: Mutex<CartSession>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CartSession> {
        // A panic while holding the guard cannot leave the session in a
        // torn state (mutations are single assignments), so recover.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a product to the cart, resolving the unit price once at add
    /// time (product price + selected option modifiers). Always appends a
    /// new line, even for a product+options combination already present.
    pub fn add_item(&self, product: &Product, selected_options: &[SelectedOption]) -> CartLineItem {
        let unit_price = product.price
            + selected_options
                .iter()
                .map(|o| o.price_modifier)
                .sum::<f64>();

        let line = CartLineItem {
            line_id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            name: product.name.clone(),
            product_type: product.product_type,
            unit_price,
            quantity: 1,
            selected_options: selected_options.to_vec(),
            note: None,
            sessions: product.sessions,
            session_details: product.session_details.clone(),
        };

        let mut session = self.lock();
        session.lines.push(line.clone());
        info!(product = %product.name, unit_price = unit_price, "Item added to cart");
        line
    }

    /// Remove a line entirely.
    pub fn remove_item(&self, line_id: &str) -> Result<(), PosError> {
        let mut session = self.lock();
        let before = session.lines.len();
        session.lines.retain(|l| l.line_id != line_id);
        if session.lines.len() == before {
            return Err(PosError::LineNotFound {
                id: line_id.to_string(),
            });
        }
        Ok(())
    }

    /// Set a line's quantity, clamped at a minimum of 1. Decrementing to
    /// zero never deletes the line.
    pub fn set_quantity(&self, line_id: &str, quantity: i64) -> Result<CartLineItem, PosError> {
        let mut session = self.lock();
        let line = session
            .lines
            .iter_mut()
            .find(|l| l.line_id == line_id)
            .ok_or_else(|| PosError::LineNotFound {
                id: line_id.to_string(),
            })?;
        line.quantity = quantity.max(1);
        Ok(line.clone())
    }

    /// Set or clear a line's free-text note.
    pub fn set_note(&self, line_id: &str, note: Option<String>) -> Result<(), PosError> {
        let mut session = self.lock();
        let line = session
            .lines
            .iter_mut()
            .find(|l| l.line_id == line_id)
            .ok_or_else(|| PosError::LineNotFound {
                id: line_id.to_string(),
            })?;
        line.note = note.filter(|n| !n.trim().is_empty());
        Ok(())
    }

    /// Empty the entire session: lines, voucher, and customer. Invoked by
    /// the checkout flow after commit, or by an explicit cancel — never
    /// implicitly.
    pub fn clear(&self) {
        let mut session = self.lock();
        *session = CartSession::default();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().lines.is_empty()
    }

    pub fn lines(&self) -> Vec<CartLineItem> {
        self.lock().lines.clone()
    }

    /// Deep snapshot of the whole session (for checkout and held bills).
    pub fn snapshot(&self) -> CartSession {
        self.lock().clone()
    }

    /// Replace the session wholesale (recalling a held bill).
    pub fn restore(&self, session: CartSession) {
        *self.lock() = session;
    }

    // -- voucher binding ----------------------------------------------------

    /// Validate and bind a voucher. Replaces any prior voucher
    /// unconditionally on success; on failure the existing binding is
    /// left untouched.
    pub fn apply_voucher(
        &self,
        code: &str,
        catalog: &[Voucher],
    ) -> Result<AppliedVoucher, PosError> {
        let mut session = self.lock();
        let subtotal = pricing::subtotal(&session.lines);
        let applied = vouchers::resolve(code, subtotal, catalog)?;
        session.voucher = Some(applied.clone());
        Ok(applied)
    }

    /// Clear the voucher binding. Always succeeds.
    pub fn remove_voucher(&self) {
        self.lock().voucher = None;
    }

    pub fn applied_voucher(&self) -> Option<AppliedVoucher> {
        self.lock().voucher.clone()
    }

    // -- customer binding ---------------------------------------------------

    pub fn select_customer(&self, customer: CustomerRef) {
        self.lock().customer = Some(customer);
    }

    pub fn clear_customer(&self) {
        self.lock().customer = None;
    }

    pub fn customer(&self) -> Option<CustomerRef> {
        self.lock().customer.clone()
    }

    // -- pricing ------------------------------------------------------------

    /// Recompute totals from the current lines and voucher binding.
    pub fn totals(&self, manual_discount: f64, tip: f64) -> Totals {
        let session = self.lock();
        pricing::compute_totals(&session.lines, manual_discount, session.voucher.as_ref(), tip)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
