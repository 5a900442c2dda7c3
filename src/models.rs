//! Domain types for the transaction engine.
//!
//! Shared by the cart, pricing, payment, and persistence layers. Monetary
//! amounts are `f64` in the store currency; wire names are camelCase to
//! match the frontend payload shapes. Snapshot types (`CartLineItem`,
//! order item lists) freeze catalog data at the moment of the operation
//! so later catalog edits never change historical records.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Default anonymous customer used when no customer record is selected.
pub const WALK_IN_CUSTOMER: &str = "Khách lẻ";

// ---------------------------------------------------------------------------
// Catalog reference data (owned externally, passed in by the caller)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Product,
    Service,
    Treatment,
}

/// One per-visit bundle inside a treatment package definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session_number: i64,
    #[serde(default)]
    pub description: String,
    /// Names of the services/products bundled into this visit.
    #[serde(default)]
    pub included_items: Vec<String>,
}

/// A selectable choice inside a product option group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionChoice {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price_modifier: f64,
}

/// A named option group on a product (e.g. "Size", "Add-ons").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOption {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub choices: Vec<OptionChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub price: f64,
    pub product_type: ProductType,
    /// Stock level; products only.
    #[serde(default)]
    pub stock: Option<i64>,
    /// Duration in minutes; services only.
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    /// Number of prepaid visits; treatments only.
    #[serde(default)]
    pub sessions: i64,
    /// Ordered per-visit bundles; treatments only.
    #[serde(default)]
    pub session_details: Vec<SessionDetail>,
    #[serde(default)]
    pub options: Vec<ProductOption>,
}

// ---------------------------------------------------------------------------
// Vouchers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    Fixed,
    Percent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub code: String,
    pub voucher_type: VoucherType,
    pub value: f64,
    #[serde(default)]
    pub min_order: f64,
    #[serde(default)]
    pub description: String,
}

/// A voucher bound to the current cart session. Exists from successful
/// validation until removal or checkout completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedVoucher {
    pub code: String,
    pub voucher_type: VoucherType,
    pub value: f64,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedOption {
    pub option_id: String,
    pub choice_id: String,
    #[serde(default)]
    pub price_modifier: f64,
}

/// A line in the active cart. `unit_price` is resolved once at add time
/// (product price + option modifiers); later catalog price changes do not
/// retroactively affect lines already in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub line_id: String,
    pub product_id: String,
    pub name: String,
    pub product_type: ProductType,
    pub unit_price: f64,
    pub quantity: i64,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
    #[serde(default)]
    pub note: Option<String>,
    /// Treatment metadata snapshotted for package creation at checkout.
    #[serde(default)]
    pub sessions: i64,
    #[serde(default)]
    pub session_details: Vec<SessionDetail>,
}

impl CartLineItem {
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// A customer bound to the cart session (as opposed to the walk-in default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    pub id: String,
    pub name: String,
}

impl CustomerRef {
    /// Walk-in entries carry the sentinel name and never get packages.
    pub fn is_walk_in(&self) -> bool {
        self.name == WALK_IN_CUSTOMER
    }
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "transfer" => Some(PaymentMethod::Transfer),
            "other" => Some(PaymentMethod::Other),
            _ => None,
        }
    }
}

/// One immutable payment history entry. `change_amount` is negative when
/// the order still carries an outstanding balance after this payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEntry {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub amount: f64,
    pub change_amount: f64,
    pub paid_at: String,
    #[serde(default)]
    pub paid_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// POS orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "completed" => Some(OrderStatus::Completed),
            _ => None,
        }
    }
}

/// A finalized POS order. Immutable after creation except for appended
/// payment history and the pending -> completed status flip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub customer_id: Option<String>,
    pub customer_name: String,
    /// Deep snapshot of the cart at checkout, not references.
    pub items: Vec<CartLineItem>,
    pub subtotal: f64,
    /// Manual discount — kept separate from the voucher discount.
    pub discount: f64,
    pub voucher_code: Option<String>,
    pub voucher_discount: f64,
    pub tip: f64,
    pub total: f64,
    /// Primary method label; "split" for split-tender orders.
    pub payment_method: String,
    pub received_amount: f64,
    pub change_amount: f64,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// Self-service orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelfServiceOrderType {
    #[serde(rename = "dine-in")]
    DineIn,
    #[serde(rename = "takeaway")]
    Takeaway,
}

impl SelfServiceOrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelfServiceOrderType::DineIn => "dine-in",
            SelfServiceOrderType::Takeaway => "takeaway",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dine-in" => Some(SelfServiceOrderType::DineIn),
            "takeaway" => Some(SelfServiceOrderType::Takeaway),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfServiceStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl SelfServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelfServiceStatus::Pending => "pending",
            SelfServiceStatus::Confirmed => "confirmed",
            SelfServiceStatus::Preparing => "preparing",
            SelfServiceStatus::Ready => "ready",
            SelfServiceStatus::Served => "served",
            SelfServiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SelfServiceStatus::Pending),
            "confirmed" => Some(SelfServiceStatus::Confirmed),
            "preparing" => Some(SelfServiceStatus::Preparing),
            "ready" => Some(SelfServiceStatus::Ready),
            "served" => Some(SelfServiceStatus::Served),
            "cancelled" => Some(SelfServiceStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SelfServiceStatus::Served | SelfServiceStatus::Cancelled)
    }

    /// Staff-driven transitions are one-way: the linear happy path
    /// pending -> confirmed -> preparing -> ready -> served, with
    /// cancellation reachable from any non-terminal state.
    pub fn can_transition_to(&self, next: SelfServiceStatus) -> bool {
        use SelfServiceStatus::*;
        if self.is_terminal() {
            return false;
        }
        if next == Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Preparing) | (Preparing, Ready) | (Ready, Served)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    Customer,
    Staff,
}

/// One entry in the customer <-> staff chat log of a self-service order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMessage {
    pub sender: MessageSender,
    pub text: String,
    pub sent_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfServiceOrder {
    pub id: String,
    pub table_id: Option<String>,
    pub table_name: Option<String>,
    pub order_type: SelfServiceOrderType,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Vec<CartLineItem>,
    pub total: f64,
    pub status: SelfServiceStatus,
    pub cancellation_reason: Option<String>,
    /// Append-only; does not affect status.
    pub messages: Vec<OrderMessage>,
    pub created_at: String,
    pub updated_at: String,
}

impl SelfServiceOrder {
    /// Unread signal: the thread is unread for `viewer` when the last
    /// message came from the other party.
    pub fn unread_for(&self, viewer: MessageSender) -> bool {
        self.messages
            .last()
            .map(|m| m.sender != viewer)
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Held bills
// ---------------------------------------------------------------------------

/// A suspended cart session. Exists only while held; never visible in
/// order history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldBill {
    pub id: String,
    pub held_at: String,
    pub customer_name: Option<String>,
    pub items: Vec<CartLineItem>,
    pub applied_voucher: Option<AppliedVoucher>,
    pub customer: Option<CustomerRef>,
}

// ---------------------------------------------------------------------------
// Treatment packages
// ---------------------------------------------------------------------------

/// A prepaid multi-visit package created at order completion for a
/// treatment line. `used_session_numbers` only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPackage {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub treatment_product_id: String,
    pub treatment_name: String,
    pub total_sessions: i64,
    pub used_session_numbers: Vec<i64>,
    pub sessions: Vec<SessionDetail>,
    pub purchase_date: String,
    /// Originating order, for audit traceability.
    pub order_id: String,
    pub is_active: bool,
}

impl TreatmentPackage {
    /// Derived invariant: total − used, never negative.
    pub fn remaining_sessions(&self) -> i64 {
        (self.total_sessions - self.used_session_numbers.len() as i64).max(0)
    }
}

/// RFC-3339 timestamp for "now"; the single time formatting used across
/// all persisted rows.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

// ===========================================================================
// Tests
// ===========================================================================
