//! Error taxonomy for the transaction engine.
//!
//! Every variant is a recoverable, user-facing validation failure: the
//! Display string is the message shown to the cashier, and a rejected
//! operation never leaves partial state behind. `Db` and `Serde` wrap
//! infrastructure failures from the SQLite layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PosError {
    #[error("Voucher not found: {code}")]
    VoucherNotFound { code: String },

    /// The message must surface the threshold so the UI can show it inline.
    #[error("Order subtotal {subtotal:.0} is below the voucher minimum of {min_order:.0}")]
    MinimumOrderNotMet { min_order: f64, subtotal: f64 },

    #[error("Insufficient amount: received {received:.0}, required {required:.0}")]
    InsufficientAmount { required: f64, received: f64 },

    #[error("Cannot {action}: cart is empty")]
    EmptyCartOperation { action: String },

    #[error("A customer must be selected to issue a treatment package")]
    MissingCustomerForTreatment,

    #[error("Invalid payment method: {method}. Must be cash, card, transfer, or other")]
    InvalidPaymentMethod { method: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Order not found: {id}")]
    OrderNotFound { id: String },

    #[error("Order already settled: {id}")]
    OrderAlreadySettled { id: String },

    #[error("Held bill not found: {id}")]
    BillNotFound { id: String },

    #[error("Treatment package not found: {id}")]
    PackageNotFound { id: String },

    #[error("Cart line not found: {id}")]
    LineNotFound { id: String },

    #[error("Session {session} has already been used")]
    SessionAlreadyUsed { session: i64 },

    #[error("Session {session} is out of range (package has {total} sessions)")]
    SessionOutOfRange { session: i64, total: i64 },

    #[error("No sessions remaining on this package")]
    NoSessionsRemaining,

    #[error("database error: {0}")]
    Db(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for PosError {
    fn from(e: rusqlite::Error) -> Self {
        PosError::Db(e.to_string())
    }
}
