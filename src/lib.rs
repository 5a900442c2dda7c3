//! Order and cart transaction engine for a retail / spa point of sale.
//!
//! Covers the full sale lifecycle: cart editing with option pricing,
//! voucher resolution, payment reconciliation (single, split, partial),
//! checkout into persisted orders with append-only payment history,
//! customer-facing self-service orders with a staff-driven status flow,
//! held bills, and prepaid treatment session packages.
//!
//! All state lives in a local SQLite database (`db::init`) plus one
//! in-memory `cart::CartState` per register. Every boundary operation
//! returns `Result<_, PosError>`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub mod cart;
pub mod db;
pub mod error;
pub mod held_bills;
pub mod models;
pub mod orders;
pub mod payments;
pub mod pricing;
pub mod receipts;
pub mod self_service;
pub mod treatments;
pub mod vouchers;

pub use cart::{CartSession, CartState};
pub use db::DbState;
pub use error::PosError;
pub use models::{
    AppliedVoucher, CartLineItem, CustomerRef, HeldBill, MessageSender, Order, OrderMessage,
    OrderStatus, PaymentEntry, PaymentMethod, Product, ProductType, SelfServiceOrder,
    SelfServiceOrderType, SelfServiceStatus, SessionDetail, TreatmentPackage, Voucher,
    VoucherType, WALK_IN_CUSTOMER,
};
pub use orders::CheckoutRequest;
pub use payments::{PaymentPlan, Reconciliation, TenderEntry, TenderRecord};
pub use self_service::NewSelfServiceOrder;
pub use treatments::NewPackage;

/// Initialize tracing: console output filtered by `RUST_LOG` (default
/// `info`, `debug` for this crate), plus a daily-rolling file log when
/// `log_dir` is given.
///
/// Call once at startup. Safe to skip in tests.
pub fn init_logging(log_dir: Option<&std::path::Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lotus_pos=debug"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true);

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "pos.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            registry.with(file_layer).init();
            // Keep the appender guard alive for the process lifetime.
            std::mem::forget(guard);
        }
        None => registry.init(),
    }
}
