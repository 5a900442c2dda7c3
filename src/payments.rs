//! Payment reconciler.
//!
//! Turns a payment plan (single tender, split tenders, or an explicit
//! partial payment) plus the order total into the payment history entries
//! and the resulting order status. Pure: persistence happens in the
//! checkout flow, and a rejected reconciliation changes nothing.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PosError;
use crate::models::{OrderStatus, PaymentMethod};

/// One tender inside a split payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderEntry {
    pub method: PaymentMethod,
    pub amount: f64,
}

/// How the customer settles the order at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PaymentPlan {
    /// One method; the tendered amount must cover the total.
    Single {
        method: PaymentMethod,
        tendered: f64,
    },
    /// Several tenders; their sum must cover the total.
    Split { tenders: Vec<TenderEntry> },
    /// Deliberate partial settlement. The only path that produces a
    /// `pending` order; the outstanding balance is recorded as a
    /// negative change amount.
    Partial {
        method: PaymentMethod,
        amount: f64,
    },
}

impl PaymentPlan {
    /// Label stored on the order row ("split" for split tenders).
    pub fn method_label(&self) -> String {
        match self {
            PaymentPlan::Single { method, .. } | PaymentPlan::Partial { method, .. } => {
                method.as_str().to_string()
            }
            PaymentPlan::Split { .. } => "split".to_string(),
        }
    }
}

/// A reconciled tender, ready to be appended to the payment history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderRecord {
    pub method: PaymentMethod,
    pub amount: f64,
    /// Change for this entry; negative means an outstanding balance.
    pub change_amount: f64,
}

/// Outcome of reconciling a payment plan against an order total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub status: OrderStatus,
    pub received: f64,
    /// Surplus over the total; negative when the order stays pending.
    pub change: f64,
    pub entries: Vec<TenderRecord>,
}

/// Reconcile a payment plan against `total`.
///
/// Single and split tenders fail with `InsufficientAmount` when they do
/// not cover the total; `Partial` accepts any positive amount and leaves
/// the order pending when short. A zero total reconciles against a zero
/// tender (comped order). The invariant
/// `sum(entries.amount) == received` holds on every success.
pub fn reconcile(total: f64, plan: &PaymentPlan) -> Result<Reconciliation, PosError> {
    match plan {
        PaymentPlan::Single { method, tendered } => {
            ensure_covers(*tendered, total)?;
            if *tendered < total {
                return Err(PosError::InsufficientAmount {
                    required: total,
                    received: *tendered,
                });
            }
            let change = tendered - total;
            Ok(Reconciliation {
                status: OrderStatus::Completed,
                received: *tendered,
                change,
                entries: vec![TenderRecord {
                    method: *method,
                    amount: *tendered,
                    change_amount: change,
                }],
            })
        }

        PaymentPlan::Split { tenders } => {
            let received: f64 = tenders.iter().map(|t| t.amount).sum();
            for t in tenders {
                ensure_positive(t.amount)?;
            }
            if tenders.is_empty() || received < total {
                return Err(PosError::InsufficientAmount {
                    required: total,
                    received,
                });
            }
            let change = received - total;
            // Surplus is attributed to the final tender so the amounts
            // still sum to the received total.
            let last = tenders.len() - 1;
            let entries = tenders
                .iter()
                .enumerate()
                .map(|(i, t)| TenderRecord {
                    method: t.method,
                    amount: t.amount,
                    change_amount: if i == last { change } else { 0.0 },
                })
                .collect();
            info!(tenders = tenders.len(), received = received, "Split payment reconciled");
            Ok(Reconciliation {
                status: OrderStatus::Completed,
                received,
                change,
                entries,
            })
        }

        PaymentPlan::Partial { method, amount } => {
            ensure_covers(*amount, total)?;
            let change = amount - total;
            let status = if *amount >= total {
                OrderStatus::Completed
            } else {
                OrderStatus::Pending
            };
            Ok(Reconciliation {
                status,
                received: *amount,
                change,
                entries: vec![TenderRecord {
                    method: *method,
                    amount: *amount,
                    change_amount: change,
                }],
            })
        }
    }
}

/// Parse a method string coming from the UI or a stored row. Unknown
/// labels are a validation error rather than a default.
pub fn parse_method(s: &str) -> Result<PaymentMethod, PosError> {
    PaymentMethod::parse(s).ok_or_else(|| PosError::InvalidPaymentMethod {
        method: s.to_string(),
    })
}

pub(crate) fn ensure_positive(amount: f64) -> Result<(), PosError> {
    if amount <= 0.0 {
        return Err(PosError::InsufficientAmount {
            required: 0.0,
            received: amount,
        });
    }
    Ok(())
}

/// Amount gate for single/partial tenders. A fully discounted order has
/// total 0 and settles with a zero tender, so only negative amounts are
/// rejected outright; a zero tender against a positive total is.
fn ensure_covers(amount: f64, total: f64) -> Result<(), PosError> {
    if amount < 0.0 || (total > 0.0 && amount == 0.0) {
        return Err(PosError::InsufficientAmount {
            required: total,
            received: amount,
        });
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
