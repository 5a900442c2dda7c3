//! Order checkout and lifecycle.
//!
//! Checkout turns the active cart into a persisted order: totals are
//! computed from a snapshot of the cart, the payment plan is reconciled,
//! and the order row, its payment history rows, and any treatment
//! packages are written in a single transaction. The cart is cleared
//! only after the transaction commits; any failure leaves both the cart
//! and the store untouched.
//!
//! Orders are deep snapshots. Later price or catalog changes never
//! affect a stored order. The only mutations after creation are
//! settlement payments on a pending order and note edits.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{error, info};
use uuid::Uuid;

use crate::cart::CartState;
use crate::db::DbState;
use crate::error::PosError;
use crate::models::{
    now_rfc3339, Order, OrderStatus, PaymentEntry, PaymentMethod, WALK_IN_CUSTOMER,
};
use crate::payments::{self, PaymentPlan};
use crate::{pricing, treatments};

/// Checkout parameters beyond the cart contents themselves.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub manual_discount: f64,
    pub tip: f64,
    pub plan: PaymentPlan,
    pub note: Option<String>,
    pub paid_by: Option<String>,
}

/// Finalize the active cart into an order.
///
/// Fails without side effects when the cart is empty, the payment plan
/// does not reconcile, or any write fails. On success the cart is reset
/// to an empty session.
pub fn checkout(db: &DbState, cart: &CartState, req: &CheckoutRequest) -> Result<Order, PosError> {
    let session = cart.snapshot();
    if session.lines.is_empty() {
        return Err(PosError::EmptyCartOperation {
            action: "checkout".into(),
        });
    }

    let totals = pricing::compute_totals(
        &session.lines,
        req.manual_discount,
        session.voucher.as_ref(),
        req.tip,
    );
    let recon = payments::reconcile(totals.total, &req.plan)?;

    let now = now_rfc3339();
    let (customer_id, customer_name) = match &session.customer {
        Some(c) if !c.is_walk_in() => (Some(c.id.clone()), c.name.clone()),
        _ => (None, WALK_IN_CUSTOMER.to_string()),
    };

    let conn = db.conn()?;
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| PosError::Db(format!("begin checkout tx: {e}")))?;

    let result = (|| -> Result<Order, PosError> {
        let order = Order {
            id: Uuid::new_v4().to_string(),
            order_number: next_order_number(&conn)?,
            customer_id,
            customer_name,
            items: session.lines.clone(),
            subtotal: totals.subtotal,
            discount: totals.manual_discount,
            voucher_code: session.voucher.as_ref().map(|v| v.code.clone()),
            voucher_discount: totals.voucher_discount,
            tip: totals.tip,
            total: totals.total,
            payment_method: req.plan.method_label(),
            received_amount: recon.received,
            change_amount: recon.change,
            status: recon.status,
            note: req.note.clone(),
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        conn.execute(
            "INSERT INTO orders (
                id, order_number, customer_id, customer_name, items,
                subtotal, discount, voucher_code, voucher_discount, tip, total,
                payment_method, received_amount, change_amount, status, note,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                order.id,
                order.order_number,
                order.customer_id,
                order.customer_name,
                serde_json::to_string(&order.items)?,
                order.subtotal,
                order.discount,
                order.voucher_code,
                order.voucher_discount,
                order.tip,
                order.total,
                order.payment_method,
                order.received_amount,
                order.change_amount,
                order.status.as_str(),
                order.note,
                order.created_at,
                order.updated_at,
            ],
        )
        .map_err(|e| PosError::Db(format!("insert order: {e}")))?;

        for entry in &recon.entries {
            insert_payment_row(
                &conn,
                &PaymentEntry {
                    id: Uuid::new_v4().to_string(),
                    order_id: order.id.clone(),
                    method: entry.method,
                    amount: entry.amount,
                    change_amount: entry.change_amount,
                    paid_at: now.clone(),
                    paid_by: req.paid_by.clone(),
                    note: None,
                },
            )?;
        }

        treatments::create_packages_in_tx(
            &conn,
            &order.id,
            session.customer.as_ref(),
            &session.lines,
            &now,
        )?;

        Ok(order)
    })();

    match result {
        Ok(order) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| PosError::Db(format!("commit checkout tx: {e}")))?;
            drop(conn);
            cart.clear();
            info!(
                order_id = %order.id,
                order_number = %order.order_number,
                total = order.total,
                status = order.status.as_str(),
                "Order created"
            );
            Ok(order)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            error!("Checkout failed: {e}");
            Err(e)
        }
    }
}

/// Next sequential receipt number for today: `HD-YYYYMMDD-NNNN`.
/// The sequence resets daily and is derived from the highest suffix
/// issued so far, so deleting an order never reissues its number.
fn next_order_number(conn: &Connection) -> Result<String, PosError> {
    let prefix = format!("HD-{}-", chrono::Local::now().format("%Y%m%d"));
    let max_suffix: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(CAST(SUBSTR(order_number, ?1) AS INTEGER)), 0)
             FROM orders WHERE order_number LIKE ?2",
            params![prefix.len() as i64 + 1, format!("{prefix}%")],
            |row| row.get(0),
        )
        .map_err(|e| PosError::Db(format!("order number sequence: {e}")))?;
    Ok(format!("{prefix}{:04}", max_suffix + 1))
}

fn insert_payment_row(conn: &Connection, entry: &PaymentEntry) -> Result<(), PosError> {
    conn.execute(
        "INSERT INTO order_payments (id, order_id, method, amount, change_amount, paid_at, paid_by, note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.id,
            entry.order_id,
            entry.method.as_str(),
            entry.amount,
            entry.change_amount,
            entry.paid_at,
            entry.paid_by,
            entry.note,
        ],
    )
    .map_err(|e| PosError::Db(format!("insert payment: {e}")))?;
    Ok(())
}

/// Record an additional payment against a pending order.
///
/// The order completes when cumulative payments reach the total; the
/// history rows are append-only, so earlier entries are never revised.
/// A surplus on the final payment is returned as change.
pub fn settle_order(
    db: &DbState,
    order_id: &str,
    method: PaymentMethod,
    amount: f64,
    paid_by: Option<String>,
    note: Option<String>,
) -> Result<Order, PosError> {
    payments::ensure_positive(amount)?;

    let conn = db.conn()?;
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| PosError::Db(format!("begin settle tx: {e}")))?;

    let result = (|| -> Result<Order, PosError> {
        let mut order = fetch_order(&conn, order_id)?.ok_or_else(|| PosError::OrderNotFound {
            id: order_id.to_string(),
        })?;
        if order.status == OrderStatus::Completed {
            return Err(PosError::OrderAlreadySettled {
                id: order_id.to_string(),
            });
        }

        let prior: f64 = conn
            .query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM order_payments WHERE order_id = ?1",
                params![order_id],
                |row| row.get(0),
            )
            .map_err(|e| PosError::Db(format!("sum payments: {e}")))?;

        let now = now_rfc3339();
        let received = prior + amount;
        let change = received - order.total;
        let status = if received >= order.total {
            OrderStatus::Completed
        } else {
            OrderStatus::Pending
        };

        insert_payment_row(
            &conn,
            &PaymentEntry {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.to_string(),
                method,
                amount,
                change_amount: change,
                paid_at: now.clone(),
                paid_by,
                note,
            },
        )?;

        conn.execute(
            "UPDATE orders
             SET received_amount = ?1, change_amount = ?2, status = ?3, updated_at = ?4
             WHERE id = ?5",
            params![received, change, status.as_str(), now, order_id],
        )
        .map_err(|e| PosError::Db(format!("update order after settle: {e}")))?;

        order.received_amount = received;
        order.change_amount = change;
        order.status = status;
        order.updated_at = now;
        Ok(order)
    })();

    match result {
        Ok(order) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| PosError::Db(format!("commit settle tx: {e}")))?;
            info!(
                order_id = %order_id,
                amount,
                status = order.status.as_str(),
                outstanding = (order.total - order.received_amount).max(0.0),
                "Payment recorded"
            );
            Ok(order)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Replace the free-form note on an order.
pub fn update_order_note(
    db: &DbState,
    order_id: &str,
    note: Option<String>,
) -> Result<(), PosError> {
    let conn = db.conn()?;
    let updated = conn
        .execute(
            "UPDATE orders SET note = ?1, updated_at = ?2 WHERE id = ?3",
            params![note, now_rfc3339(), order_id],
        )
        .map_err(|e| PosError::Db(format!("update note: {e}")))?;
    if updated == 0 {
        return Err(PosError::OrderNotFound {
            id: order_id.to_string(),
        });
    }
    Ok(())
}

/// Remove an order and its payment history.
pub fn delete_order(db: &DbState, order_id: &str) -> Result<(), PosError> {
    let conn = db.conn()?;
    let deleted = conn
        .execute("DELETE FROM orders WHERE id = ?1", params![order_id])
        .map_err(|e| PosError::Db(format!("delete order: {e}")))?;
    if deleted == 0 {
        return Err(PosError::OrderNotFound {
            id: order_id.to_string(),
        });
    }
    info!(order_id = %order_id, "Order deleted");
    Ok(())
}

pub fn get_order(db: &DbState, order_id: &str) -> Result<Order, PosError> {
    let conn = db.conn()?;
    fetch_order(&conn, order_id)?.ok_or_else(|| PosError::OrderNotFound {
        id: order_id.to_string(),
    })
}

/// All orders, newest first, optionally filtered by status.
pub fn list_orders(db: &DbState, status: Option<OrderStatus>) -> Result<Vec<Order>, PosError> {
    let conn = db.conn()?;
    let sql = match status {
        Some(_) => {
            "SELECT id, order_number, customer_id, customer_name, items,
                    subtotal, discount, voucher_code, voucher_discount, tip, total,
                    payment_method, received_amount, change_amount, status, note,
                    created_at, updated_at
             FROM orders WHERE status = ?1
             ORDER BY created_at DESC, order_number DESC"
        }
        None => {
            "SELECT id, order_number, customer_id, customer_name, items,
                    subtotal, discount, voucher_code, voucher_discount, tip, total,
                    payment_method, received_amount, change_amount, status, note,
                    created_at, updated_at
             FROM orders
             ORDER BY created_at DESC, order_number DESC"
        }
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = match status {
        Some(s) => stmt.query_map(params![s.as_str()], map_order_row)?,
        None => stmt.query_map([], map_order_row)?,
    };
    let mut orders = Vec::new();
    for row in rows {
        orders.push(from_raw(row?)?);
    }
    Ok(orders)
}

/// Payment history for an order, in the order the payments were taken.
pub fn list_payments(db: &DbState, order_id: &str) -> Result<Vec<PaymentEntry>, PosError> {
    let conn = db.conn()?;
    let mut stmt = conn.prepare(
        "SELECT id, order_id, method, amount, change_amount, paid_at, paid_by, note
         FROM order_payments
         WHERE order_id = ?1
         ORDER BY paid_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![order_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, f64>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        let (id, order_id, method, amount, change_amount, paid_at, paid_by, note) = row?;
        entries.push(PaymentEntry {
            id,
            order_id,
            method: PaymentMethod::parse(&method)
                .ok_or_else(|| PosError::Db(format!("unknown payment method '{method}'")))?,
            amount,
            change_amount,
            paid_at,
            paid_by,
            note,
        });
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct RawOrder {
    id: String,
    order_number: String,
    customer_id: Option<String>,
    customer_name: String,
    items: String,
    subtotal: f64,
    discount: f64,
    voucher_code: Option<String>,
    voucher_discount: f64,
    tip: f64,
    total: f64,
    payment_method: String,
    received_amount: f64,
    change_amount: f64,
    status: String,
    note: Option<String>,
    created_at: String,
    updated_at: String,
}

fn map_order_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawOrder> {
    Ok(RawOrder {
        id: row.get(0)?,
        order_number: row.get(1)?,
        customer_id: row.get(2)?,
        customer_name: row.get(3)?,
        items: row.get(4)?,
        subtotal: row.get(5)?,
        discount: row.get(6)?,
        voucher_code: row.get(7)?,
        voucher_discount: row.get(8)?,
        tip: row.get(9)?,
        total: row.get(10)?,
        payment_method: row.get(11)?,
        received_amount: row.get(12)?,
        change_amount: row.get(13)?,
        status: row.get(14)?,
        note: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn from_raw(raw: RawOrder) -> Result<Order, PosError> {
    Ok(Order {
        id: raw.id,
        order_number: raw.order_number,
        customer_id: raw.customer_id,
        customer_name: raw.customer_name,
        items: serde_json::from_str(&raw.items)?,
        subtotal: raw.subtotal,
        discount: raw.discount,
        voucher_code: raw.voucher_code,
        voucher_discount: raw.voucher_discount,
        tip: raw.tip,
        total: raw.total,
        payment_method: raw.payment_method,
        received_amount: raw.received_amount,
        change_amount: raw.change_amount,
        status: OrderStatus::parse(&raw.status)
            .ok_or_else(|| PosError::Db(format!("unknown order status '{}'", raw.status)))?,
        note: raw.note,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    })
}

fn fetch_order(conn: &Connection, order_id: &str) -> Result<Option<Order>, PosError> {
    let raw = conn
        .query_row(
            "SELECT id, order_number, customer_id, customer_name, items,
                    subtotal, discount, voucher_code, voucher_discount, tip, total,
                    payment_method, received_amount, change_amount, status, note,
                    created_at, updated_at
             FROM orders
             WHERE id = ?1",
            params![order_id],
            map_order_row,
        )
        .optional()?;
    raw.map(from_raw).transpose()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{CustomerRef, Product, ProductType, Voucher, VoucherType};
    use crate::payments::TenderEntry;
    use rusqlite::Connection;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        db::run_migrations_for_test(&conn);
        DbState {
            conn: std::sync::Mutex::new(conn),
            db_path: std::path::PathBuf::from(":memory:"),
        }
    }

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: id.into(),
            name: format!("Product {id}"),
            category: "general".into(),
            price,
            product_type: ProductType::Product,
            stock: None,
            duration_minutes: None,
            sessions: 0,
            session_details: vec![],
            options: vec![],
        }
    }

    fn treatment(id: &str, price: f64, sessions: i64) -> Product {
        Product {
            product_type: ProductType::Treatment,
            sessions,
            ..product(id, price)
        }
    }

    fn vip10() -> Vec<Voucher> {
        vec![Voucher {
            code: "VIP10".into(),
            voucher_type: VoucherType::Percent,
            value: 10.0,
            min_order: 100_000.0,
            description: "10% off".into(),
        }]
    }

    fn single_cash(tendered: f64) -> CheckoutRequest {
        CheckoutRequest {
            manual_discount: 0.0,
            tip: 0.0,
            plan: PaymentPlan::Single {
                method: PaymentMethod::Cash,
                tendered,
            },
            note: None,
            paid_by: Some("an".into()),
        }
    }

    #[test]
    fn test_checkout_completes_and_clears_cart() {
        let state = test_db();
        let cart = CartState::new();
        cart.add_item(&product("a", 120_000.0), &[]);
        cart.add_item(&product("b", 80_000.0), &[]);
        cart.apply_voucher("VIP10", &vip10()).expect("voucher");

        let order = checkout(&state, &cart, &single_cash(200_000.0)).expect("checkout");

        assert_eq!(order.subtotal, 200_000.0);
        assert_eq!(order.voucher_discount, 20_000.0);
        assert_eq!(order.total, 180_000.0);
        assert_eq!(order.received_amount, 200_000.0);
        assert_eq!(order.change_amount, 20_000.0);
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.voucher_code.as_deref(), Some("VIP10"));
        assert_eq!(order.customer_name, WALK_IN_CUSTOMER);
        assert!(cart.is_empty(), "cart cleared after commit");

        let stored = get_order(&state, &order.id).expect("stored order");
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.total, 180_000.0);

        let history = list_payments(&state, &order.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 200_000.0);
        assert_eq!(history[0].change_amount, 20_000.0);
    }

    #[test]
    fn test_checkout_empty_cart_rejected() {
        let state = test_db();
        let cart = CartState::new();
        let err = checkout(&state, &cart, &single_cash(100_000.0)).unwrap_err();
        assert!(matches!(err, PosError::EmptyCartOperation { .. }));
    }

    #[test]
    fn test_failed_reconcile_leaves_cart_and_store_untouched() {
        let state = test_db();
        let cart = CartState::new();
        cart.add_item(&product("a", 200_000.0), &[]);

        let err = checkout(&state, &cart, &single_cash(150_000.0)).unwrap_err();
        assert!(matches!(err, PosError::InsufficientAmount { .. }));
        assert!(!cart.is_empty(), "cart survives a failed checkout");
        assert!(list_orders(&state, None).unwrap().is_empty());
    }

    #[test]
    fn test_partial_payment_then_settlement() {
        let state = test_db();
        let cart = CartState::new();
        cart.add_item(&product("a", 180_000.0), &[]);

        let req = CheckoutRequest {
            manual_discount: 0.0,
            tip: 0.0,
            plan: PaymentPlan::Partial {
                method: PaymentMethod::Cash,
                amount: 100_000.0,
            },
            note: None,
            paid_by: None,
        };
        let order = checkout(&state, &cart, &req).expect("checkout");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.change_amount, -80_000.0);

        // paying less than the balance keeps the order pending
        let order = settle_order(&state, &order.id, PaymentMethod::Card, 50_000.0, None, None)
            .expect("first settlement");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.received_amount, 150_000.0);
        assert_eq!(order.change_amount, -30_000.0);

        // overpaying the remainder completes with change
        let order = settle_order(&state, &order.id, PaymentMethod::Cash, 50_000.0, None, None)
            .expect("final settlement");
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.received_amount, 200_000.0);
        assert_eq!(order.change_amount, 20_000.0);

        let history = list_payments(&state, &order.id).unwrap();
        assert_eq!(history.len(), 3);
        let received: f64 = history.iter().map(|p| p.amount).sum();
        assert_eq!(received, order.received_amount);
    }

    #[test]
    fn test_settling_completed_order_rejected() {
        let state = test_db();
        let cart = CartState::new();
        cart.add_item(&product("a", 50_000.0), &[]);
        let order = checkout(&state, &cart, &single_cash(50_000.0)).unwrap();

        let err =
            settle_order(&state, &order.id, PaymentMethod::Cash, 10_000.0, None, None).unwrap_err();
        assert!(matches!(err, PosError::OrderAlreadySettled { .. }));
    }

    #[test]
    fn test_split_payment_history_matches_received() {
        let state = test_db();
        let cart = CartState::new();
        cart.add_item(&product("a", 300_000.0), &[]);

        let req = CheckoutRequest {
            manual_discount: 0.0,
            tip: 0.0,
            plan: PaymentPlan::Split {
                tenders: vec![
                    TenderEntry {
                        method: PaymentMethod::Card,
                        amount: 200_000.0,
                    },
                    TenderEntry {
                        method: PaymentMethod::Cash,
                        amount: 120_000.0,
                    },
                ],
            },
            note: None,
            paid_by: None,
        };
        let order = checkout(&state, &cart, &req).expect("checkout");
        assert_eq!(order.payment_method, "split");
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.received_amount, 320_000.0);
        assert_eq!(order.change_amount, 20_000.0);

        let history = list_payments(&state, &order.id).unwrap();
        assert_eq!(history.len(), 2);
        let received: f64 = history.iter().map(|p| p.amount).sum();
        assert_eq!(received, order.received_amount);
        // surplus sits on the last tender
        assert_eq!(history[1].change_amount, 20_000.0);
    }

    #[test]
    fn test_order_numbers_increment_within_day() {
        let state = test_db();
        let cart = CartState::new();

        cart.add_item(&product("a", 10_000.0), &[]);
        let first = checkout(&state, &cart, &single_cash(10_000.0)).unwrap();
        cart.add_item(&product("a", 10_000.0), &[]);
        let second = checkout(&state, &cart, &single_cash(10_000.0)).unwrap();

        let date = chrono::Local::now().format("%Y%m%d").to_string();
        assert_eq!(first.order_number, format!("HD-{date}-0001"));
        assert_eq!(second.order_number, format!("HD-{date}-0002"));
    }

    #[test]
    fn test_fully_discounted_order_checks_out() {
        let state = test_db();
        let cart = CartState::new();
        cart.add_item(&product("a", 50_000.0), &[]);

        // comped entirely by a manual discount; nothing is tendered
        let req = CheckoutRequest {
            manual_discount: 50_000.0,
            tip: 0.0,
            plan: PaymentPlan::Single {
                method: PaymentMethod::Cash,
                tendered: 0.0,
            },
            note: None,
            paid_by: None,
        };
        let order = checkout(&state, &cart, &req).expect("checkout");
        assert_eq!(order.total, 0.0);
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.received_amount, 0.0);
        assert_eq!(order.change_amount, 0.0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_order_numbers_not_reissued_after_delete() {
        let state = test_db();
        let cart = CartState::new();

        cart.add_item(&product("a", 10_000.0), &[]);
        let first = checkout(&state, &cart, &single_cash(10_000.0)).unwrap();
        cart.add_item(&product("a", 10_000.0), &[]);
        let second = checkout(&state, &cart, &single_cash(10_000.0)).unwrap();

        delete_order(&state, &first.id).expect("delete");

        cart.add_item(&product("a", 10_000.0), &[]);
        let third = checkout(&state, &cart, &single_cash(10_000.0)).unwrap();

        let date = chrono::Local::now().format("%Y%m%d").to_string();
        assert_eq!(third.order_number, format!("HD-{date}-0003"));
        assert_ne!(third.order_number, second.order_number);
    }

    #[test]
    fn test_checkout_creates_treatment_package_for_customer() {
        let state = test_db();
        let cart = CartState::new();
        cart.add_item(&treatment("t-facial", 1_500_000.0, 5), &[]);
        cart.select_customer(CustomerRef {
            id: "c-1".into(),
            name: "Chi Lan".into(),
        });

        let order = checkout(&state, &cart, &single_cash(1_500_000.0)).expect("checkout");
        assert_eq!(order.customer_id.as_deref(), Some("c-1"));

        let packages = treatments::list_for_customer(&state, "c-1").unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].order_id, order.id);
        assert_eq!(packages[0].total_sessions, 5);
        assert_eq!(treatments::list_for_order(&state, &order.id).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_order_cascades_payments() {
        let state = test_db();
        let cart = CartState::new();
        cart.add_item(&product("a", 20_000.0), &[]);
        let order = checkout(&state, &cart, &single_cash(20_000.0)).unwrap();

        delete_order(&state, &order.id).expect("delete");
        assert!(matches!(
            get_order(&state, &order.id),
            Err(PosError::OrderNotFound { .. })
        ));
        assert!(list_payments(&state, &order.id).unwrap().is_empty());

        assert!(matches!(
            delete_order(&state, &order.id),
            Err(PosError::OrderNotFound { .. })
        ));
    }

    #[test]
    fn test_update_note() {
        let state = test_db();
        let cart = CartState::new();
        cart.add_item(&product("a", 20_000.0), &[]);
        let order = checkout(&state, &cart, &single_cash(20_000.0)).unwrap();

        update_order_note(&state, &order.id, Some("gift wrap".into())).expect("note");
        let order = get_order(&state, &order.id).unwrap();
        assert_eq!(order.note.as_deref(), Some("gift wrap"));

        assert!(matches!(
            update_order_note(&state, "missing", None),
            Err(PosError::OrderNotFound { .. })
        ));
    }

    #[test]
    fn test_list_orders_filters_by_status() {
        let state = test_db();
        let cart = CartState::new();

        cart.add_item(&product("a", 100_000.0), &[]);
        checkout(&state, &cart, &single_cash(100_000.0)).unwrap();

        cart.add_item(&product("b", 100_000.0), &[]);
        let req = CheckoutRequest {
            manual_discount: 0.0,
            tip: 0.0,
            plan: PaymentPlan::Partial {
                method: PaymentMethod::Cash,
                amount: 40_000.0,
            },
            note: None,
            paid_by: None,
        };
        checkout(&state, &cart, &req).unwrap();

        assert_eq!(list_orders(&state, None).unwrap().len(), 2);
        assert_eq!(
            list_orders(&state, Some(OrderStatus::Pending)).unwrap().len(),
            1
        );
        assert_eq!(
            list_orders(&state, Some(OrderStatus::Completed))
                .unwrap()
                .len(),
            1
        );
    }
}
