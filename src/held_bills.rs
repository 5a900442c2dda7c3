//! Held bills (suspended carts).
//!
//! Holding a bill snapshots the entire cart session — lines, applied
//! voucher, bound customer — into the store and clears the register for
//! the next sale. Recalling restores the snapshot verbatim and removes
//! it, so a bill can never be recalled twice. Held bills never appear in
//! order history.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::cart::{CartSession, CartState};
use crate::db::DbState;
use crate::error::PosError;
use crate::models::{now_rfc3339, HeldBill};

/// Suspend the active cart.
///
/// `customer_hint` is a free-form label shown in the held list (a name,
/// "table 3", a chair number). When absent, the bound customer's name is
/// used if there is one.
pub fn hold(
    db: &DbState,
    cart: &CartState,
    customer_hint: Option<String>,
) -> Result<HeldBill, PosError> {
    let session = cart.snapshot();
    if session.lines.is_empty() {
        return Err(PosError::EmptyCartOperation {
            action: "hold".into(),
        });
    }

    let bill = HeldBill {
        id: Uuid::new_v4().to_string(),
        held_at: now_rfc3339(),
        customer_name: customer_hint.or_else(|| session.customer.as_ref().map(|c| c.name.clone())),
        items: session.lines,
        applied_voucher: session.voucher,
        customer: session.customer,
    };

    let conn = db.conn()?;
    conn.execute(
        "INSERT INTO held_bills (id, held_at, customer_name, items, applied_voucher, customer)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            bill.id,
            bill.held_at,
            bill.customer_name,
            serde_json::to_string(&bill.items)?,
            bill.applied_voucher
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            bill.customer
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        ],
    )
    .map_err(|e| PosError::Db(format!("insert held bill: {e}")))?;
    drop(conn);

    cart.clear();
    info!(bill_id = %bill.id, lines = bill.items.len(), "Bill held");
    Ok(bill)
}

/// Restore a held bill into the cart and remove it from the store.
///
/// The current cart contents are replaced wholesale; callers wanting to
/// preserve an in-progress sale should hold it first.
pub fn recall(db: &DbState, cart: &CartState, bill_id: &str) -> Result<(), PosError> {
    let conn = db.conn()?;
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| PosError::Db(format!("begin recall tx: {e}")))?;

    let result = (|| -> Result<CartSession, PosError> {
        let bill = fetch_bill(&conn, bill_id)?.ok_or_else(|| PosError::BillNotFound {
            id: bill_id.to_string(),
        })?;
        conn.execute("DELETE FROM held_bills WHERE id = ?1", params![bill_id])
            .map_err(|e| PosError::Db(format!("delete held bill: {e}")))?;
        Ok(CartSession {
            lines: bill.items,
            voucher: bill.applied_voucher,
            customer: bill.customer,
        })
    })();

    match result {
        Ok(session) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| PosError::Db(format!("commit recall tx: {e}")))?;
            drop(conn);
            cart.restore(session);
            info!(bill_id = %bill_id, "Bill recalled");
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Discard a held bill without restoring it.
pub fn delete(db: &DbState, bill_id: &str) -> Result<(), PosError> {
    let conn = db.conn()?;
    let deleted = conn
        .execute("DELETE FROM held_bills WHERE id = ?1", params![bill_id])
        .map_err(|e| PosError::Db(format!("delete held bill: {e}")))?;
    if deleted == 0 {
        return Err(PosError::BillNotFound {
            id: bill_id.to_string(),
        });
    }
    info!(bill_id = %bill_id, "Held bill discarded");
    Ok(())
}

/// All currently held bills, oldest first.
pub fn list(db: &DbState) -> Result<Vec<HeldBill>, PosError> {
    let conn = db.conn()?;
    let mut stmt = conn.prepare(
        "SELECT id, held_at, customer_name, items, applied_voucher, customer
         FROM held_bills
         ORDER BY held_at ASC",
    )?;
    let rows = stmt.query_map([], map_bill_row)?;
    let mut bills = Vec::new();
    for row in rows {
        bills.push(from_raw(row?)?);
    }
    Ok(bills)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

type RawBill = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
);

fn map_bill_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawBill> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn from_raw(raw: RawBill) -> Result<HeldBill, PosError> {
    Ok(HeldBill {
        id: raw.0,
        held_at: raw.1,
        customer_name: raw.2,
        items: serde_json::from_str(&raw.3)?,
        applied_voucher: raw.4.as_deref().map(serde_json::from_str).transpose()?,
        customer: raw.5.as_deref().map(serde_json::from_str).transpose()?,
    })
}

fn fetch_bill(conn: &Connection, bill_id: &str) -> Result<Option<HeldBill>, PosError> {
    let raw = conn
        .query_row(
            "SELECT id, held_at, customer_name, items, applied_voucher, customer
             FROM held_bills
             WHERE id = ?1",
            params![bill_id],
            map_bill_row,
        )
        .optional()?;
    raw.map(from_raw).transpose()
}

// ===========================================================================
// Tests
// ===========================================================================
