//! Self-service (customer-facing) orders.
//!
//! Customers submit these from a kiosk or table device; staff then walk
//! them through a one-way kitchen flow: pending -> confirmed ->
//! preparing -> ready -> served, with cancellation possible from any
//! non-terminal state. A per-order message thread lets the customer and
//! staff exchange notes without touching the status.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::DbState;
use crate::error::PosError;
use crate::models::{
    now_rfc3339, CartLineItem, MessageSender, OrderMessage, SelfServiceOrder,
    SelfServiceOrderType, SelfServiceStatus,
};
use crate::pricing;

/// Incoming order as submitted from the customer device.
#[derive(Debug, Clone)]
pub struct NewSelfServiceOrder {
    pub table_id: Option<String>,
    pub table_name: Option<String>,
    pub order_type: SelfServiceOrderType,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Vec<CartLineItem>,
}

/// Persist a newly submitted self-service order in `pending` status.
/// The total is computed here from the item snapshot, never trusted
/// from the device.
pub fn create_order(db: &DbState, req: &NewSelfServiceOrder) -> Result<SelfServiceOrder, PosError> {
    if req.items.is_empty() {
        return Err(PosError::EmptyCartOperation {
            action: "self-service checkout".into(),
        });
    }

    let now = now_rfc3339();
    let order = SelfServiceOrder {
        id: Uuid::new_v4().to_string(),
        table_id: req.table_id.clone(),
        table_name: req.table_name.clone(),
        order_type: req.order_type,
        customer_name: req.customer_name.clone(),
        customer_phone: req.customer_phone.clone(),
        items: req.items.clone(),
        total: pricing::subtotal(&req.items),
        status: SelfServiceStatus::Pending,
        cancellation_reason: None,
        messages: vec![],
        created_at: now.clone(),
        updated_at: now,
    };

    let conn = db.conn()?;
    conn.execute(
        "INSERT INTO self_service_orders (
            id, table_id, table_name, order_type, customer_name, customer_phone,
            items, total, status, cancellation_reason, messages, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            order.id,
            order.table_id,
            order.table_name,
            order.order_type.as_str(),
            order.customer_name,
            order.customer_phone,
            serde_json::to_string(&order.items)?,
            order.total,
            order.status.as_str(),
            order.cancellation_reason,
            serde_json::to_string(&order.messages)?,
            order.created_at,
            order.updated_at,
        ],
    )
    .map_err(|e| PosError::Db(format!("insert self-service order: {e}")))?;

    info!(
        order_id = %order.id,
        order_type = order.order_type.as_str(),
        total = order.total,
        "Self-service order submitted"
    );
    Ok(order)
}

/// Advance an order along the kitchen flow.
///
/// Illegal transitions are rejected without mutating the row; terminal
/// states absorb every further request. A cancellation may carry a
/// reason, which is persisted alongside the status.
pub fn update_status(
    db: &DbState,
    order_id: &str,
    next: SelfServiceStatus,
    cancellation_reason: Option<String>,
) -> Result<SelfServiceOrder, PosError> {
    let conn = db.conn()?;
    let mut order = fetch_order(&conn, order_id)?.ok_or_else(|| PosError::OrderNotFound {
        id: order_id.to_string(),
    })?;

    if !order.status.can_transition_to(next) {
        warn!(
            order_id = %order_id,
            from = order.status.as_str(),
            to = next.as_str(),
            "Rejected status transition"
        );
        return Err(PosError::InvalidStatusTransition {
            from: order.status.as_str().to_string(),
            to: next.as_str().to_string(),
        });
    }

    let reason = if next == SelfServiceStatus::Cancelled {
        cancellation_reason
    } else {
        None
    };

    let now = now_rfc3339();
    conn.execute(
        "UPDATE self_service_orders
         SET status = ?1, cancellation_reason = ?2, updated_at = ?3
         WHERE id = ?4",
        params![next.as_str(), reason, now, order_id],
    )
    .map_err(|e| PosError::Db(format!("update self-service status: {e}")))?;

    info!(
        order_id = %order_id,
        from = order.status.as_str(),
        to = next.as_str(),
        "Self-service order status changed"
    );

    order.status = next;
    order.cancellation_reason = reason;
    order.updated_at = now;
    Ok(order)
}

/// Append a message to the order's thread. Works in any status; the
/// thread is conversation history, not workflow.
pub fn add_message(
    db: &DbState,
    order_id: &str,
    sender: MessageSender,
    text: &str,
) -> Result<SelfServiceOrder, PosError> {
    let conn = db.conn()?;
    let mut order = fetch_order(&conn, order_id)?.ok_or_else(|| PosError::OrderNotFound {
        id: order_id.to_string(),
    })?;

    let now = now_rfc3339();
    order.messages.push(OrderMessage {
        sender,
        text: text.to_string(),
        sent_at: now.clone(),
    });
    order.updated_at = now.clone();

    conn.execute(
        "UPDATE self_service_orders SET messages = ?1, updated_at = ?2 WHERE id = ?3",
        params![serde_json::to_string(&order.messages)?, now, order_id],
    )
    .map_err(|e| PosError::Db(format!("append message: {e}")))?;

    Ok(order)
}

pub fn get_order(db: &DbState, order_id: &str) -> Result<SelfServiceOrder, PosError> {
    let conn = db.conn()?;
    fetch_order(&conn, order_id)?.ok_or_else(|| PosError::OrderNotFound {
        id: order_id.to_string(),
    })
}

/// All self-service orders, newest first, optionally filtered by status.
pub fn list_orders(
    db: &DbState,
    status: Option<SelfServiceStatus>,
) -> Result<Vec<SelfServiceOrder>, PosError> {
    let conn = db.conn()?;
    let sql = match status {
        Some(_) => {
            "SELECT id, table_id, table_name, order_type, customer_name, customer_phone,
                    items, total, status, cancellation_reason, messages, created_at, updated_at
             FROM self_service_orders WHERE status = ?1
             ORDER BY created_at DESC"
        }
        None => {
            "SELECT id, table_id, table_name, order_type, customer_name, customer_phone,
                    items, total, status, cancellation_reason, messages, created_at, updated_at
             FROM self_service_orders
             ORDER BY created_at DESC"
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

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct RawSelfServiceOrder {
    id: String,
    table_id: Option<String>,
    table_name: Option<String>,
    order_type: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    items: String,
    total: f64,
    status: String,
    cancellation_reason: Option<String>,
    messages: String,
    created_at: String,
    updated_at: String,
}

fn map_order_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSelfServiceOrder> {
    Ok(RawSelfServiceOrder {
        id: row.get(0)?,
        table_id: row.get(1)?,
        table_name: row.get(2)?,
        order_type: row.get(3)?,
        customer_name: row.get(4)?,
        customer_phone: row.get(5)?,
        items: row.get(6)?,
        total: row.get(7)?,
        status: row.get(8)?,
        cancellation_reason: row.get(9)?,
        messages: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn from_raw(raw: RawSelfServiceOrder) -> Result<SelfServiceOrder, PosError> {
    Ok(SelfServiceOrder {
        id: raw.id,
        table_id: raw.table_id,
        table_name: raw.table_name,
        order_type: SelfServiceOrderType::parse(&raw.order_type)
            .ok_or_else(|| PosError::Db(format!("unknown order type '{}'", raw.order_type)))?,
        customer_name: raw.customer_name,
        customer_phone: raw.customer_phone,
        items: serde_json::from_str(&raw.items)?,
        total: raw.total,
        status: SelfServiceStatus::parse(&raw.status)
            .ok_or_else(|| PosError::Db(format!("unknown status '{}'", raw.status)))?,
        cancellation_reason: raw.cancellation_reason,
        messages: serde_json::from_str(&raw.messages)?,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    })
}

fn fetch_order(conn: &Connection, order_id: &str) -> Result<Option<SelfServiceOrder>, PosError> {
    let raw = conn
        .query_row(
            "SELECT id, table_id, table_name, order_type, customer_name, customer_phone,
                    items, total, status, cancellation_reason, messages, created_at, updated_at
             FROM self_service_orders
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
