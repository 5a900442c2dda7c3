//! Treatment session ledger.
//!
//! Treatments are prepaid multi-visit services: buying one creates a
//! per-customer package whose sessions are consumed visit by visit.
//! Packages are created at order completion (inside the checkout
//! transaction) and only for a bound, non-walk-in customer — sessions
//! need a customer record to redeem against, so walk-in purchases of
//! treatments never produce a package.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::db::DbState;
use crate::error::PosError;
use crate::models::{
    now_rfc3339, CartLineItem, CustomerRef, ProductType, SessionDetail, TreatmentPackage,
};

/// Explicit package issuance request (boundary operation). The checkout
/// flow does not use this; it derives packages from cart lines instead.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub customer: Option<CustomerRef>,
    pub treatment_product_id: String,
    pub treatment_name: String,
    pub total_sessions: i64,
    pub session_details: Vec<SessionDetail>,
    pub order_id: String,
}

/// Per-visit definitions for a package: the product's `session_details`
/// when present, otherwise synthesized placeholder visits.
fn build_sessions(total_sessions: i64, details: &[SessionDetail]) -> Vec<SessionDetail> {
    if !details.is_empty() {
        return details.to_vec();
    }
    (1..=total_sessions)
        .map(|n| SessionDetail {
            session_number: n,
            description: format!("Session {n}"),
            included_items: vec![],
        })
        .collect()
}

fn insert_package(conn: &Connection, pkg: &TreatmentPackage) -> Result<(), PosError> {
    conn.execute(
        "INSERT INTO treatment_packages (
            id, customer_id, customer_name, treatment_product_id, treatment_name,
            total_sessions, used_session_numbers, sessions, purchase_date,
            order_id, is_active
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            pkg.id,
            pkg.customer_id,
            pkg.customer_name,
            pkg.treatment_product_id,
            pkg.treatment_name,
            pkg.total_sessions,
            serde_json::to_string(&pkg.used_session_numbers)?,
            serde_json::to_string(&pkg.sessions)?,
            pkg.purchase_date,
            pkg.order_id,
            pkg.is_active as i64,
        ],
    )
    .map_err(|e| PosError::Db(format!("insert treatment package: {e}")))?;
    Ok(())
}

/// Create packages for every treatment line of a just-created order.
/// Runs inside the checkout transaction; walk-in or absent customers are
/// silently skipped.
pub(crate) fn create_packages_in_tx(
    conn: &Connection,
    order_id: &str,
    customer: Option<&CustomerRef>,
    lines: &[CartLineItem],
    now: &str,
) -> Result<Vec<TreatmentPackage>, PosError> {
    let customer = match customer {
        Some(c) if !c.is_walk_in() => c,
        _ => {
            if lines
                .iter()
                .any(|l| l.product_type == ProductType::Treatment && l.sessions > 0)
            {
                info!(order_id = %order_id, "Treatment sold to walk-in; no package created");
            }
            return Ok(vec![]);
        }
    };

    let mut created = Vec::new();
    for line in lines {
        if line.product_type != ProductType::Treatment || line.sessions <= 0 {
            continue;
        }
        let pkg = TreatmentPackage {
            id: Uuid::new_v4().to_string(),
            customer_id: customer.id.clone(),
            customer_name: customer.name.clone(),
            treatment_product_id: line.product_id.clone(),
            treatment_name: line.name.clone(),
            total_sessions: line.sessions,
            used_session_numbers: vec![],
            sessions: build_sessions(line.sessions, &line.session_details),
            purchase_date: now.to_string(),
            order_id: order_id.to_string(),
            is_active: true,
        };
        insert_package(conn, &pkg)?;
        info!(
            package_id = %pkg.id,
            customer = %customer.name,
            treatment = %line.name,
            sessions = line.sessions,
            "Treatment package created"
        );
        created.push(pkg);
    }
    Ok(created)
}

/// Explicitly issue a package (e.g. a manual correction from the admin
/// side). Unlike the checkout flow this fails loudly when no concrete
/// customer is bound.
pub fn create_package(db: &DbState, req: &NewPackage) -> Result<TreatmentPackage, PosError> {
    let customer = match &req.customer {
        Some(c) if !c.is_walk_in() => c.clone(),
        _ => return Err(PosError::MissingCustomerForTreatment),
    };

    let pkg = TreatmentPackage {
        id: Uuid::new_v4().to_string(),
        customer_id: customer.id,
        customer_name: customer.name,
        treatment_product_id: req.treatment_product_id.clone(),
        treatment_name: req.treatment_name.clone(),
        total_sessions: req.total_sessions,
        used_session_numbers: vec![],
        sessions: build_sessions(req.total_sessions, &req.session_details),
        purchase_date: now_rfc3339(),
        order_id: req.order_id.clone(),
        is_active: true,
    };

    let conn = db.conn()?;
    insert_package(&conn, &pkg)?;
    info!(package_id = %pkg.id, "Treatment package issued directly");
    Ok(pkg)
}

/// Mark one session of a package as used.
///
/// `remaining_sessions` can never go negative: out-of-range and
/// already-used session numbers are rejected, and an exhausted package
/// rejects any further redemption. When the last session is consumed the
/// package is deactivated.
pub fn redeem_session(
    db: &DbState,
    package_id: &str,
    session_number: i64,
) -> Result<TreatmentPackage, PosError> {
    let conn = db.conn()?;
    let mut pkg = fetch_package(&conn, package_id)?.ok_or_else(|| PosError::PackageNotFound {
        id: package_id.to_string(),
    })?;

    if pkg.remaining_sessions() == 0 {
        return Err(PosError::NoSessionsRemaining);
    }
    if session_number < 1 || session_number > pkg.total_sessions {
        return Err(PosError::SessionOutOfRange {
            session: session_number,
            total: pkg.total_sessions,
        });
    }
    if pkg.used_session_numbers.contains(&session_number) {
        return Err(PosError::SessionAlreadyUsed {
            session: session_number,
        });
    }

    pkg.used_session_numbers.push(session_number);
    pkg.used_session_numbers.sort_unstable();
    if pkg.remaining_sessions() == 0 {
        pkg.is_active = false;
    }

    conn.execute(
        "UPDATE treatment_packages
         SET used_session_numbers = ?1, is_active = ?2
         WHERE id = ?3",
        params![
            serde_json::to_string(&pkg.used_session_numbers)?,
            pkg.is_active as i64,
            pkg.id
        ],
    )
    .map_err(|e| PosError::Db(format!("redeem session: {e}")))?;

    info!(
        package_id = %pkg.id,
        session = session_number,
        remaining = pkg.remaining_sessions(),
        "Treatment session redeemed"
    );
    Ok(pkg)
}

/// Deactivate a package without consuming sessions (refund/expiry path).
pub fn deactivate(db: &DbState, package_id: &str) -> Result<(), PosError> {
    let conn = db.conn()?;
    let updated = conn
        .execute(
            "UPDATE treatment_packages SET is_active = 0 WHERE id = ?1",
            params![package_id],
        )
        .map_err(|e| PosError::Db(format!("deactivate package: {e}")))?;
    if updated == 0 {
        return Err(PosError::PackageNotFound {
            id: package_id.to_string(),
        });
    }
    Ok(())
}

pub fn get_package(db: &DbState, package_id: &str) -> Result<TreatmentPackage, PosError> {
    let conn = db.conn()?;
    fetch_package(&conn, package_id)?.ok_or_else(|| PosError::PackageNotFound {
        id: package_id.to_string(),
    })
}

pub fn list_for_customer(
    db: &DbState,
    customer_id: &str,
) -> Result<Vec<TreatmentPackage>, PosError> {
    let conn = db.conn()?;
    let mut stmt = conn.prepare(
        "SELECT id, customer_id, customer_name, treatment_product_id, treatment_name,
                total_sessions, used_session_numbers, sessions, purchase_date,
                order_id, is_active
         FROM treatment_packages
         WHERE customer_id = ?1
         ORDER BY purchase_date DESC",
    )?;
    let rows = stmt.query_map(params![customer_id], map_package_row)?;
    let mut packages = Vec::new();
    for row in rows {
        packages.push(from_raw(row?)?);
    }
    Ok(packages)
}

/// Packages issued by a specific order, for audit lookups.
pub fn list_for_order(db: &DbState, order_id: &str) -> Result<Vec<TreatmentPackage>, PosError> {
    let conn = db.conn()?;
    let mut stmt = conn.prepare(
        "SELECT id, customer_id, customer_name, treatment_product_id, treatment_name,
                total_sessions, used_session_numbers, sessions, purchase_date,
                order_id, is_active
         FROM treatment_packages
         WHERE order_id = ?1",
    )?;
    let rows = stmt.query_map(params![order_id], map_package_row)?;
    let mut packages = Vec::new();
    for row in rows {
        packages.push(from_raw(row?)?);
    }
    Ok(packages)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

type RawPackage = (
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    String,
    String,
    String,
    i64,
);

fn map_package_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPackage> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn from_raw(raw: RawPackage) -> Result<TreatmentPackage, PosError> {
    Ok(TreatmentPackage {
        id: raw.0,
        customer_id: raw.1,
        customer_name: raw.2,
        treatment_product_id: raw.3,
        treatment_name: raw.4,
        total_sessions: raw.5,
        used_session_numbers: serde_json::from_str(&raw.6)?,
        sessions: serde_json::from_str(&raw.7)?,
        purchase_date: raw.8,
        order_id: raw.9,
        is_active: raw.10 != 0,
    })
}

fn fetch_package(
    conn: &Connection,
    package_id: &str,
) -> Result<Option<TreatmentPackage>, PosError> {
    let raw = conn
        .query_row(
            "SELECT id, customer_id, customer_name, treatment_product_id, treatment_name,
                    total_sessions, used_session_numbers, sessions, purchase_date,
                    order_id, is_active
             FROM treatment_packages
             WHERE id = ?1",
            params![package_id],
            map_package_row,
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
    use crate::models::WALK_IN_CUSTOMER;
    use rusqlite::Connection;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        db::run_migrations_for_test(&conn);
        DbState {
            conn: std::sync::Mutex::new(conn),
            db_path: std::path::PathBuf::from(":memory:"),
        }
    }

    fn customer() -> CustomerRef {
        CustomerRef {
            id: "c-1".into(),
            name: "Chi Lan".into(),
        }
    }

    fn treatment_line(sessions: i64, details: Vec<SessionDetail>) -> CartLineItem {
        CartLineItem {
            line_id: Uuid::new_v4().to_string(),
            product_id: "t-facial".into(),
            name: "Facial course".into(),
            product_type: ProductType::Treatment,
            unit_price: 1_500_000.0,
            quantity: 1,
            selected_options: vec![],
            note: None,
            sessions,
            session_details: details,
        }
    }

    #[test]
    fn test_checkout_package_for_bound_customer() {
        let state = test_db();
        let conn = state.conn().unwrap();
        let created = create_packages_in_tx(
            &conn,
            "o-1",
            Some(&customer()),
            &[treatment_line(3, vec![])],
            &now_rfc3339(),
        )
        .expect("create packages");
        assert_eq!(created.len(), 1);
        let pkg = &created[0];
        assert_eq!(pkg.total_sessions, 3);
        assert_eq!(pkg.remaining_sessions(), 3);
        assert!(pkg.used_session_numbers.is_empty());
        assert_eq!(pkg.sessions.len(), 3, "placeholder visits synthesized");
        assert_eq!(pkg.order_id, "o-1");
    }

    #[test]
    fn test_walk_in_purchase_creates_no_package() {
        let state = test_db();
        let conn = state.conn().unwrap();
        let walk_in = CustomerRef {
            id: "walk-in".into(),
            name: WALK_IN_CUSTOMER.into(),
        };
        let created = create_packages_in_tx(
            &conn,
            "o-1",
            Some(&walk_in),
            &[treatment_line(3, vec![])],
            &now_rfc3339(),
        )
        .expect("create packages");
        assert!(created.is_empty());

        let created =
            create_packages_in_tx(&conn, "o-2", None, &[treatment_line(3, vec![])], &now_rfc3339())
                .expect("create packages");
        assert!(created.is_empty());
    }

    #[test]
    fn test_session_details_carried_from_product() {
        let state = test_db();
        let conn = state.conn().unwrap();
        let details = vec![
            SessionDetail {
                session_number: 1,
                description: "Deep cleanse".into(),
                included_items: vec!["Cleanser".into(), "Steam".into()],
            },
            SessionDetail {
                session_number: 2,
                description: "Mask + massage".into(),
                included_items: vec!["Collagen mask".into()],
            },
        ];
        let created = create_packages_in_tx(
            &conn,
            "o-1",
            Some(&customer()),
            &[treatment_line(2, details.clone())],
            &now_rfc3339(),
        )
        .unwrap();
        assert_eq!(created[0].sessions, details);
    }

    #[test]
    fn test_non_treatment_lines_are_ignored() {
        let state = test_db();
        let conn = state.conn().unwrap();
        let mut line = treatment_line(3, vec![]);
        line.product_type = ProductType::Service;
        let created =
            create_packages_in_tx(&conn, "o-1", Some(&customer()), &[line], &now_rfc3339())
                .unwrap();
        assert!(created.is_empty());
    }

    #[test]
    fn test_direct_issue_requires_customer() {
        let state = test_db();
        let req = NewPackage {
            customer: None,
            treatment_product_id: "t-1".into(),
            treatment_name: "Facial course".into(),
            total_sessions: 5,
            session_details: vec![],
            order_id: "o-1".into(),
        };
        let err = create_package(&state, &req).unwrap_err();
        assert!(matches!(err, PosError::MissingCustomerForTreatment));
    }

    #[test]
    fn test_redeem_decrements_and_enforces_bounds() {
        let state = test_db();
        let req = NewPackage {
            customer: Some(customer()),
            treatment_product_id: "t-1".into(),
            treatment_name: "Facial course".into(),
            total_sessions: 3,
            session_details: vec![],
            order_id: "o-1".into(),
        };
        let pkg = create_package(&state, &req).expect("issue");

        let pkg = redeem_session(&state, &pkg.id, 1).expect("redeem 1");
        assert_eq!(pkg.remaining_sessions(), 2);

        // double-redeem of the same visit
        let err = redeem_session(&state, &pkg.id, 1).unwrap_err();
        assert!(matches!(err, PosError::SessionAlreadyUsed { session: 1 }));

        // out of range
        let err = redeem_session(&state, &pkg.id, 4).unwrap_err();
        assert!(matches!(err, PosError::SessionOutOfRange { session: 4, total: 3 }));

        redeem_session(&state, &pkg.id, 2).expect("redeem 2");
        let pkg = redeem_session(&state, &pkg.id, 3).expect("redeem 3");
        assert_eq!(pkg.remaining_sessions(), 0);
        assert!(!pkg.is_active, "exhausted package is deactivated");

        // nothing left to redeem; remaining never goes negative
        let err = redeem_session(&state, &pkg.id, 3).unwrap_err();
        assert!(matches!(err, PosError::NoSessionsRemaining));
        let pkg = get_package(&state, &pkg.id).unwrap();
        assert_eq!(pkg.remaining_sessions(), 0);
    }

    #[test]
    fn test_list_for_customer() {
        let state = test_db();
        for order in ["o-1", "o-2"] {
            create_package(
                &state,
                &NewPackage {
                    customer: Some(customer()),
                    treatment_product_id: "t-1".into(),
                    treatment_name: "Facial course".into(),
                    total_sessions: 3,
                    session_details: vec![],
                    order_id: order.into(),
                },
            )
            .unwrap();
        }
        let packages = list_for_customer(&state, "c-1").unwrap();
        assert_eq!(packages.len(), 2);
        assert!(list_for_customer(&state, "c-other").unwrap().is_empty());
    }

    #[test]
    fn test_deactivate_missing_package_fails() {
        let state = test_db();
        let err = deactivate(&state, "missing").unwrap_err();
        assert!(matches!(err, PosError::PackageNotFound { .. }));
    }
}
