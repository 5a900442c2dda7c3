//! Local SQLite database layer.
//!
//! Uses rusqlite with WAL mode. Provides schema migrations and the managed
//! `DbState` handle shared by every persisted collection (orders, payment
//! history, self-service orders, held bills, treatment packages). Item
//! snapshots, message threads, and session definitions are stored as JSON
//! TEXT columns; the engine never hands out references into the store.

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::error::PosError;

/// Managed state holding the database connection. There is exactly one
/// logical writer; the mutex makes that explicit.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

impl DbState {
    /// Lock the connection. A poisoned lock is treated as a database error
    /// rather than a panic so boundary calls stay recoverable.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, PosError> {
        self.conn
            .lock()
            .map_err(|_| PosError::Db("connection lock poisoned".into()))
    }
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Initialize the database at `{data_dir}/pos.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. On corruption or open failure,
/// deletes the file and retries once.
pub fn init(data_dir: &Path) -> Result<DbState, PosError> {
    fs::create_dir_all(data_dir).map_err(|e| PosError::Db(format!("create data dir: {e}")))?;

    let db_path = data_dir.join("pos.db");
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(&db_path);
                // Also remove WAL/SHM files if present
                let _ = fs::remove_file(db_path.with_extension("db-wal"));
                let _ = fs::remove_file(db_path.with_extension("db-shm"));
            }
            open_and_configure(&db_path)
                .map_err(|e| PosError::Db(format!("open failed after retry: {e}")))?
        }
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, PosError> {
    let conn = Connection::open(path).map_err(|e| PosError::Db(format!("sqlite open: {e}")))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| PosError::Db(format!("pragma setup: {e}")))?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), PosError> {
    // Ensure schema_version table exists first
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| PosError::Db(format!("create schema_version: {e}")))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    if current < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Migration v1: POS orders, append-only payment history, held bills.
fn migrate_v1(conn: &Connection) -> Result<(), PosError> {
    conn.execute_batch(
        "
        -- finalized POS orders; items is a JSON snapshot of the cart
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            order_number TEXT NOT NULL,
            customer_id TEXT,
            customer_name TEXT NOT NULL DEFAULT 'Khách lẻ',
            items TEXT NOT NULL DEFAULT '[]',
            subtotal REAL NOT NULL DEFAULT 0,
            discount REAL NOT NULL DEFAULT 0,
            voucher_code TEXT,
            voucher_discount REAL NOT NULL DEFAULT 0,
            tip REAL NOT NULL DEFAULT 0,
            total REAL NOT NULL DEFAULT 0,
            payment_method TEXT NOT NULL DEFAULT 'cash',
            received_amount REAL NOT NULL DEFAULT 0,
            change_amount REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            note TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- append-only payment history; never updated or deleted
        CREATE TABLE IF NOT EXISTS order_payments (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            method TEXT NOT NULL,
            amount REAL NOT NULL,
            change_amount REAL NOT NULL DEFAULT 0,
            paid_at TEXT NOT NULL,
            paid_by TEXT,
            note TEXT
        );

        -- suspended carts; a full session snapshot per row
        CREATE TABLE IF NOT EXISTS held_bills (
            id TEXT PRIMARY KEY,
            held_at TEXT NOT NULL,
            customer_name TEXT,
            items TEXT NOT NULL DEFAULT '[]',
            applied_voucher TEXT,
            customer TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
        CREATE INDEX IF NOT EXISTS idx_orders_order_number ON orders(order_number);
        CREATE INDEX IF NOT EXISTS idx_order_payments_order ON order_payments(order_id);

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| PosError::Db(format!("migrate v1: {e}")))?;
    Ok(())
}

/// Migration v2: self-service orders with embedded message threads.
fn migrate_v2(conn: &Connection) -> Result<(), PosError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS self_service_orders (
            id TEXT PRIMARY KEY,
            table_id TEXT,
            table_name TEXT,
            order_type TEXT NOT NULL DEFAULT 'dine-in',
            customer_name TEXT,
            customer_phone TEXT,
            items TEXT NOT NULL DEFAULT '[]',
            total REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            cancellation_reason TEXT,
            messages TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sso_status ON self_service_orders(status);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )
    .map_err(|e| PosError::Db(format!("migrate v2: {e}")))?;
    Ok(())
}

/// Migration v3: treatment session packages.
fn migrate_v3(conn: &Connection) -> Result<(), PosError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS treatment_packages (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            customer_name TEXT NOT NULL,
            treatment_product_id TEXT NOT NULL,
            treatment_name TEXT NOT NULL,
            total_sessions INTEGER NOT NULL,
            used_session_numbers TEXT NOT NULL DEFAULT '[]',
            sessions TEXT NOT NULL DEFAULT '[]',
            purchase_date TEXT NOT NULL,
            order_id TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX IF NOT EXISTS idx_packages_customer ON treatment_packages(customer_id);
        CREATE INDEX IF NOT EXISTS idx_packages_order ON treatment_packages(order_id);

        INSERT INTO schema_version (version) VALUES (3);
        ",
    )
    .map_err(|e| PosError::Db(format!("migrate v3: {e}")))?;
    Ok(())
}

/// Run the full migration chain on an arbitrary connection. Used by tests
/// against in-memory databases.
pub fn run_migrations_for_test(conn: &Connection) {
    run_migrations(conn).expect("test migrations");
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        run_migrations(&conn).expect("first run");
        run_migrations(&conn).expect("second run");

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_all_tables_exist_after_migration() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        run_migrations(&conn).expect("migrations");

        for table in [
            "orders",
            "order_payments",
            "held_bills",
            "self_service_orders",
            "treatment_packages",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn test_init_creates_file_and_reopens() {
        let dir = std::env::temp_dir().join(format!("lotus-pos-db-{}", uuid::Uuid::new_v4()));
        let state = init(&dir).expect("first init");
        assert!(state.db_path.exists());
        drop(state);
        // Second init must reuse the existing schema without error.
        let state = init(&dir).expect("second init");
        drop(state);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
