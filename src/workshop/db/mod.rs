mod fabric;
mod logs;
mod orders;
mod plans;
mod styles;
mod tasks;
mod workers;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::errors::{DbContext, Result, WorkshopError};

/// Storage format for every timestamp column. Lexical order is chronological.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// `LIKE` pattern matching `needle` anywhere; pair with `ESCAPE '\'`.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Parse a text column into one of the workshop enums.
pub(crate) fn parse_column<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

/// Async-safe handle to the workshop database.
///
/// Wraps `WorkshopDb` behind `Arc<Mutex>` and runs every access on tokio's
/// blocking pool, so synchronous SQLite I/O never stalls the async workers.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<WorkshopDb>>,
}

impl DbHandle {
    pub fn new(db: WorkshopDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure against the database on a blocking thread.
    /// All data moved into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&WorkshopDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| WorkshopError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| WorkshopError::Other(anyhow::Error::new(e).context("Database task panicked")))?
    }

    /// Acquire the database mutex synchronously. For start-up work and
    /// tests only; never call this from a request handler.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, WorkshopDb>> {
        self.inner.lock().map_err(|_| WorkshopError::LockPoisoned)
    }
}

pub struct WorkshopDb {
    conn: Connection,
}

impl WorkshopDb {
    /// Open (or create) a database file and bring its schema up to date.
    pub fn new(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)
            .db_context(format!("Failed to open database {}", path.display()))?;
        conn.busy_timeout(busy_timeout)
            .db_context("Failed to set busy timeout")?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .db_context("Failed to enable WAL journal")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory database (for tests).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().db_context("Failed to open in-memory database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .db_context("Failed to enable foreign keys")?;
        self.run_migrations()
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS styles (
                    style_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    style_number TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS workers (
                    worker_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    notes TEXT NOT NULL DEFAULT '',
                    role TEXT NOT NULL
                        CHECK (role IN ('admin', 'manager', 'worker', 'pattern_maker')),
                    is_active INTEGER NOT NULL DEFAULT 1,
                    password_hash TEXT,
                    worker_group TEXT
                );

                CREATE TABLE IF NOT EXISTS fabric_rolls (
                    roll_id TEXT PRIMARY KEY,
                    style_id INTEGER NOT NULL REFERENCES styles(style_id),
                    color TEXT NOT NULL,
                    registration_time TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'available'
                        CHECK (status IN ('available', 'in-use', 'exhausted'))
                );

                CREATE TABLE IF NOT EXISTS production_orders (
                    order_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    order_number TEXT NOT NULL UNIQUE,
                    style_id INTEGER NOT NULL REFERENCES styles(style_id),
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS order_items (
                    item_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    order_id INTEGER NOT NULL
                        REFERENCES production_orders(order_id) ON DELETE CASCADE,
                    color TEXT NOT NULL,
                    size TEXT NOT NULL,
                    quantity INTEGER NOT NULL CHECK (quantity > 0)
                );

                CREATE TABLE IF NOT EXISTS production_plans (
                    plan_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    plan_name TEXT NOT NULL,
                    style_id INTEGER NOT NULL REFERENCES styles(style_id),
                    linked_order_id INTEGER REFERENCES production_orders(order_id),
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS cutting_layouts (
                    layout_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    plan_id INTEGER NOT NULL REFERENCES production_plans(plan_id),
                    layout_name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT ''
                );

                CREATE TABLE IF NOT EXISTS layout_size_ratios (
                    ratio_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    layout_id INTEGER NOT NULL
                        REFERENCES cutting_layouts(layout_id) ON DELETE CASCADE,
                    size TEXT NOT NULL,
                    ratio INTEGER NOT NULL CHECK (ratio > 0)
                );

                CREATE TABLE IF NOT EXISTS production_tasks (
                    task_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    style_id INTEGER NOT NULL REFERENCES styles(style_id),
                    layout_id INTEGER REFERENCES cutting_layouts(layout_id),
                    layout_name TEXT NOT NULL,
                    color TEXT NOT NULL,
                    planned_layers INTEGER NOT NULL CHECK (planned_layers > 0),
                    completed_layers INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS production_logs (
                    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    task_id INTEGER,
                    roll_id TEXT REFERENCES fabric_rolls(roll_id),
                    parent_log_id INTEGER REFERENCES production_logs(log_id),
                    worker_id INTEGER NOT NULL REFERENCES workers(worker_id),
                    process_name TEXT NOT NULL
                        CHECK (process_name IN ('issue', 'spread', 'cut', 'pack')),
                    layers_completed INTEGER,
                    log_time TEXT NOT NULL
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_workers_singleton_role
                    ON workers(role) WHERE role IN ('admin', 'manager');
                CREATE INDEX IF NOT EXISTS idx_fabric_rolls_style ON fabric_rolls(style_id, color);
                CREATE INDEX IF NOT EXISTS idx_orders_style_day ON production_orders(style_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id);
                CREATE INDEX IF NOT EXISTS idx_plans_order ON production_plans(linked_order_id);
                CREATE INDEX IF NOT EXISTS idx_layouts_plan ON cutting_layouts(plan_id);
                CREATE INDEX IF NOT EXISTS idx_ratios_layout ON layout_size_ratios(layout_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_layout ON production_tasks(layout_id);
                CREATE INDEX IF NOT EXISTS idx_logs_task ON production_logs(task_id);
                CREATE INDEX IF NOT EXISTS idx_logs_worker ON production_logs(worker_id);
                CREATE INDEX IF NOT EXISTS idx_logs_parent ON production_logs(parent_log_id);
                ",
            )
            .db_context("Failed to create tables")
    }

    /// Begin a write transaction that takes SQLite's write lock up front.
    ///
    /// Concurrent writers queue on the lock instead of failing mid-way with
    /// `SQLITE_BUSY` after they already read stale state. Dropping the
    /// transaction without `commit` rolls it back.
    pub(crate) fn write_tx(&self) -> Result<Transaction<'_>> {
        // The DbHandle mutex already serializes access to the connection.
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_database_and_run_migrations() -> anyhow::Result<()> {
        let db = WorkshopDb::new_in_memory()?;

        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN (
                'styles', 'workers', 'fabric_rolls', 'production_orders', 'order_items',
                'production_plans', 'cutting_layouts', 'layout_size_ratios',
                'production_tasks', 'production_logs')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 10);

        let singleton_index: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name = 'idx_workers_singleton_role'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(singleton_index, 1);
        Ok(())
    }

    #[test]
    fn test_migrations_are_idempotent() -> anyhow::Result<()> {
        let db = WorkshopDb::new_in_memory()?;
        db.run_migrations()?;
        db.run_migrations()?;
        Ok(())
    }

    #[test]
    fn test_file_database_reopens_with_data() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("workshop.db");
        {
            let db = WorkshopDb::new(&path, Duration::from_millis(500))?;
            db.create_style("ST-1")?;
        }
        let db = WorkshopDb::new(&path, Duration::from_millis(500))?;
        assert_eq!(db.get_styles()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_dropped_write_tx_rolls_back() -> anyhow::Result<()> {
        let db = WorkshopDb::new_in_memory()?;
        {
            let tx = db.write_tx()?;
            tx.execute("INSERT INTO styles (style_number) VALUES ('GONE')", [])?;
        }
        assert!(db.get_styles()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("PO-1"), "%PO-1%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_timestamp_format_sorts_lexically() {
        let earlier = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(9, 5, 0))
            .unwrap();
        let later = chrono::NaiveDate::from_ymd_opt(2024, 3, 10)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap();
        assert_eq!(format_timestamp(earlier), "2024-03-09 09:05:00");
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }
}
