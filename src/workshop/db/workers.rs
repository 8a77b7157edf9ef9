use rusqlite::{OptionalExtension, Row, Transaction, params};

use super::{WorkshopDb, parse_column};
use crate::errors::{DbContext, Result, WorkshopError, is_unique_violation};
use crate::workshop::models::{Worker, WorkerRequest, WorkerRole};

const WORKER_COLUMNS: &str =
    "worker_id, name, notes, role, is_active, worker_group, password_hash";

fn row_to_worker(row: &Row) -> rusqlite::Result<Worker> {
    Ok(Worker {
        worker_id: row.get(0)?,
        name: row.get(1)?,
        notes: row.get(2)?,
        role: parse_column(3, row.get(3)?)?,
        is_active: row.get(4)?,
        worker_group: row.get(5)?,
        password_hash: row.get(6)?,
    })
}

fn find_worker(conn: &rusqlite::Connection, worker_id: i64) -> Result<Option<Worker>> {
    conn.query_row(
        &format!("SELECT {WORKER_COLUMNS} FROM workers WHERE worker_id = ?1"),
        params![worker_id],
        row_to_worker,
    )
    .optional()
    .db_context("Failed to load worker")
}

/// Reject a name or singleton role already held by another worker.
fn check_unique_fields(tx: &Transaction, req: &WorkerRequest, exclude_id: i64) -> Result<()> {
    let name_taken: bool = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM workers WHERE name = ?1 AND worker_id != ?2)",
            params![req.name.trim(), exclude_id],
            |row| row.get(0),
        )
        .db_context("Failed to check worker name")?;
    if name_taken {
        return Err(WorkshopError::validation(format!(
            "worker name '{}' is already in use",
            req.name.trim()
        )));
    }

    if req.role.is_singleton() {
        let role_taken: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM workers WHERE role = ?1 AND worker_id != ?2)",
                params![req.role.as_str(), exclude_id],
                |row| row.get(0),
            )
            .db_context("Failed to check worker role")?;
        if role_taken {
            return Err(singleton_taken(req.role));
        }
    }
    Ok(())
}

fn singleton_taken(role: WorkerRole) -> WorkshopError {
    WorkshopError::validation(format!(
        "a worker with role {} already exists; only one is allowed",
        role
    ))
}

/// Map a constraint failure that slipped past the in-transaction checks.
fn write_error(err: rusqlite::Error, req: &WorkerRequest, context: &str) -> WorkshopError {
    if is_unique_violation(&err) {
        if req.role.is_singleton() && err.to_string().contains("workers.role") {
            return singleton_taken(req.role);
        }
        return WorkshopError::validation(format!(
            "worker name '{}' is already in use",
            req.name.trim()
        ));
    }
    WorkshopError::Persistence {
        context: context.to_string(),
        source: err,
    }
}

impl WorkshopDb {
    // ── Workers ──────────────────────────────────────────────────────

    pub fn create_worker(
        &self,
        req: &WorkerRequest,
        password_hash: Option<String>,
    ) -> Result<Worker> {
        req.validate()?;
        let tx = self.write_tx()?;
        check_unique_fields(&tx, req, 0)?;
        tx.execute(
            "INSERT INTO workers (name, notes, role, is_active, worker_group, password_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                req.name.trim(),
                req.notes,
                req.role.as_str(),
                req.is_active,
                req.worker_group,
                password_hash,
            ],
        )
        .map_err(|e| write_error(e, req, "Failed to insert worker"))?;
        let worker_id = tx.last_insert_rowid();
        tx.commit().db_context("Failed to commit worker")?;

        tracing::info!(worker_id, role = %req.role, "created worker");
        self.get_worker(worker_id)
    }

    /// Update profile fields. The stored password hash is left untouched.
    pub fn update_worker(&self, worker_id: i64, req: &WorkerRequest) -> Result<Worker> {
        req.validate()?;
        let tx = self.write_tx()?;
        let current = find_worker(&tx, worker_id)?
            .ok_or_else(|| WorkshopError::not_found("worker", worker_id))?;
        if current.role == WorkerRole::Admin && req.role != WorkerRole::Admin {
            return Err(WorkshopError::validation(
                "the admin account cannot change role",
            ));
        }
        check_unique_fields(&tx, req, worker_id)?;
        tx.execute(
            "UPDATE workers SET name = ?1, notes = ?2, role = ?3, is_active = ?4, worker_group = ?5
             WHERE worker_id = ?6",
            params![
                req.name.trim(),
                req.notes,
                req.role.as_str(),
                req.is_active,
                req.worker_group,
                worker_id,
            ],
        )
        .map_err(|e| write_error(e, req, "Failed to update worker"))?;
        tx.commit().db_context("Failed to commit worker update")?;

        tracing::info!(worker_id, "updated worker");
        self.get_worker(worker_id)
    }

    pub fn delete_worker(&self, worker_id: i64) -> Result<()> {
        let tx = self.write_tx()?;
        let worker = find_worker(&tx, worker_id)?
            .ok_or_else(|| WorkshopError::not_found("worker", worker_id))?;
        if worker.role == WorkerRole::Admin {
            return Err(WorkshopError::validation(
                "the admin account cannot be deleted",
            ));
        }
        let log_count: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM production_logs WHERE worker_id = ?1",
                params![worker_id],
                |row| row.get(0),
            )
            .db_context("Failed to count worker logs")?;
        if log_count > 0 {
            return Err(WorkshopError::conflict(format!(
                "worker {} has {} production log entries and cannot be deleted",
                worker_id, log_count
            )));
        }
        tx.execute("DELETE FROM workers WHERE worker_id = ?1", params![worker_id])
            .db_context("Failed to delete worker")?;
        tx.commit().db_context("Failed to commit worker delete")?;

        tracing::info!(worker_id, "deleted worker");
        Ok(())
    }

    pub fn set_worker_password(&self, worker_id: i64, password_hash: &str) -> Result<()> {
        let affected = self
            .conn
            .execute(
                "UPDATE workers SET password_hash = ?1 WHERE worker_id = ?2",
                params![password_hash, worker_id],
            )
            .db_context("Failed to update worker password")?;
        if affected == 0 {
            return Err(WorkshopError::not_found("worker", worker_id));
        }
        tracing::info!(worker_id, "worker password changed");
        Ok(())
    }

    pub fn get_worker(&self, worker_id: i64) -> Result<Worker> {
        find_worker(&self.conn, worker_id)?
            .ok_or_else(|| WorkshopError::not_found("worker", worker_id))
    }

    #[cfg(test)]
    pub(crate) fn get_worker_by_name(&self, name: &str) -> Result<Option<Worker>> {
        self.conn
            .query_row(
                &format!("SELECT {WORKER_COLUMNS} FROM workers WHERE name = ?1"),
                params![name],
                row_to_worker,
            )
            .optional()
            .db_context("Failed to load worker by name")
    }

    pub fn get_workers(&self) -> Result<Vec<Worker>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {WORKER_COLUMNS} FROM workers ORDER BY worker_id"))
            .db_context("Failed to prepare worker query")?;
        let rows = stmt
            .query_map([], row_to_worker)
            .db_context("Failed to query workers")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read worker rows")
    }

    pub fn has_worker_with_role(&self, role: WorkerRole) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM workers WHERE role = ?1)",
                params![role.as_str()],
                |row| row.get(0),
            )
            .db_context("Failed to check worker role")
    }
}
