use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use super::{WorkshopDb, format_timestamp, now_local, parse_column};
use crate::errors::{DbContext, Result, WorkshopError, is_foreign_key_violation};
use crate::workshop::models::{
    CreateProductionLogRequest, ProcessName, ProductionLog, ProductionLogFilter,
};

const LOG_COLUMNS: &str = "log_id, task_id, roll_id, parent_log_id, worker_id, process_name, layers_completed, log_time";

fn row_to_log(row: &Row) -> rusqlite::Result<ProductionLog> {
    Ok(ProductionLog {
        log_id: row.get(0)?,
        task_id: row.get(1)?,
        roll_id: row.get(2)?,
        parent_log_id: row.get(3)?,
        worker_id: row.get(4)?,
        process_name: parse_column(5, row.get(5)?)?,
        layers_completed: row.get(6)?,
        log_time: row.get(7)?,
    })
}

impl WorkshopDb {
    // ── Production logs ──────────────────────────────────────────────

    pub fn create_production_log(&self, req: &CreateProductionLogRequest) -> Result<ProductionLog> {
        self.create_production_log_at(now_local(), req)
    }

    /// Append one event. Task ids are stored as given; worker, roll and
    /// parent references must exist.
    pub fn create_production_log_at(
        &self,
        at: NaiveDateTime,
        req: &CreateProductionLogRequest,
    ) -> Result<ProductionLog> {
        req.validate()?;
        let log_time = format_timestamp(at);
        let inserted = self.conn.execute(
            "INSERT INTO production_logs
                (task_id, roll_id, parent_log_id, worker_id, process_name, layers_completed, log_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                req.task_id,
                req.roll_id,
                req.parent_log_id,
                req.worker_id,
                req.process_name.as_str(),
                req.layers_completed,
                log_time,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_foreign_key_violation(&e) => {
                tracing::debug!(worker_id = req.worker_id, "log rejected: dangling reference");
                return Err(WorkshopError::validation(
                    "referenced worker, fabric roll or parent log does not exist",
                ));
            }
            Err(e) => return Err(e).db_context("Failed to insert production log"),
        }

        let log_id = self.conn.last_insert_rowid();
        tracing::info!(
            log_id,
            worker_id = req.worker_id,
            process = req.process_name.as_str(),
            "recorded production log"
        );
        Ok(ProductionLog {
            log_id,
            task_id: req.task_id,
            roll_id: req.roll_id.clone(),
            parent_log_id: req.parent_log_id,
            worker_id: req.worker_id,
            process_name: req.process_name,
            layers_completed: req.layers_completed,
            log_time,
        })
    }

    pub fn get_production_log(&self, log_id: i64) -> Result<ProductionLog> {
        self.conn
            .query_row(
                &format!("SELECT {LOG_COLUMNS} FROM production_logs WHERE log_id = ?1"),
                params![log_id],
                row_to_log,
            )
            .optional()
            .db_context("Failed to load production log")?
            .ok_or_else(|| WorkshopError::not_found("production log", log_id))
    }

    /// Scan logs oldest first, narrowed by any combination of filters.
    pub fn get_production_logs(&self, filter: &ProductionLogFilter) -> Result<Vec<ProductionLog>> {
        let mut sql = format!("SELECT {LOG_COLUMNS} FROM production_logs WHERE 1=1");
        let mut args: Vec<Value> = Vec::new();
        if let Some(task_id) = filter.task_id {
            args.push(Value::Integer(task_id));
            sql.push_str(&format!(" AND task_id = ?{}", args.len()));
        }
        if let Some(roll_id) = &filter.roll_id {
            args.push(Value::Text(roll_id.clone()));
            sql.push_str(&format!(" AND roll_id = ?{}", args.len()));
        }
        if let Some(worker_id) = filter.worker_id {
            args.push(Value::Integer(worker_id));
            sql.push_str(&format!(" AND worker_id = ?{}", args.len()));
        }
        if let Some(process) = filter.process_name {
            args.push(Value::Text(process.as_str().to_string()));
            sql.push_str(&format!(" AND process_name = ?{}", args.len()));
        }
        if let Some(parent_log_id) = filter.parent_log_id {
            args.push(Value::Integer(parent_log_id));
            sql.push_str(&format!(" AND parent_log_id = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY log_time, log_id");
        self.query_logs(&sql, args)
    }

    /// A worker's history, newest first. Unknown workers are NotFound.
    pub fn get_worker_logs(&self, worker_id: i64) -> Result<Vec<ProductionLog>> {
        self.get_worker(worker_id)?;
        self.query_logs(
            &format!(
                "SELECT {LOG_COLUMNS} FROM production_logs
                 WHERE worker_id = ?1 ORDER BY log_time DESC, log_id DESC"
            ),
            vec![Value::Integer(worker_id)],
        )
    }

    /// Spread events that no cut event names as its parent.
    pub fn get_unprocessed_spreading_logs(&self) -> Result<Vec<ProductionLog>> {
        self.query_logs(
            "SELECT l.log_id, l.task_id, l.roll_id, l.parent_log_id, l.worker_id,
                    l.process_name, l.layers_completed, l.log_time
             FROM production_logs l
             WHERE l.process_name = ?1
               AND NOT EXISTS (
                   SELECT 1 FROM production_logs c
                   WHERE c.parent_log_id = l.log_id AND c.process_name = ?2
               )
             ORDER BY l.log_time, l.log_id",
            vec![
                Value::Text(ProcessName::Spread.as_str().to_string()),
                Value::Text(ProcessName::Cut.as_str().to_string()),
            ],
        )
    }

    fn query_logs(&self, sql: &str, args: Vec<Value>) -> Result<Vec<ProductionLog>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .db_context("Failed to prepare production log query")?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_log)
            .db_context("Failed to query production logs")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read production log rows")
    }
}
