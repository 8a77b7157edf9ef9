use chrono::NaiveDateTime;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, Transaction, params, params_from_iter};

use super::{WorkshopDb, format_timestamp, now_local, parse_column};
use crate::errors::{DbContext, Result, WorkshopError};
use crate::workshop::models::{FabricRoll, FabricRollFilter, RollStatus};

/// Attempts made when a concurrent writer claims the same roll id first.
const ROLL_ID_ATTEMPTS: usize = 3;

fn row_to_roll(row: &Row) -> rusqlite::Result<FabricRoll> {
    Ok(FabricRoll {
        roll_id: row.get(0)?,
        style_id: row.get(1)?,
        color: row.get(2)?,
        registration_time: row.get(3)?,
        status: parse_column(4, row.get(4)?)?,
    })
}

/// Compute the next `{style}-{color}-{seq:03}` id from the ids already stored.
fn next_roll_id(tx: &Transaction, style_number: &str, color: &str) -> Result<String> {
    let prefix = format!("{}-{}-", style_number, color);
    let suffix = Regex::new(&format!("^{}(\\d+)$", regex::escape(&prefix)))
        .map_err(|e| WorkshopError::Other(anyhow::Error::new(e).context("Invalid roll id pattern")))?;

    let mut stmt = tx
        .prepare("SELECT roll_id FROM fabric_rolls WHERE substr(roll_id, 1, length(?1)) = ?1")
        .db_context("Failed to prepare roll id scan")?;
    let ids = stmt
        .query_map(params![prefix], |row| row.get::<_, String>(0))
        .db_context("Failed to scan roll ids")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .db_context("Failed to read roll ids")?;

    let max_seq = ids
        .iter()
        .filter_map(|id| suffix.captures(id))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    Ok(format!("{}{:03}", prefix, max_seq + 1))
}

impl WorkshopDb {
    // ── Fabric rolls ─────────────────────────────────────────────────

    pub fn create_fabric_roll(&self, style_id: i64, color: &str) -> Result<FabricRoll> {
        self.create_fabric_roll_at(now_local(), style_id, color)
    }

    /// Register a roll with an id derived from its style and color.
    ///
    /// The read-compute-insert sequence runs under an IMMEDIATE transaction,
    /// and a primary-key clash from another process is retried.
    pub fn create_fabric_roll_at(
        &self,
        at: NaiveDateTime,
        style_id: i64,
        color: &str,
    ) -> Result<FabricRoll> {
        let color = color.trim();
        if color.is_empty() {
            return Err(WorkshopError::validation("color is required"));
        }
        let registration_time = format_timestamp(at);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let tx = self.write_tx()?;
            let style_number: String = tx
                .query_row(
                    "SELECT style_number FROM styles WHERE style_id = ?1",
                    params![style_id],
                    |row| row.get(0),
                )
                .optional()
                .db_context("Failed to load style for roll")?
                .ok_or_else(|| {
                    WorkshopError::validation(format!("style {} does not exist", style_id))
                })?;

            let roll_id = next_roll_id(&tx, &style_number, color)?;
            let inserted = tx
                .execute(
                    "INSERT INTO fabric_rolls (roll_id, style_id, color, registration_time, status)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        roll_id,
                        style_id,
                        color,
                        registration_time,
                        RollStatus::Available.as_str()
                    ],
                )
                .db_context("Failed to insert fabric roll");

            match inserted {
                Ok(_) => {
                    tx.commit().db_context("Failed to commit fabric roll")?;
                    tracing::info!(roll_id = %roll_id, style_id, "registered fabric roll");
                    return Ok(FabricRoll {
                        roll_id,
                        style_id,
                        color: color.to_string(),
                        registration_time,
                        status: RollStatus::Available,
                    });
                }
                Err(e) if e.is_unique_violation() && attempt < ROLL_ID_ATTEMPTS => {
                    tracing::warn!(roll_id = %roll_id, attempt, "roll id taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn get_fabric_roll(&self, roll_id: &str) -> Result<FabricRoll> {
        self.conn
            .query_row(
                "SELECT roll_id, style_id, color, registration_time, status
                 FROM fabric_rolls WHERE roll_id = ?1",
                params![roll_id],
                row_to_roll,
            )
            .optional()
            .db_context("Failed to load fabric roll")?
            .ok_or_else(|| WorkshopError::not_found("fabric roll", roll_id))
    }

    pub fn get_fabric_rolls(&self, filter: &FabricRollFilter) -> Result<Vec<FabricRoll>> {
        let mut sql = String::from(
            "SELECT roll_id, style_id, color, registration_time, status FROM fabric_rolls WHERE 1=1",
        );
        let mut args: Vec<Value> = Vec::new();
        if let Some(style_id) = filter.style_id {
            args.push(Value::Integer(style_id));
            sql.push_str(&format!(" AND style_id = ?{}", args.len()));
        }
        if let Some(color) = &filter.color {
            args.push(Value::Text(color.clone()));
            sql.push_str(&format!(" AND color = ?{}", args.len()));
        }
        if let Some(status) = filter.status {
            args.push(Value::Text(status.as_str().to_string()));
            sql.push_str(&format!(" AND status = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY registration_time, roll_id");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .db_context("Failed to prepare fabric roll query")?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_roll)
            .db_context("Failed to query fabric rolls")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read fabric roll rows")
    }

    pub fn update_roll_status(&self, roll_id: &str, status: RollStatus) -> Result<FabricRoll> {
        let affected = self
            .conn
            .execute(
                "UPDATE fabric_rolls SET status = ?1 WHERE roll_id = ?2",
                params![status.as_str(), roll_id],
            )
            .db_context("Failed to update fabric roll status")?;
        if affected == 0 {
            return Err(WorkshopError::not_found("fabric roll", roll_id));
        }
        tracing::info!(roll_id, status = status.as_str(), "fabric roll status changed");
        self.get_fabric_roll(roll_id)
    }
}
