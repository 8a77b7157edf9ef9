use std::collections::HashMap;

use rusqlite::{OptionalExtension, Row, params};

use super::WorkshopDb;
use crate::errors::{DbContext, Result, WorkshopError};
use crate::workshop::models::{ProductionTask, TaskProgress, WorkerTaskGroup, progress_percent};

const TASK_COLUMNS: &str =
    "task_id, style_id, layout_id, layout_name, color, planned_layers, completed_layers";

pub(crate) fn row_to_task(row: &Row) -> rusqlite::Result<ProductionTask> {
    Ok(ProductionTask {
        task_id: row.get(0)?,
        style_id: row.get(1)?,
        layout_id: row.get(2)?,
        layout_name: row.get(3)?,
        color: row.get(4)?,
        planned_layers: row.get(5)?,
        completed_layers: row.get(6)?,
    })
}

impl WorkshopDb {
    // ── Tasks & progress ─────────────────────────────────────────────

    pub fn get_task(&self, task_id: i64) -> Result<ProductionTask> {
        self.conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM production_tasks WHERE task_id = ?1"),
                params![task_id],
                row_to_task,
            )
            .optional()
            .db_context("Failed to load task")?
            .ok_or_else(|| WorkshopError::not_found("task", task_id))
    }

    pub fn get_tasks(&self, style_id: Option<i64>) -> Result<Vec<ProductionTask>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM production_tasks
                 WHERE ?1 IS NULL OR style_id = ?1 ORDER BY task_id"
            ))
            .db_context("Failed to prepare task query")?;
        let rows = stmt
            .query_map(params![style_id], row_to_task)
            .db_context("Failed to query tasks")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read task rows")
    }

    pub fn get_task_progress(&self) -> Result<Vec<TaskProgress>> {
        Ok(self
            .get_tasks(None)?
            .into_iter()
            .map(|t| TaskProgress {
                progress: progress_percent(t.completed_layers, t.planned_layers),
                task_id: t.task_id,
                style_id: t.style_id,
                layout_name: t.layout_name,
                color: t.color,
                planned_layers: t.planned_layers,
                completed_layers: t.completed_layers,
            })
            .collect())
    }

    /// Incomplete tasks grouped by their plan, for a worker's bench view.
    ///
    /// Every worker currently sees every unfinished task; the worker id only
    /// has to exist. Totals cover the same incomplete tasks that are attached.
    pub fn get_worker_task_groups(&self, worker_id: i64) -> Result<Vec<WorkerTaskGroup>> {
        self.get_worker(worker_id)?;

        let mut group_stmt = self
            .conn
            .prepare(
                "WITH open_tasks AS (
                     SELECT * FROM production_tasks WHERE completed_layers < planned_layers
                 )
                 SELECT p.plan_id, p.plan_name, s.style_number,
                        SUM(t.planned_layers), SUM(t.completed_layers)
                 FROM open_tasks t
                 JOIN cutting_layouts cl ON cl.layout_id = t.layout_id
                 JOIN production_plans p ON p.plan_id = cl.plan_id
                 JOIN styles s ON s.style_id = p.style_id
                 GROUP BY p.plan_id, p.plan_name, s.style_number
                 ORDER BY p.plan_id",
            )
            .db_context("Failed to prepare task group query")?;
        let mut groups = group_stmt
            .query_map([], |row| {
                let total_planned: i64 = row.get(3)?;
                let total_completed: i64 = row.get(4)?;
                Ok(WorkerTaskGroup {
                    plan_id: row.get(0)?,
                    plan_name: row.get(1)?,
                    style_number: row.get(2)?,
                    total_planned,
                    total_completed,
                    progress: progress_percent(total_completed, total_planned),
                    tasks: Vec::new(),
                })
            })
            .db_context("Failed to query task groups")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read task group rows")?;
        if groups.is_empty() {
            return Ok(groups);
        }

        let mut task_stmt = self
            .conn
            .prepare(
                "SELECT cl.plan_id, t.task_id, t.style_id, t.layout_id, t.layout_name, t.color,
                        t.planned_layers, t.completed_layers
                 FROM production_tasks t
                 JOIN cutting_layouts cl ON cl.layout_id = t.layout_id
                 WHERE t.completed_layers < t.planned_layers
                 ORDER BY t.task_id",
            )
            .db_context("Failed to prepare open task query")?;
        let rows = task_stmt
            .query_map([], |row| {
                let plan_id: i64 = row.get(0)?;
                Ok((
                    plan_id,
                    ProductionTask {
                        task_id: row.get(1)?,
                        style_id: row.get(2)?,
                        layout_id: row.get(3)?,
                        layout_name: row.get(4)?,
                        color: row.get(5)?,
                        planned_layers: row.get(6)?,
                        completed_layers: row.get(7)?,
                    },
                ))
            })
            .db_context("Failed to query open tasks")?;

        let mut by_plan: HashMap<i64, Vec<ProductionTask>> = HashMap::new();
        for row in rows {
            let (plan_id, task) = row.db_context("Failed to read open task row")?;
            by_plan.entry(plan_id).or_default().push(task);
        }
        for group in &mut groups {
            group.tasks = by_plan.remove(&group.plan_id).unwrap_or_default();
        }
        Ok(groups)
    }
}
