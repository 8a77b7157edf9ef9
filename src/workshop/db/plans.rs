use chrono::NaiveDateTime;
use rusqlite::{OptionalExtension, Row, Transaction, params};

use super::tasks::row_to_task;
use super::{WorkshopDb, contains_pattern, format_timestamp, now_local};
use crate::errors::{DbContext, Result, WorkshopError};
use crate::workshop::models::{CuttingLayout, LayoutSizeRatio, PlanDefinition, ProductionPlan};

const PLAN_SELECT: &str = "SELECT pp.plan_id, pp.plan_name, pp.style_id, pp.linked_order_id,
        po.order_number, pp.created_at
     FROM production_plans pp
     LEFT JOIN production_orders po ON po.order_id = pp.linked_order_id";

fn row_to_plan(row: &Row) -> rusqlite::Result<ProductionPlan> {
    Ok(ProductionPlan {
        plan_id: row.get(0)?,
        plan_name: row.get(1)?,
        style_id: row.get(2)?,
        linked_order_id: row.get(3)?,
        linked_order_number: row.get(4)?,
        created_at: row.get(5)?,
        layouts: Vec::new(),
    })
}

fn row_to_layout(row: &Row) -> rusqlite::Result<CuttingLayout> {
    Ok(CuttingLayout {
        layout_id: row.get(0)?,
        plan_id: row.get(1)?,
        layout_name: row.get(2)?,
        description: row.get(3)?,
        ratios: Vec::new(),
        tasks: Vec::new(),
    })
}

fn row_to_ratio(row: &Row) -> rusqlite::Result<LayoutSizeRatio> {
    Ok(LayoutSizeRatio {
        ratio_id: row.get(0)?,
        layout_id: row.get(1)?,
        size: row.get(2)?,
        ratio: row.get(3)?,
    })
}

/// The plan's style and linked order must exist when the tree is written.
fn check_references(tx: &Transaction, def: &PlanDefinition) -> Result<()> {
    let style_exists: bool = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM styles WHERE style_id = ?1)",
            params![def.style_id],
            |row| row.get(0),
        )
        .db_context("Failed to check plan style")?;
    if !style_exists {
        return Err(WorkshopError::validation(format!(
            "style {} does not exist",
            def.style_id
        )));
    }

    if let Some(order_id) = def.linked_order_id {
        let order_exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM production_orders WHERE order_id = ?1)",
                params![order_id],
                |row| row.get(0),
            )
            .db_context("Failed to check linked order")?;
        if !order_exists {
            return Err(WorkshopError::validation(format!(
                "production order {} does not exist",
                order_id
            )));
        }
    }
    Ok(())
}

/// Write every layout with its ratios and tasks. Tasks copy the plan's style
/// and their layout's name.
fn insert_layouts(tx: &Transaction, plan_id: i64, def: &PlanDefinition) -> Result<()> {
    let mut layout_stmt = tx
        .prepare(
            "INSERT INTO cutting_layouts (plan_id, layout_name, description) VALUES (?1, ?2, ?3)",
        )
        .db_context("Failed to prepare layout insert")?;
    let mut ratio_stmt = tx
        .prepare("INSERT INTO layout_size_ratios (layout_id, size, ratio) VALUES (?1, ?2, ?3)")
        .db_context("Failed to prepare ratio insert")?;
    let mut task_stmt = tx
        .prepare(
            "INSERT INTO production_tasks (style_id, layout_id, layout_name, color, planned_layers)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .db_context("Failed to prepare task insert")?;

    for layout in &def.layouts {
        let layout_name = layout.layout_name.trim();
        let layout_id = layout_stmt
            .insert(params![plan_id, layout_name, layout.description.trim()])
            .db_context("Failed to insert layout")?;
        for ratio in &layout.ratios {
            ratio_stmt
                .execute(params![layout_id, ratio.size.trim(), ratio.ratio])
                .db_context("Failed to insert size ratio")?;
        }
        for task in &layout.tasks {
            task_stmt
                .execute(params![
                    def.style_id,
                    layout_id,
                    layout_name,
                    task.color.trim(),
                    task.planned_layers
                ])
                .db_context("Failed to insert task")?;
        }
    }
    Ok(())
}

/// Remove a plan's layouts and their tasks. Ratios go with the layouts.
fn delete_layouts(tx: &Transaction, plan_id: i64) -> Result<()> {
    tx.execute(
        "DELETE FROM production_tasks
         WHERE layout_id IN (SELECT layout_id FROM cutting_layouts WHERE plan_id = ?1)",
        params![plan_id],
    )
    .db_context("Failed to delete plan tasks")?;
    tx.execute(
        "DELETE FROM cutting_layouts WHERE plan_id = ?1",
        params![plan_id],
    )
    .db_context("Failed to delete plan layouts")?;
    Ok(())
}

impl WorkshopDb {
    // ── Production plans ─────────────────────────────────────────────

    pub fn create_plan(&self, def: &PlanDefinition) -> Result<ProductionPlan> {
        self.create_plan_at(now_local(), def)
    }

    /// Create a plan with its whole layout tree, or nothing at all.
    pub fn create_plan_at(&self, at: NaiveDateTime, def: &PlanDefinition) -> Result<ProductionPlan> {
        def.validate()?;
        let tx = self.write_tx()?;
        check_references(&tx, def)?;
        tx.execute(
            "INSERT INTO production_plans (plan_name, style_id, linked_order_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                def.plan_name.trim(),
                def.style_id,
                def.linked_order_id,
                format_timestamp(at)
            ],
        )
        .db_context("Failed to insert production plan")?;
        let plan_id = tx.last_insert_rowid();
        insert_layouts(&tx, plan_id, def)?;
        tx.commit().db_context("Failed to commit production plan")?;

        tracing::info!(plan_id, layouts = def.layouts.len(), "created production plan");
        self.get_plan(plan_id)
    }

    /// Replace a plan's header and entire layout tree.
    ///
    /// Replaced tasks are deleted along with their `completed_layers`; the new
    /// tasks start from zero.
    pub fn update_plan(&self, plan_id: i64, def: &PlanDefinition) -> Result<ProductionPlan> {
        def.validate()?;
        let tx = self.write_tx()?;
        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM production_plans WHERE plan_id = ?1)",
                params![plan_id],
                |row| row.get(0),
            )
            .db_context("Failed to check production plan")?;
        if !exists {
            return Err(WorkshopError::not_found("production plan", plan_id));
        }
        check_references(&tx, def)?;

        tx.execute(
            "UPDATE production_plans SET plan_name = ?1, style_id = ?2, linked_order_id = ?3
             WHERE plan_id = ?4",
            params![
                def.plan_name.trim(),
                def.style_id,
                def.linked_order_id,
                plan_id
            ],
        )
        .db_context("Failed to update production plan")?;
        delete_layouts(&tx, plan_id)?;
        insert_layouts(&tx, plan_id, def)?;
        tx.commit().db_context("Failed to commit plan update")?;

        tracing::info!(plan_id, layouts = def.layouts.len(), "replaced production plan tree");
        self.get_plan(plan_id)
    }

    /// Plan with layouts in id order, each carrying its ratios and tasks.
    pub fn get_plan(&self, plan_id: i64) -> Result<ProductionPlan> {
        let mut plan = self
            .conn
            .query_row(
                &format!("{PLAN_SELECT} WHERE pp.plan_id = ?1"),
                params![plan_id],
                row_to_plan,
            )
            .optional()
            .db_context("Failed to load production plan")?
            .ok_or_else(|| WorkshopError::not_found("production plan", plan_id))?;

        let mut layout_stmt = self
            .conn
            .prepare(
                "SELECT layout_id, plan_id, layout_name, description
                 FROM cutting_layouts WHERE plan_id = ?1 ORDER BY layout_id",
            )
            .db_context("Failed to prepare layout query")?;
        let mut ratio_stmt = self
            .conn
            .prepare(
                "SELECT ratio_id, layout_id, size, ratio
                 FROM layout_size_ratios WHERE layout_id = ?1 ORDER BY ratio_id",
            )
            .db_context("Failed to prepare ratio query")?;
        let mut task_stmt = self
            .conn
            .prepare(
                "SELECT task_id, style_id, layout_id, layout_name, color, planned_layers, completed_layers
                 FROM production_tasks WHERE layout_id = ?1 ORDER BY task_id",
            )
            .db_context("Failed to prepare task query")?;

        let mut layouts = layout_stmt
            .query_map(params![plan_id], row_to_layout)
            .db_context("Failed to query layouts")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read layout rows")?;
        for layout in &mut layouts {
            layout.ratios = ratio_stmt
                .query_map(params![layout.layout_id], row_to_ratio)
                .db_context("Failed to query size ratios")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .db_context("Failed to read size ratio rows")?;
            layout.tasks = task_stmt
                .query_map(params![layout.layout_id], row_to_task)
                .db_context("Failed to query layout tasks")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .db_context("Failed to read layout task rows")?;
        }
        plan.layouts = layouts;
        Ok(plan)
    }

    /// Plan headers, newest first, optionally matching the plan name or the
    /// linked order number.
    pub fn get_plans(&self, search: Option<&str>) -> Result<Vec<ProductionPlan>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(contains_pattern);
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{PLAN_SELECT}
                 WHERE ?1 IS NULL
                    OR pp.plan_name LIKE ?1 ESCAPE '\\'
                    OR po.order_number LIKE ?1 ESCAPE '\\'
                 ORDER BY pp.created_at DESC, pp.plan_id DESC"
            ))
            .db_context("Failed to prepare plan query")?;
        let rows = stmt
            .query_map(params![pattern], row_to_plan)
            .db_context("Failed to query production plans")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read production plan rows")
    }

    /// The first plan linked to an order, with its full tree.
    pub fn get_plan_by_order(&self, order_id: i64) -> Result<ProductionPlan> {
        let plan_id: i64 = self
            .conn
            .query_row(
                "SELECT plan_id FROM production_plans WHERE linked_order_id = ?1
                 ORDER BY plan_id LIMIT 1",
                params![order_id],
                |row| row.get(0),
            )
            .optional()
            .db_context("Failed to find plan for order")?
            .ok_or_else(|| WorkshopError::not_found("production plan for order", order_id))?;
        self.get_plan(plan_id)
    }

    pub fn delete_plan(&self, plan_id: i64) -> Result<()> {
        let tx = self.write_tx()?;
        delete_layouts(&tx, plan_id)?;
        let affected = tx
            .execute(
                "DELETE FROM production_plans WHERE plan_id = ?1",
                params![plan_id],
            )
            .db_context("Failed to delete production plan")?;
        if affected == 0 {
            return Err(WorkshopError::not_found("production plan", plan_id));
        }
        tx.commit().db_context("Failed to commit plan delete")?;

        tracing::info!(plan_id, "deleted production plan");
        Ok(())
    }
}
