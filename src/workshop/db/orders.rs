use chrono::NaiveDateTime;
use rusqlite::{OptionalExtension, Row, Transaction, params};

use super::{WorkshopDb, contains_pattern, format_timestamp, now_local};
use crate::errors::{DbContext, Result, WorkshopError};
use crate::workshop::models::{CreateOrderRequest, OrderItem, ProductionOrder};

fn row_to_order(row: &Row) -> rusqlite::Result<ProductionOrder> {
    Ok(ProductionOrder {
        order_id: row.get(0)?,
        order_number: row.get(1)?,
        style_id: row.get(2)?,
        created_at: row.get(3)?,
        items: Vec::new(),
    })
}

fn row_to_item(row: &Row) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        item_id: row.get(0)?,
        order_id: row.get(1)?,
        color: row.get(2)?,
        size: row.get(3)?,
        quantity: row.get(4)?,
    })
}

/// Find the style by number, creating it if needed. A concurrent insert of
/// the same number is absorbed by `ON CONFLICT DO NOTHING`.
fn resolve_style(tx: &Transaction, style_number: &str) -> Result<i64> {
    tx.execute(
        "INSERT INTO styles (style_number) VALUES (?1) ON CONFLICT(style_number) DO NOTHING",
        params![style_number],
    )
    .db_context("Failed to register style for order")?;
    tx.query_row(
        "SELECT style_id FROM styles WHERE style_number = ?1",
        params![style_number],
        |row| row.get(0),
    )
    .db_context("Failed to resolve style for order")
}

/// `PO-{YYYYMMDD}-{style}-{seq:02}` where `seq` follows the highest number the
/// style holds for that day.
fn next_order_number(
    tx: &Transaction,
    style_id: i64,
    style_number: &str,
    at: NaiveDateTime,
) -> Result<String> {
    let prefix = format!("PO-{}-{}-", at.date().format("%Y%m%d"), style_number);
    let last_seq: i64 = tx
        .query_row(
            "SELECT COALESCE(MAX(CAST(substr(order_number, length(?2) + 1) AS INTEGER)), 0)
             FROM production_orders
             WHERE style_id = ?1 AND substr(order_number, 1, length(?2)) = ?2",
            params![style_id, prefix],
            |row| row.get(0),
        )
        .db_context("Failed to find last order number for the day")?;

    Ok(format!("{}{:02}", prefix, last_seq + 1))
}

impl WorkshopDb {
    // ── Production orders ────────────────────────────────────────────

    pub fn create_order(&self, req: &CreateOrderRequest) -> Result<ProductionOrder> {
        self.create_order_at(now_local(), req)
    }

    /// Create an order header and all its items in one transaction.
    pub fn create_order_at(
        &self,
        at: NaiveDateTime,
        req: &CreateOrderRequest,
    ) -> Result<ProductionOrder> {
        req.validate()?;
        let style_number = req.style_number.trim();

        let tx = self.write_tx()?;
        let style_id = resolve_style(&tx, style_number)?;
        let order_number = next_order_number(&tx, style_id, style_number, at)?;

        tx.execute(
            "INSERT INTO production_orders (order_number, style_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![order_number, style_id, format_timestamp(at)],
        )
        .db_context("Failed to insert production order")?;
        let order_id = tx.last_insert_rowid();

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO order_items (order_id, color, size, quantity)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .db_context("Failed to prepare order item insert")?;
            for item in &req.items {
                stmt.execute(params![
                    order_id,
                    item.color.trim(),
                    item.size.trim(),
                    item.quantity
                ])
                .db_context("Failed to insert order item")?;
            }
        }
        tx.commit().db_context("Failed to commit production order")?;

        tracing::info!(
            order_id,
            order_number = %order_number,
            items = req.items.len(),
            "created production order"
        );
        self.get_order(order_id)
    }

    pub fn get_order(&self, order_id: i64) -> Result<ProductionOrder> {
        let mut order = self
            .conn
            .query_row(
                "SELECT order_id, order_number, style_id, created_at
                 FROM production_orders WHERE order_id = ?1",
                params![order_id],
                row_to_order,
            )
            .optional()
            .db_context("Failed to load production order")?
            .ok_or_else(|| WorkshopError::not_found("production order", order_id))?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT item_id, order_id, color, size, quantity
                 FROM order_items WHERE order_id = ?1 ORDER BY item_id",
            )
            .db_context("Failed to prepare order item query")?;
        order.items = stmt
            .query_map(params![order_id], row_to_item)
            .db_context("Failed to query order items")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read order item rows")?;
        Ok(order)
    }

    /// Order headers, newest first, optionally narrowed by style number.
    pub fn get_orders(&self, style_number: Option<&str>) -> Result<Vec<ProductionOrder>> {
        let pattern = style_number
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(contains_pattern);

        let mut stmt = self
            .conn
            .prepare(
                "SELECT po.order_id, po.order_number, po.style_id, po.created_at
                 FROM production_orders po
                 JOIN styles s ON s.style_id = po.style_id
                 WHERE ?1 IS NULL OR s.style_number LIKE ?1 ESCAPE '\\'
                 ORDER BY po.created_at DESC, po.order_id DESC",
            )
            .db_context("Failed to prepare order query")?;
        let rows = stmt
            .query_map(params![pattern], row_to_order)
            .db_context("Failed to query production orders")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read production order rows")
    }

    /// Orders that no production plan links to yet, newest first.
    pub fn get_unplanned_orders(&self) -> Result<Vec<ProductionOrder>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT po.order_id, po.order_number, po.style_id, po.created_at
                 FROM production_orders po
                 WHERE NOT EXISTS (
                     SELECT 1 FROM production_plans p WHERE p.linked_order_id = po.order_id
                 )
                 ORDER BY po.created_at DESC, po.order_id DESC",
            )
            .db_context("Failed to prepare unplanned order query")?;
        let rows = stmt
            .query_map([], row_to_order)
            .db_context("Failed to query unplanned orders")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read unplanned order rows")
    }

    /// Delete an order and its items. Blocked while any plan links to it.
    pub fn delete_order(&self, order_id: i64) -> Result<()> {
        let tx = self.write_tx()?;
        let linked_plans: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM production_plans WHERE linked_order_id = ?1",
                params![order_id],
                |row| row.get(0),
            )
            .db_context("Failed to check plans for order")?;
        if linked_plans > 0 {
            tracing::warn!(order_id, linked_plans, "order delete blocked by linked plan");
            return Err(WorkshopError::conflict(format!(
                "production order {} is linked to {} production plan(s)",
                order_id, linked_plans
            )));
        }

        let affected = tx
            .execute(
                "DELETE FROM production_orders WHERE order_id = ?1",
                params![order_id],
            )
            .db_context("Failed to delete production order")?;
        if affected == 0 {
            return Err(WorkshopError::not_found("production order", order_id));
        }
        tx.commit().db_context("Failed to commit order delete")?;

        tracing::info!(order_id, "deleted production order");
        Ok(())
    }
}
