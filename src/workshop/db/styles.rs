use rusqlite::{OptionalExtension, Row, params};

use super::WorkshopDb;
use crate::errors::{DbContext, Result, WorkshopError, is_unique_violation};
use crate::workshop::models::Style;

pub(crate) fn row_to_style(row: &Row) -> rusqlite::Result<Style> {
    Ok(Style {
        style_id: row.get(0)?,
        style_number: row.get(1)?,
    })
}

impl WorkshopDb {
    // ── Styles ───────────────────────────────────────────────────────

    pub fn create_style(&self, style_number: &str) -> Result<Style> {
        let style_number = style_number.trim();
        if style_number.is_empty() {
            return Err(WorkshopError::validation("style_number is required"));
        }
        match self.conn.execute(
            "INSERT INTO styles (style_number) VALUES (?1)",
            params![style_number],
        ) {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(WorkshopError::validation(format!(
                    "style {} already exists",
                    style_number
                )));
            }
            Err(e) => return Err(e).db_context("Failed to insert style"),
        }
        let style_id = self.conn.last_insert_rowid();
        tracing::info!(style_id, style_number, "created style");
        Ok(Style {
            style_id,
            style_number: style_number.to_string(),
        })
    }

    pub fn get_style(&self, style_id: i64) -> Result<Style> {
        self.conn
            .query_row(
                "SELECT style_id, style_number FROM styles WHERE style_id = ?1",
                params![style_id],
                row_to_style,
            )
            .optional()
            .db_context("Failed to load style")?
            .ok_or_else(|| WorkshopError::not_found("style", style_id))
    }

    pub fn get_style_by_number(&self, style_number: &str) -> Result<Option<Style>> {
        self.conn
            .query_row(
                "SELECT style_id, style_number FROM styles WHERE style_number = ?1",
                params![style_number],
                row_to_style,
            )
            .optional()
            .db_context("Failed to load style by number")
    }

    pub fn get_styles(&self) -> Result<Vec<Style>> {
        let mut stmt = self
            .conn
            .prepare("SELECT style_id, style_number FROM styles ORDER BY style_number")
            .db_context("Failed to prepare style query")?;
        let rows = stmt
            .query_map([], row_to_style)
            .db_context("Failed to query styles")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read style rows")
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ErrorKind;
    use crate::workshop::db::WorkshopDb;

    #[test]
    fn test_create_and_get_style() -> anyhow::Result<()> {
        let db = WorkshopDb::new_in_memory()?;
        let style = db.create_style("  ST-100 ")?;
        assert_eq!(style.style_number, "ST-100");

        let fetched = db.get_style(style.style_id)?;
        assert_eq!(fetched, style);
        assert_eq!(db.get_style_by_number("ST-100")?, Some(style));
        assert_eq!(db.get_style_by_number("nope")?, None);
        Ok(())
    }

    #[test]
    fn test_duplicate_style_is_validation() -> anyhow::Result<()> {
        let db = WorkshopDb::new_in_memory()?;
        db.create_style("ST-1")?;
        let err = db.create_style("ST-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            db.create_style("   ").unwrap_err().kind(),
            ErrorKind::Validation
        );
        Ok(())
    }

    #[test]
    fn test_missing_style_is_not_found() -> anyhow::Result<()> {
        let db = WorkshopDb::new_in_memory()?;
        assert_eq!(db.get_style(9).unwrap_err().kind(), ErrorKind::NotFound);
        Ok(())
    }

    #[test]
    fn test_styles_listed_by_number() -> anyhow::Result<()> {
        let db = WorkshopDb::new_in_memory()?;
        db.create_style("B")?;
        db.create_style("A")?;
        let numbers: Vec<_> = db
            .get_styles()?
            .into_iter()
            .map(|s| s.style_number)
            .collect();
        assert_eq!(numbers, vec!["A", "B"]);
        Ok(())
    }
}
