//! Page repository: every SQL statement touching the `pages` table.
//!
//! `PageRepo` borrows a connection, which in practice is always the open
//! transaction of the operation in progress, so reads and writes made through
//! it share one atomic boundary.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::pages::model::{Page, PageSummary};

const PAGE_COLUMNS: &str =
    "page_id, page_number, position, page_type, page_template, title, page_data, updated_by, updated_at, is_deleted";

/// Columns added to pages tables created before ordering support existed.
const LEGACY_COLUMNS: [(&str, &str); 3] = [
    ("position", "ALTER TABLE pages ADD COLUMN position INTEGER"),
    ("page_template", "ALTER TABLE pages ADD COLUMN page_template TEXT"),
    ("is_deleted", "ALTER TABLE pages ADD COLUMN is_deleted INTEGER NOT NULL DEFAULT 0"),
];

/// Create or upgrade the schema. Returns true if a legacy table was upgraded.
pub fn init_schema(conn: &Connection) -> Result<bool> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id TEXT NOT NULL UNIQUE,
            page_number INTEGER NOT NULL,
            position INTEGER,
            page_type TEXT NOT NULL,
            page_template TEXT,
            title TEXT NOT NULL,
            page_data TEXT NOT NULL DEFAULT '{}',
            updated_by TEXT NOT NULL DEFAULT 'system',
            updated_at TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0
        );
        "#,
        [],
    )?;

    let existing: Vec<String> = {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('pages')")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        names.collect::<std::result::Result<_, _>>()?
    };

    let mut upgraded = false;
    for (column, ddl) in LEGACY_COLUMNS {
        if !existing.iter().any(|c| c == column) {
            info!("🔄 Adding {} column to legacy pages table", column);
            conn.execute(ddl, [])?;
            upgraded = true;
        }
    }

    let backfilled = conn.execute("UPDATE pages SET position = page_number WHERE position IS NULL", [])?
        + conn.execute(
            "UPDATE pages SET page_template = page_type WHERE page_template IS NULL OR page_template = ''",
            [],
        )?;
    if backfilled > 0 {
        debug!("Back-filled {} legacy page rows", backfilled);
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pages_active_position ON pages(is_deleted, position)",
        [],
    )?;

    Ok(upgraded || backfilled > 0)
}

/// Unplaced rows (NULL position) read as 0 and sort last until rebuilt.
const ACTIVE_ORDER: &str = "ORDER BY position IS NULL, position ASC, rowid ASC";

fn position_at(row: &Row, idx: usize) -> rusqlite::Result<i64> {
    Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0))
}

fn row_to_page(row: &Row) -> rusqlite::Result<Page> {
    let raw: String = row.get(6)?;
    let page_data: Value = serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Page {
        page_id: row.get(0)?,
        page_number: row.get(1)?,
        position: position_at(row, 2)?,
        page_type: row.get(3)?,
        page_template: row.get(4)?,
        title: row.get(5)?,
        page_data,
        updated_by: row.get(7)?,
        updated_at: row.get(8)?,
        is_deleted: row.get(9)?,
    })
}

fn row_to_summary(row: &Row) -> rusqlite::Result<PageSummary> {
    Ok(PageSummary {
        page_id: row.get(0)?,
        page_number: row.get(1)?,
        position: position_at(row, 2)?,
        page_type: row.get(3)?,
        page_template: row.get(4)?,
        title: row.get(5)?,
        is_deleted: row.get(6)?,
    })
}

/// Ordering slot of one surviving page.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub page_id: String,
    pub position: i64,
    pub page_number: i64,
}

/// A page about to be inserted.
#[derive(Debug, Clone)]
pub struct NewPage<'a> {
    pub page_id: &'a str,
    pub position: i64,
    pub page_type: &'a str,
    pub title: &'a str,
    pub page_data: &'a Value,
    pub updated_by: &'a str,
}

pub struct PageRepo<'a> {
    conn: &'a Connection,
}

impl<'a> PageRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Position of a non-deleted page.
    pub fn position_of(&self, page_id: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT position FROM pages WHERE page_id = ?1 AND is_deleted = 0",
                params![page_id],
                |row| position_at(row, 0),
            )
            .optional()?)
    }

    /// Highest position among non-deleted pages, 0 for an empty document.
    pub fn max_position(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(MAX(position), 0) FROM pages WHERE is_deleted = 0",
            [],
            |row| row.get(0),
        )?)
    }

    /// Surviving pages that have lost their position.
    pub fn count_unplaced(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE is_deleted = 0 AND position IS NULL",
            [],
            |row| row.get(0),
        )?)
    }

    /// Whether the id was ever used, deleted rows included.
    pub fn id_taken(&self, page_id: &str) -> Result<bool> {
        let hit: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM pages WHERE page_id = ?1", params![page_id], |row| row.get(0))
            .optional()?;
        Ok(hit.is_some())
    }

    pub fn get(&self, page_id: &str, include_deleted: bool) -> Result<Option<Page>> {
        let sql = if include_deleted {
            format!("SELECT {PAGE_COLUMNS} FROM pages WHERE page_id = ?1")
        } else {
            format!("SELECT {PAGE_COLUMNS} FROM pages WHERE page_id = ?1 AND is_deleted = 0")
        };
        Ok(self.conn.query_row(&sql, params![page_id], row_to_page).optional()?)
    }

    pub fn insert(&self, page: &NewPage<'_>) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let data = serde_json::to_string(page.page_data)?;
        self.conn.execute(
            "INSERT INTO pages (page_id, page_number, position, page_type, page_template, title, page_data, updated_by, updated_at, is_deleted)
             VALUES (?1, ?2, ?2, ?3, ?3, ?4, ?5, ?6, ?7, 0)",
            params![page.page_id, page.position, page.page_type, page.title, data, page.updated_by, now],
        )?;
        Ok(())
    }

    /// Move every surviving page at or after `position` one slot down.
    pub fn shift_down_from(&self, position: i64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE pages SET position = position + 1, page_number = page_number + 1
             WHERE position >= ?1 AND is_deleted = 0",
            params![position],
        )?)
    }

    /// Move every surviving page after `position` one slot up.
    pub fn shift_up_after(&self, position: i64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE pages SET position = position - 1 WHERE position > ?1 AND is_deleted = 0",
            params![position],
        )?)
    }

    pub fn mark_deleted(&self, page_id: &str, actor: &str) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        Ok(self.conn.execute(
            "UPDATE pages SET is_deleted = 1, updated_by = ?1, updated_at = ?2 WHERE page_id = ?3 AND is_deleted = 0",
            params![actor, now, page_id],
        )?)
    }

    /// Surviving pages in current order; ties fall back to insertion order.
    pub fn active_slots(&self) -> Result<Vec<Slot>> {
        let sql = format!("SELECT page_id, position, page_number FROM pages WHERE is_deleted = 0 {ACTIVE_ORDER}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(Slot {
                page_id: row.get(0)?,
                position: position_at(row, 1)?,
                page_number: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    /// Set both ordering fields of one page.
    pub fn set_slot(&self, page_id: &str, index: i64) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE pages SET position = ?1, page_number = ?1 WHERE page_id = ?2",
            params![index, page_id],
        )?)
    }

    pub fn touch(&self, page_id: &str, actor: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE pages SET updated_by = ?1, updated_at = ?2 WHERE page_id = ?3",
            params![actor, now, page_id],
        )?;
        Ok(())
    }

    pub fn list(&self, include_deleted: bool) -> Result<Vec<PageSummary>> {
        let filter = if include_deleted { "" } else { "WHERE is_deleted = 0" };
        let sql = format!(
            "SELECT page_id, page_number, position, page_type, page_template, title, is_deleted
             FROM pages {filter} {ACTIVE_ORDER}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_summary)?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    pub fn list_full(&self) -> Result<Vec<Page>> {
        let sql = format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE is_deleted = 0 {ACTIVE_ORDER}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_page)?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    pub fn update_content(&self, page_id: &str, title: &str, page_data: &Value, actor: &str) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let data = serde_json::to_string(page_data)?;
        Ok(self.conn.execute(
            "UPDATE pages SET page_data = ?1, title = ?2, updated_by = ?3, updated_at = ?4 WHERE page_id = ?5",
            params![data, title, actor, now, page_id],
        )?)
    }

    /// Insert a legacy record or refresh its payload if the id already exists.
    pub fn upsert_legacy(
        &self,
        page_id: &str,
        page_number: i64,
        page_type: &str,
        title: &str,
        page_data: &Value,
        actor: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let data = serde_json::to_string(page_data)?;
        self.conn.execute(
            "INSERT INTO pages (page_id, page_number, position, page_type, page_template, title, page_data, updated_by, updated_at, is_deleted)
             VALUES (?1, ?2, ?2, ?3, ?3, ?4, ?5, ?6, ?7, 0)
             ON CONFLICT(page_id) DO UPDATE SET page_data = excluded.page_data, updated_by = excluded.updated_by, updated_at = excluded.updated_at",
            params![page_id, page_number, page_type, title, data, actor, now],
        )?;
        Ok(())
    }
}
