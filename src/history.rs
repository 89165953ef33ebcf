//! Append-only page history
//!
//! The engine emits one `HistoryEvent` per mutation through a `HistorySink`.
//! The SQLite sink writes into the same transaction as the mutation, so an
//! aborted operation leaves no audit entry behind and a committed one always
//! has its entry. History is never read back for ordering decisions.

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Page id used for events that concern the whole document.
pub const BULK_REORDER_ID: &str = "bulk_reorder";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEvent {
    pub page_id: String,
    pub page_number: i64,
    pub old_data: Value,
    pub new_data: Value,
    pub changed_by: String,
    pub description: String,
}

/// A stored history row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    pub id: i64,
    pub page_id: String,
    pub page_number: i64,
    pub old_data: Value,
    pub new_data: Value,
    pub changed_by: String,
    pub change_description: String,
    pub changed_at: String,
}

/// Receiver of mutation events. `conn` is the mutation's open transaction.
pub trait HistorySink: Send + Sync {
    fn record(&self, conn: &Connection, event: &HistoryEvent) -> Result<()>;
}

/// Discards every event.
pub struct NullHistory;

impl HistorySink for NullHistory {
    fn record(&self, _conn: &Connection, _event: &HistoryEvent) -> Result<()> {
        Ok(())
    }
}

/// Writes events into the `page_history` table.
pub struct SqliteHistory;

impl SqliteHistory {
    pub fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS page_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                old_data TEXT NOT NULL,
                new_data TEXT NOT NULL,
                changed_by TEXT NOT NULL,
                change_description TEXT NOT NULL,
                changed_at TEXT NOT NULL
            );
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_page ON page_history(page_id)",
            [],
        )?;
        Ok(())
    }
}

impl HistorySink for SqliteHistory {
    fn record(&self, conn: &Connection, event: &HistoryEvent) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO page_history (page_id, page_number, old_data, new_data, changed_by, change_description, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &event.page_id,
                event.page_number,
                serde_json::to_string(&event.old_data)?,
                serde_json::to_string(&event.new_data)?,
                &event.changed_by,
                &event.description,
                now
            ],
        )?;
        Ok(())
    }
}

/// Newest-first history, optionally for a single page.
pub fn recent(conn: &Connection, page_id: Option<&str>, limit: usize) -> Result<Vec<HistoryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, page_id, page_number, old_data, new_data, changed_by, change_description, changed_at
         FROM page_history
         WHERE ?1 IS NULL OR page_id = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![page_id, limit as i64], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, page_id, page_number, old_data, new_data, changed_by, change_description, changed_at) = row?;
        records.push(HistoryRecord {
            id,
            page_id,
            page_number,
            old_data: serde_json::from_str(&old_data)?,
            new_data: serde_json::from_str(&new_data)?,
            changed_by,
            change_description,
            changed_at,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(page_id: &str, description: &str) -> HistoryEvent {
        HistoryEvent {
            page_id: page_id.to_string(),
            page_number: 1,
            old_data: json!({}),
            new_data: json!({ "title": description }),
            changed_by: "system".to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_recent_is_newest_first_and_filtered() {
        let conn = Connection::open_in_memory().unwrap();
        SqliteHistory::init_schema(&conn).unwrap();
        let sink = SqliteHistory;
        sink.record(&conn, &event("a", "Page created")).unwrap();
        sink.record(&conn, &event("b", "Page created")).unwrap();
        sink.record(&conn, &event("a", "Page updated")).unwrap();

        let all = recent(&conn, None, 100).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].change_description, "Page updated");

        let only_a = recent(&conn, Some("a"), 50).unwrap();
        assert_eq!(only_a.len(), 2);
        assert!(only_a.iter().all(|r| r.page_id == "a"));
        assert_eq!(only_a[1].new_data, json!({ "title": "Page created" }));

        assert_eq!(recent(&conn, None, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_rolled_back_events_disappear() {
        let mut conn = Connection::open_in_memory().unwrap();
        SqliteHistory::init_schema(&conn).unwrap();
        {
            let tx = conn.transaction().unwrap();
            SqliteHistory.record(&tx, &event("a", "Page created")).unwrap();
        }
        assert!(recent(&conn, None, 10).unwrap().is_empty());
    }
}
