//! Page store: the operations exposed to the rest of the application.
//!
//! Every mutation is one `BEGIN IMMEDIATE` transaction on its own connection:
//! allocate, shift, insert/delete/permute, rebuild, record history, commit.
//! Concurrent writers serialise on SQLite's write lock; any error drops the
//! transaction and the prior state is untouched.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::CmsConfig;
use crate::error::{CmsError, Result};
use crate::history::{self, HistoryEvent, HistoryRecord, HistorySink, NullHistory, SqliteHistory, BULK_REORDER_ID};
use crate::pages::allocator::allocate;
use crate::pages::content::{merge_payload, title_from_patch};
use crate::pages::model::{CreatePageRequest, CreatedPage, Page, PageSummary, UpdatePageRequest};
use crate::pages::rebuild::{self, PositionAudit, RebuildReport};
use crate::pages::repo::{self, NewPage, PageRepo};
use crate::pages::reorder::apply_permutation;
use crate::pages::seed::LegacyPage;
use crate::pages::shift::{close_gap, make_room};

const DEFAULT_ACTOR: &str = "system";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeletedPage {
    pub page_id: String,
    /// Position the page held when it was deleted
    pub position: i64,
}

#[async_trait]
pub trait PageStore: Send + Sync {
    async fn create_page(&self, request: CreatePageRequest) -> Result<CreatedPage>;
    async fn delete_page(&self, page_id: &str) -> Result<DeletedPage>;
    async fn reorder_pages(&self, order: Vec<String>) -> Result<Vec<PageSummary>>;
    async fn list_pages(&self, include_deleted: bool) -> Result<Vec<PageSummary>>;
    /// Surviving pages with payloads, in position order.
    async fn list_full_pages(&self) -> Result<Vec<Page>>;
    async fn repair_positions(&self) -> Result<RebuildReport>;
    async fn audit_positions(&self) -> Result<PositionAudit>;
    async fn get_page(&self, page_id: &str) -> Result<Page>;
    async fn update_page(&self, page_id: &str, update: UpdatePageRequest) -> Result<Page>;
    async fn export_pages(&self) -> Result<Vec<Value>>;
    async fn page_history(&self, page_id: &str, limit: usize) -> Result<Vec<HistoryRecord>>;
    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>>;
    async fn seed_pages(&self, pages: Vec<LegacyPage>) -> Result<RebuildReport>;
}

/// SQLite implementation
#[derive(Clone)]
pub struct SqlitePageStore {
    db_path: PathBuf,
    busy_timeout: Duration,
    history: Arc<dyn HistorySink>,
}

impl SqlitePageStore {
    /// Open (creating or upgrading) the database with history tracking on.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::open(db_path, Arc::new(SqliteHistory), Duration::from_secs(5)).await
    }

    pub async fn from_config(config: &CmsConfig) -> Result<Self> {
        let history: Arc<dyn HistorySink> = if config.track_history {
            Arc::new(SqliteHistory)
        } else {
            Arc::new(NullHistory)
        };
        Self::open(&config.database_path, history, config.busy_timeout).await
    }

    pub async fn open(
        db_path: impl AsRef<Path>,
        history: Arc<dyn HistorySink>,
        busy_timeout: Duration,
    ) -> Result<Self> {
        let store = Self { db_path: db_path.as_ref().to_path_buf(), busy_timeout, history };

        store
            .write("bootstrap", |tx, _| {
                SqliteHistory::init_schema(tx)?;
                if repo::init_schema(tx)? {
                    rebuild::rebuild(&PageRepo::new(tx))?;
                }
                Ok(())
            })
            .await?;

        info!("📚 Page store ready at {}", store.db_path.display());
        Ok(store)
    }

    fn connect(path: &Path, busy_timeout: Duration) -> Result<Connection> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        Ok(conn)
    }

    /// Run `op` inside one immediate transaction; commit only on success.
    async fn write<T, F>(&self, label: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>, &dyn HistorySink) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        let busy_timeout = self.busy_timeout;
        let history = Arc::clone(&self.history);

        task::spawn_blocking(move || {
            let mut conn = Self::connect(&path, busy_timeout)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = op(&tx, history.as_ref())?;
            tx.commit()?;
            debug!(op = label, "Committed");
            Ok(out)
        })
        .await?
    }

    async fn read<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        let busy_timeout = self.busy_timeout;

        task::spawn_blocking(move || {
            let conn = Self::connect(&path, busy_timeout)?;
            op(&conn)
        })
        .await?
    }
}

fn generate_page_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("page_{}_{}", Utc::now().timestamp_millis(), &simple[..8])
}

#[async_trait]
impl PageStore for SqlitePageStore {
    async fn create_page(&self, request: CreatePageRequest) -> Result<CreatedPage> {
        let template = request.validate()?;

        self.write("create_page", move |tx, history| {
            let repo = PageRepo::new(tx);
            rebuild::settle_unplaced(&repo)?;

            let page_id = match &request.page_id {
                Some(id) => {
                    if repo.id_taken(id)? {
                        return Err(CmsError::invalid(format!("page id '{}' is already in use", id)));
                    }
                    id.clone()
                }
                None => generate_page_id(),
            };

            let allocation = allocate(&repo, &request.placement())?;
            make_room(&repo, allocation.target)?;

            let title = request.title.trim();
            let payload = match &request.initial_payload {
                Some(p) => merge_payload(&template.initial_payload(title), p),
                None => template.initial_payload(title),
            };
            let actor = request.updated_by.as_deref().unwrap_or(DEFAULT_ACTOR);

            repo.insert(&NewPage {
                page_id: &page_id,
                position: allocation.target,
                page_type: template.id(),
                title,
                page_data: &payload,
                updated_by: actor,
            })?;

            rebuild::rebuild(&repo)?;
            let position = repo
                .position_of(&page_id)?
                .ok_or_else(|| CmsError::not_found(page_id.clone()))?;

            history.record(
                tx,
                &HistoryEvent {
                    page_id: page_id.clone(),
                    page_number: position,
                    old_data: json!({}),
                    new_data: payload,
                    changed_by: actor.to_string(),
                    description: "Page created".to_string(),
                },
            )?;

            info!("📄 Created page {} ({}) at position {} via {:?}", page_id, template, position, allocation.rule);
            Ok(CreatedPage {
                page_id,
                page_number: position,
                position,
                template: template.id().to_string(),
                title: title.to_string(),
            })
        })
        .await
    }

    async fn delete_page(&self, page_id: &str) -> Result<DeletedPage> {
        let page_id = page_id.to_string();

        self.write("delete_page", move |tx, history| {
            let repo = PageRepo::new(tx);
            rebuild::settle_unplaced(&repo)?;
            let page = repo
                .get(&page_id, false)?
                .ok_or_else(|| CmsError::not_found(page_id.clone()))?;

            repo.mark_deleted(&page_id, DEFAULT_ACTOR)?;
            close_gap(&repo, page.position)?;
            rebuild::rebuild(&repo)?;

            history.record(
                tx,
                &HistoryEvent {
                    page_id: page_id.clone(),
                    page_number: page.page_number,
                    old_data: page.page_data,
                    new_data: json!({}),
                    changed_by: DEFAULT_ACTOR.to_string(),
                    description: "Page deleted".to_string(),
                },
            )?;

            info!("🗑️ Deleted page {} from position {}", page_id, page.position);
            Ok(DeletedPage { page_id, position: page.position })
        })
        .await
    }

    async fn reorder_pages(&self, order: Vec<String>) -> Result<Vec<PageSummary>> {
        self.write("reorder_pages", move |tx, history| {
            let repo = PageRepo::new(tx);
            rebuild::settle_unplaced(&repo)?;
            apply_permutation(&repo, &order, DEFAULT_ACTOR)?;
            rebuild::rebuild(&repo)?;

            history.record(
                tx,
                &HistoryEvent {
                    page_id: BULK_REORDER_ID.to_string(),
                    page_number: 0,
                    old_data: json!({}),
                    new_data: json!({ "pageOrder": &order }),
                    changed_by: DEFAULT_ACTOR.to_string(),
                    description: "Pages reordered".to_string(),
                },
            )?;

            info!("🔀 Reordered {} pages", order.len());
            repo.list(false)
        })
        .await
    }

    async fn list_pages(&self, include_deleted: bool) -> Result<Vec<PageSummary>> {
        self.read(move |conn| PageRepo::new(conn).list(include_deleted)).await
    }

    async fn list_full_pages(&self) -> Result<Vec<Page>> {
        self.read(|conn| PageRepo::new(conn).list_full()).await
    }

    async fn repair_positions(&self) -> Result<RebuildReport> {
        self.write("repair_positions", |tx, _| rebuild::rebuild(&PageRepo::new(tx))).await
    }

    async fn audit_positions(&self) -> Result<PositionAudit> {
        self.read(|conn| rebuild::audit(&PageRepo::new(conn))).await
    }

    async fn get_page(&self, page_id: &str) -> Result<Page> {
        let page_id = page_id.to_string();
        self.read(move |conn| {
            PageRepo::new(conn)
                .get(&page_id, false)?
                .ok_or_else(|| CmsError::not_found(page_id))
        })
        .await
    }

    async fn update_page(&self, page_id: &str, update: UpdatePageRequest) -> Result<Page> {
        let page_id = page_id.to_string();

        self.write("update_page", move |tx, history| {
            let repo = PageRepo::new(tx);
            let current = repo
                .get(&page_id, false)?
                .ok_or_else(|| CmsError::not_found(page_id.clone()))?;

            let patch = update.page_data.unwrap_or_else(|| json!({}));
            let merged = merge_payload(&current.page_data, &patch);
            let title = update
                .title
                .as_deref()
                .or_else(|| title_from_patch(&patch))
                .unwrap_or(&current.title)
                .to_string();
            let actor = update.updated_by.as_deref().unwrap_or(DEFAULT_ACTOR);

            repo.update_content(&page_id, &title, &merged, actor)?;
            history.record(
                tx,
                &HistoryEvent {
                    page_id: page_id.clone(),
                    page_number: current.page_number,
                    old_data: current.page_data,
                    new_data: merged,
                    changed_by: actor.to_string(),
                    description: "Page updated".to_string(),
                },
            )?;

            debug!(page_id = %page_id, "Updated page content");
            repo.get(&page_id, false)?.ok_or_else(|| CmsError::not_found(page_id))
        })
        .await
    }

    async fn export_pages(&self) -> Result<Vec<Value>> {
        Ok(self.list_full_pages().await?.into_iter().map(|p| p.page_data).collect())
    }

    async fn page_history(&self, page_id: &str, limit: usize) -> Result<Vec<HistoryRecord>> {
        let page_id = page_id.to_string();
        self.read(move |conn| history::recent(conn, Some(&page_id), limit)).await
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.read(move |conn| history::recent(conn, None, limit)).await
    }

    async fn seed_pages(&self, pages: Vec<LegacyPage>) -> Result<RebuildReport> {
        self.write("seed_pages", move |tx, _| {
            let repo = PageRepo::new(tx);
            for page in &pages {
                repo.upsert_legacy(
                    &page.page_id,
                    page.page_number,
                    &page.page_type,
                    &page.title,
                    &page.record,
                    "migration",
                )?;
            }
            let report = rebuild::rebuild(&repo)?;
            info!("🌱 Seeded {} pages", pages.len());
            Ok(report)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::model::PositionParams;
    use tempfile::NamedTempFile;

    async fn store() -> (NamedTempFile, SqlitePageStore) {
        let file = NamedTempFile::new().unwrap();
        let store = SqlitePageStore::new(file.path()).await.unwrap();
        (file, store)
    }

    async fn add(store: &SqlitePageStore, id: &str) -> CreatedPage {
        store
            .create_page(CreatePageRequest::new("text-only", id).with_page_id(id))
            .await
            .unwrap()
    }

    fn order(pages: &[PageSummary]) -> Vec<(&str, i64)> {
        pages.iter().map(|p| (p.page_id.as_str(), p.position)).collect()
    }

    #[tokio::test]
    async fn test_create_appends_by_default() {
        let (_f, store) = store().await;
        assert_eq!(add(&store, "a").await.position, 1);
        assert_eq!(add(&store, "b").await.position, 2);
        let created = store.create_page(CreatePageRequest::new("heading", "Untitled")).await.unwrap();
        assert_eq!(created.position, 3);
        assert!(created.page_id.starts_with("page_"));
        assert_eq!(created.template, "heading");
    }

    #[tokio::test]
    async fn test_create_before_reference() {
        let (_f, store) = store().await;
        for id in ["a", "b", "c"] {
            add(&store, id).await;
        }
        let created = store
            .create_page(
                CreatePageRequest::new("table", "D")
                    .with_page_id("d")
                    .with_position_params(PositionParams::before("b")),
            )
            .await
            .unwrap();
        assert_eq!(created.position, 2);

        let pages = store.list_pages(false).await.unwrap();
        assert_eq!(order(&pages), vec![("a", 1), ("d", 2), ("b", 3), ("c", 4)]);
        assert!(pages.iter().all(|p| p.page_number == p.position));
    }

    #[tokio::test]
    async fn test_reused_id_rejected_even_after_delete() {
        let (_f, store) = store().await;
        add(&store, "a").await;
        store.delete_page("a").await.unwrap();
        let err = store
            .create_page(CreatePageRequest::new("text-only", "again").with_page_id("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, CmsError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (_f, store) = store().await;
        add(&store, "a").await;
        store.delete_page("a").await.unwrap();
        assert!(matches!(store.delete_page("a").await, Err(CmsError::NotFound { .. })));
        assert!(matches!(store.delete_page("nope").await, Err(CmsError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_merges_payload_and_keeps_position() {
        let (_f, store) = store().await;
        add(&store, "a").await;
        store
            .create_page(CreatePageRequest::new("heading", "Cover").with_page_id("cover"))
            .await
            .unwrap();

        let updated = store
            .update_page(
                "cover",
                UpdatePageRequest {
                    page_data: Some(json!({ "subtitle": "2024", "title": "Front" })),
                    title: None,
                    updated_by: Some("editor".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Front");
        assert_eq!(updated.page_data, json!({ "title": "Front", "subtitle": "2024" }));
        assert_eq!(updated.position, 2);
        assert_eq!(updated.updated_by, "editor");

        let history = store.page_history("cover", 50).await.unwrap();
        assert_eq!(history[0].change_description, "Page updated");
        assert_eq!(history[0].old_data["title"], "Cover");
    }

    #[tokio::test]
    async fn test_history_disabled_records_nothing() {
        let file = NamedTempFile::new().unwrap();
        let store = SqlitePageStore::open(file.path(), Arc::new(NullHistory), Duration::from_secs(1))
            .await
            .unwrap();
        add(&store, "a").await;
        assert!(store.recent_history(100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_follows_position_order() {
        let (_f, store) = store().await;
        for id in ["a", "b"] {
            add(&store, id).await;
        }
        store.reorder_pages(vec!["b".into(), "a".into()]).await.unwrap();
        let export = store.export_pages().await.unwrap();
        assert_eq!(export.len(), 2);
        let titles: Vec<PageSummary> = store.list_pages(false).await.unwrap();
        assert_eq!(titles[0].page_id, "b");
    }
}
