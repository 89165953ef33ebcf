use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Router,
};
use anyhow::Result;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::CmsConfig;
use crate::error::CmsError;
use crate::pages::model::{CreatePageRequest, TemplateInfo, UpdatePageRequest};
use crate::pages::{PageStore, PageTemplate};

const PAGE_HISTORY_LIMIT: usize = 50;
const RECENT_HISTORY_LIMIT: usize = 100;

struct ServerError(CmsError);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CmsError::NotFound { .. } => StatusCode::NOT_FOUND,
            CmsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(json!({ "error": self.0.to_string(), "retryable": self.0.is_retryable() })),
        )
            .into_response()
    }
}

impl From<CmsError> for ServerError {
    fn from(err: CmsError) -> Self {
        Self(err)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PageStore>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderRequest {
    page_order: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    #[serde(default)]
    include_deleted: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { Json(json!({ "status": "OK" })) }))
        .route("/api/pages", get(list_active))
        .route("/api/pages/export/full", get(export_full))
        .route("/api/pages/{page_id}", get(get_page).post(update_page))
        .route("/api/history", get(recent_history))
        .route("/api/history/{page_id}", get(page_history))
        .route("/api/cms/templates", get(templates))
        .route("/api/cms/create", post(create_page))
        .route("/api/cms/reorder", patch(reorder_pages))
        .route("/api/cms/list", get(list_pages))
        .route("/api/cms/repair", post(repair_positions))
        .route("/api/cms/audit", get(audit_positions))
        .route("/api/cms/{page_id}", delete(delete_page))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: &CmsConfig, store: Arc<dyn PageStore>) -> Result<()> {
    let app = router(AppState { store });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Page server listening at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "name": "Page Ledger",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /health",
            "GET /api/pages",
            "GET /api/pages/{pageId}",
            "POST /api/pages/{pageId}",
            "GET /api/pages/export/full",
            "GET /api/history",
            "GET /api/history/{pageId}",
            "GET /api/cms/templates",
            "POST /api/cms/create",
            "DELETE /api/cms/{pageId}",
            "PATCH /api/cms/reorder",
            "GET /api/cms/list",
            "POST /api/cms/repair",
            "GET /api/cms/audit"
        ]
    }))
}

async fn list_active(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    Ok(Json(state.store.list_full_pages().await?))
}

async fn list_pages(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServerError> {
    Ok(Json(state.store.list_pages(query.include_deleted).await?))
}

async fn get_page(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    Ok(Json(state.store.get_page(&page_id).await?))
}

async fn update_page(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Json(update): Json<UpdatePageRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let page = state.store.update_page(&page_id, update).await?;
    Ok(Json(json!({ "success": true, "message": "Page saved successfully", "page": page })))
}

async fn export_full(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let pages = state.store.export_pages().await?;
    Ok(Json(json!({ "pages": pages })))
}

async fn recent_history(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    Ok(Json(state.store.recent_history(RECENT_HISTORY_LIMIT).await?))
}

async fn page_history(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    Ok(Json(state.store.page_history(&page_id, PAGE_HISTORY_LIMIT).await?))
}

async fn templates() -> impl IntoResponse {
    let templates: Vec<TemplateInfo> = PageTemplate::ALL.into_iter().map(TemplateInfo::from).collect();
    Json(json!({ "templates": templates }))
}

async fn create_page(
    State(state): State<AppState>,
    Json(request): Json<CreatePageRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let page = state.store.create_page(request).await?;
    Ok(Json(json!({ "success": true, "message": "Page created successfully", "page": page })))
}

async fn delete_page(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let deleted = state.store.delete_page(&page_id).await?;
    Ok(Json(json!({ "success": true, "message": "Page deleted successfully", "page": deleted })))
}

async fn reorder_pages(
    State(state): State<AppState>,
    Json(request): Json<ReorderRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let pages = state.store.reorder_pages(request.page_order).await?;
    Ok(Json(json!({ "success": true, "message": "Pages reordered successfully", "pages": pages })))
}

async fn repair_positions(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let report = state.store.repair_positions().await?;
    Ok(Json(json!({ "success": true, "report": report })))
}

async fn audit_positions(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let audit = state.store.audit_positions().await?;
    Ok(Json(json!({ "consistent": audit.is_consistent(), "audit": audit })))
}
