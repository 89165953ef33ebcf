use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use page_ledger::server::{router, AppState};
use page_ledger::{PageStore, SqlitePageStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

async fn app() -> anyhow::Result<(NamedTempFile, Router)> {
    let tmp = NamedTempFile::new()?;
    let store: Arc<dyn PageStore> = Arc::new(SqlitePageStore::new(tmp.path()).await?);
    Ok((tmp, router(AppState { store })))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> anyhow::Result<(StatusCode, Value)> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&b)?))?,
        None => builder.body(Body::empty())?,
    };
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, value))
}

async fn create(app: &Router, body: Value) -> anyhow::Result<String> {
    let (status, value) = call(app, Method::POST, "/api/cms/create", Some(body)).await?;
    assert_eq!(status, StatusCode::OK, "{value}");
    Ok(value["page"]["page_id"].as_str().unwrap_or_default().to_string())
}

fn order(list: &Value) -> Vec<String> {
    list.as_array()
        .map(|pages| {
            pages
                .iter()
                .map(|p| format!("{}@{}", p["page_id"].as_str().unwrap_or("?"), p["position"]))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_create_delete_reorder_over_http() -> anyhow::Result<()> {
    let (_tmp, app) = app().await?;

    for id in ["a", "b", "c"] {
        create(&app, json!({ "template": "text-only", "title": id, "pageId": id })).await?;
    }
    create(
        &app,
        json!({
            "template": "heading",
            "title": "D",
            "pageId": "d",
            "positionParams": { "pageId": "b", "insertBefore": true }
        }),
    )
    .await?;

    let (_, list) = call(&app, Method::GET, "/api/pages", None).await?;
    assert_eq!(order(&list), vec!["a@1", "d@2", "b@3", "c@4"]);
    assert_eq!(list[1]["page_data"], json!({ "title": "D", "subtitle": "" }));

    let (status, _) = call(&app, Method::DELETE, "/api/cms/b", None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, Method::DELETE, "/api/cms/b", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["retryable"], false);

    let (_, list) = call(&app, Method::GET, "/api/cms/list?includeDeleted=true", None).await?;
    assert_eq!(list.as_array().map(Vec::len), Some(4));

    let (status, body) = call(&app, Method::PATCH, "/api/cms/reorder", Some(json!({ "pageOrder": ["c", "a", "d"] }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order(&body["pages"]), vec!["c@1", "a@2", "d@3"]);

    let (status, _) = call(&app, Method::PATCH, "/api/cms/reorder", Some(json!({ "pageOrder": ["c"] }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app, Method::POST, "/api/cms/repair", None).await?;
    assert_eq!(body["report"]["changed"], 0);

    let (_, body) = call(&app, Method::GET, "/api/cms/audit", None).await?;
    assert_eq!(body["consistent"], true);
    Ok(())
}

#[tokio::test]
async fn test_validation_errors_are_bad_requests() -> anyhow::Result<()> {
    let (_tmp, app) = app().await?;

    let (status, _) = call(&app, Method::POST, "/api/cms/create", Some(json!({ "template": "heading", "title": "" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::POST, "/api/cms/create", Some(json!({ "template": "poster", "title": "X" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::GET, "/api/pages/missing", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_update_history_and_export() -> anyhow::Result<()> {
    let (_tmp, app) = app().await?;
    let id = create(&app, json!({ "template": "table", "title": "Metrics" })).await?;

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/pages/{id}"),
        Some(json!({ "page_data": { "captionTop": "Q3", "title": "Q3 Metrics" }, "updated_by": "editor" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"]["title"], "Q3 Metrics");
    assert_eq!(body["page"]["page_data"]["captionBottom"], "");

    let (_, history) = call(&app, Method::GET, &format!("/api/history/{id}"), None).await?;
    let descriptions: Vec<&str> = history
        .as_array()
        .map(|h| h.iter().filter_map(|e| e["change_description"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(descriptions, vec!["Page updated", "Page created"]);

    let (_, pages) = call(&app, Method::GET, "/api/pages", None).await?;
    assert_eq!(pages[0]["page_data"]["captionTop"], "Q3");
    assert_eq!(pages[0]["updated_by"], "editor");
    assert!(pages[0]["updated_at"].is_string());

    let (_, export) = call(&app, Method::GET, "/api/pages/export/full", None).await?;
    assert_eq!(export["pages"][0]["captionTop"], "Q3");

    let (_, templates) = call(&app, Method::GET, "/api/cms/templates", None).await?;
    assert_eq!(templates["templates"].as_array().map(Vec::len), Some(9));
    let heading = templates["templates"]
        .as_array()
        .and_then(|all| all.iter().find(|t| t["id"] == "heading"))
        .cloned()
        .unwrap_or_default();
    assert_eq!(heading["initial_payload"], json!({ "title": "", "subtitle": "" }));
    Ok(())
}
