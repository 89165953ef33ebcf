use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use page_ledger::pages::seed::parse_report;
use page_ledger::{CmsConfig, PageStore, SqlitePageStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let report_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: seed_pages <structured_report_data.json>")?;

    let raw = tokio::fs::read_to_string(&report_path)
        .await
        .with_context(|| format!("Failed to read {}", report_path.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&raw).context("Report is not valid JSON")?;
    let pages = parse_report(&doc)?;

    let config = CmsConfig::from_env();
    let store = SqlitePageStore::from_config(&config).await?;

    info!("📝 Importing {} pages into {}", pages.len(), config.database_path.display());
    let report = store.seed_pages(pages).await?;
    info!("✅ Import complete ({} pages renumbered)", report.changed);

    Ok(())
}
