//! Page Ledger server
//!
//! Loads `.env`, sets up tracing, opens (or upgrades) the page database and
//! serves the HTTP API.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use page_ledger::server::run_server;
use page_ledger::telemetry::init_telemetry;
use page_ledger::{CmsConfig, PageStore, SqlitePageStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = CmsConfig::from_env();
    let _telemetry = init_telemetry("page_ledger", &config)?;

    info!(
        "📍 Database: {} | history: {}",
        config.database_path.display(),
        if config.track_history { "on" } else { "off" }
    );

    let store: Arc<dyn PageStore> = Arc::new(SqlitePageStore::from_config(&config).await?);
    run_server(&config, store).await
}
