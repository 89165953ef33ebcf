use anyhow::Result;
use tracing::{info, warn};

use page_ledger::{CmsConfig, PageStore, SqlitePageStore};

/// Pass `--check` to report drift without fixing it.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let check_only = std::env::args().any(|a| a == "--check");
    let store = SqlitePageStore::from_config(&CmsConfig::from_env()).await?;

    let audit = store.audit_positions().await?;
    if audit.is_consistent() {
        info!("✅ {} pages, ordering consistent", audit.active);
        return Ok(());
    }

    warn!(
        "⚠️ Drift detected: gaps {:?}, duplicates {:?}, out of range {:?}, page_number mismatches {}",
        audit.gaps,
        audit.duplicates,
        audit.out_of_range,
        audit.mismatched.len()
    );
    if check_only {
        std::process::exit(1);
    }

    let report = store.repair_positions().await?;
    info!("🔧 Repaired: {} of {} pages renumbered", report.changed, report.scanned);
    Ok(())
}
