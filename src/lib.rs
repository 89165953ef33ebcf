//! Page Ledger
//!
//! Content backend for a single ordered report document:
//! - Dense, gap-free page ordering (allocate, shift, rebuild)
//! - Soft deletes that never reuse ids
//! - Transactional bulk reorder and on-demand repair
//! - Append-only page history
//! - Thin HTTP surface

pub mod config;
pub mod error;
pub mod history;
pub mod pages;
pub mod server;
pub mod telemetry;

// Re-exports for convenience
pub use config::CmsConfig;
pub use error::CmsError;
pub use pages::{PageStore, SqlitePageStore};
