//! Page Ordering and Consistency Engine
//!
//! Keeps the surviving pages of the document numbered `1..=N` with
//! `page_number == position`, across inserts, soft deletes and bulk reorders.
//!
//! - `allocator`: where a new page goes
//! - `shift`: opening and closing slots around it
//! - `rebuild`: dense renumbering, run after every mutation and on demand
//! - `reorder`: caller-supplied permutations
//! - `store`: the transactional operations built from the above

pub mod model;
pub mod repo;
pub mod allocator;
pub mod shift;
pub mod rebuild;
pub mod reorder;
pub mod content;
pub mod seed;
pub mod store;

pub use model::{CreatePageRequest, CreatedPage, Page, PageSummary, PageTemplate, PositionParams, UpdatePageRequest};
pub use rebuild::{PositionAudit, RebuildReport};
pub use store::{DeletedPage, PageStore, SqlitePageStore};
