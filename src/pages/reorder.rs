//! Bulk reorder
//!
//! Applies a caller-supplied permutation of every surviving page id. The
//! list is validated in full before anything is written.

use std::collections::HashSet;
use tracing::debug;

use crate::error::{CmsError, Result};
use crate::pages::repo::PageRepo;

/// Check that `order` names each surviving page exactly once.
pub fn validate_permutation(repo: &PageRepo<'_>, order: &[String]) -> Result<()> {
    let active: HashSet<String> = repo.active_slots()?.into_iter().map(|s| s.page_id).collect();

    if order.len() != active.len() {
        return Err(CmsError::invalid(format!(
            "pageOrder has {} ids but the document has {} pages",
            order.len(),
            active.len()
        )));
    }

    let mut seen = HashSet::with_capacity(order.len());
    for id in order {
        if !seen.insert(id.as_str()) {
            return Err(CmsError::invalid(format!("page '{}' appears more than once in pageOrder", id)));
        }
        if !active.contains(id) {
            return Err(CmsError::invalid(format!("page '{}' is not an active page", id)));
        }
    }
    Ok(())
}

/// Set `position = page_number = i + 1` for the i-th id. Returns rows written.
pub fn apply_permutation(repo: &PageRepo<'_>, order: &[String], actor: &str) -> Result<usize> {
    validate_permutation(repo, order)?;

    let mut written = 0;
    for (i, id) in order.iter().enumerate() {
        written += repo.set_slot(id, i as i64 + 1)?;
        repo.touch(id, actor)?;
    }
    debug!(written, "Applied permutation");
    Ok(written)
}
