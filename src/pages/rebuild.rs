//! Rebuilder
//!
//! Renumbers every surviving page to the dense sequence `1..=N` in current
//! order and sets `page_number` to match. Runs at the end of every mutation
//! and on demand as the repair operation. Works from any starting state,
//! including gaps, duplicates and NULL positions (placed last, in insertion
//! order).

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::pages::repo::{PageRepo, Slot};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct RebuildReport {
    /// Surviving pages scanned
    pub scanned: usize,
    /// Rows whose position or page_number was rewritten
    pub changed: usize,
}

/// Rewrite positions so that invariants hold. Only rows that differ are written.
pub fn rebuild(repo: &PageRepo<'_>) -> Result<RebuildReport> {
    let slots = repo.active_slots()?;
    let mut changed = 0;

    for (i, slot) in slots.iter().enumerate() {
        let expected = i as i64 + 1;
        if slot.position != expected || slot.page_number != expected {
            repo.set_slot(&slot.page_id, expected)?;
            changed += 1;
        }
    }

    let report = RebuildReport { scanned: slots.len(), changed };
    if changed > 0 {
        info!("🔧 Rebuilt positions: {} of {} pages renumbered", changed, slots.len());
    } else {
        debug!(scanned = slots.len(), "Positions already consistent");
    }
    Ok(report)
}

/// Renumber first if any surviving page lost its position, so that the
/// allocator and shifts of the mutation that follows see real slots.
pub fn settle_unplaced(repo: &PageRepo<'_>) -> Result<Option<RebuildReport>> {
    let unplaced = repo.count_unplaced()?;
    if unplaced == 0 {
        return Ok(None);
    }
    warn!("⚠️ {} page(s) without a position; renumbering before write", unplaced);
    rebuild(repo).map(Some)
}

/// Invariant violations among surviving pages.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct PositionAudit {
    pub active: usize,
    /// Slots in `1..=active` that no page occupies
    pub gaps: Vec<i64>,
    /// Positions held by more than one page
    pub duplicates: Vec<i64>,
    /// Positions outside `1..=active`
    pub out_of_range: Vec<i64>,
    /// Pages whose page_number differs from position
    pub mismatched: Vec<String>,
}

impl PositionAudit {
    pub fn is_consistent(&self) -> bool {
        self.gaps.is_empty()
            && self.duplicates.is_empty()
            && self.out_of_range.is_empty()
            && self.mismatched.is_empty()
    }
}

/// Inspect the current ordering without changing anything.
pub fn audit(repo: &PageRepo<'_>) -> Result<PositionAudit> {
    Ok(audit_slots(&repo.active_slots()?))
}

fn audit_slots(slots: &[Slot]) -> PositionAudit {
    let active = slots.len() as i64;
    let mut seen: HashMap<i64, usize> = HashMap::new();
    for slot in slots {
        *seen.entry(slot.position).or_default() += 1;
    }

    let mut duplicates: Vec<i64> = seen.iter().filter(|(_, n)| **n > 1).map(|(p, _)| *p).collect();
    duplicates.sort_unstable();
    let mut out_of_range: Vec<i64> = seen.keys().copied().filter(|p| *p < 1 || *p > active).collect();
    out_of_range.sort_unstable();

    PositionAudit {
        active: slots.len(),
        gaps: (1..=active).filter(|p| !seen.contains_key(p)).collect(),
        duplicates,
        out_of_range,
        mismatched: slots
            .iter()
            .filter(|s| s.position != s.page_number)
            .map(|s| s.page_id.clone())
            .collect(),
    }
}
