//! Position Allocator
//!
//! Resolves where a new page goes before anything is shifted. Pure
//! computation over a `PositionLookup`; nothing is written.

use tracing::{debug, warn};

use crate::error::Result;
use crate::pages::model::Placement;
use crate::pages::repo::PageRepo;

/// Read access the allocator needs. Implemented by the repository inside the
/// caller's transaction so `max_position` is never stale.
pub trait PositionLookup {
    fn position_of(&self, page_id: &str) -> Result<Option<i64>>;
    fn max_position(&self) -> Result<i64>;
}

impl PositionLookup for PageRepo<'_> {
    fn position_of(&self, page_id: &str) -> Result<Option<i64>> {
        PageRepo::position_of(self, page_id)
    }

    fn max_position(&self) -> Result<i64> {
        PageRepo::max_position(self)
    }
}

/// Which rule produced the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementRule {
    Reference,
    LegacyAfter,
    Explicit,
    EndOfDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub target: i64,
    pub rule: PlacementRule,
}

/// Resolve the insertion slot. First matching rule wins:
/// reference page (before/after), legacy insert-after id, explicit position,
/// end of document. Unresolvable reference ids fall through.
/// The result always lies in `1..=max + 1`.
pub fn allocate(lookup: &impl PositionLookup, placement: &Placement) -> Result<Allocation> {
    let max = lookup.max_position()?;
    let clamp = |p: i64| p.clamp(1, max + 1);

    if let Some(params) = &placement.position_params {
        if let Some(reference) = &params.reference_page_id {
            match lookup.position_of(reference)? {
                Some(p) => {
                    let target = if params.insert_before { p } else { p + 1 };
                    debug!(reference = %reference, before = params.insert_before, target, "Placed relative to reference page");
                    return Ok(Allocation { target: clamp(target), rule: PlacementRule::Reference });
                }
                None => warn!("Reference page '{}' not found; falling back", reference),
            }
        }
    }

    if let Some(after) = &placement.insert_after_page_id {
        match lookup.position_of(after)? {
            Some(p) => {
                return Ok(Allocation { target: clamp(p + 1), rule: PlacementRule::LegacyAfter });
            }
            None => warn!("Insert-after page '{}' not found; falling back", after),
        }
    }

    if let Some(p) = placement.position.filter(|p| *p > 0) {
        return Ok(Allocation { target: clamp(p), rule: PlacementRule::Explicit });
    }

    Ok(Allocation { target: max + 1, rule: PlacementRule::EndOfDocument })
}
