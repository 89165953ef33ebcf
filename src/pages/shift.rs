//! Shift Propagator
//!
//! Opens a slot for an insertion or closes the slot left by a deletion while
//! keeping every other surviving page in the same relative order. Both moves
//! are single bulk updates inside the caller's transaction.

use tracing::debug;

use crate::error::Result;
use crate::pages::repo::PageRepo;

/// Push every surviving page at `target` or later down by one.
/// `target` must already be a valid `1..=N+1` slot.
pub fn make_room(repo: &PageRepo<'_>, target: i64) -> Result<usize> {
    let moved = repo.shift_down_from(target)?;
    debug!(target, moved, "Opened slot");
    Ok(moved)
}

/// Pull every surviving page after `vacated` up by one. Only `position`
/// moves here; `page_number` is realigned by the rebuild that follows.
pub fn close_gap(repo: &PageRepo<'_>, vacated: i64) -> Result<usize> {
    let moved = repo.shift_up_after(vacated)?;
    debug!(vacated, moved, "Closed slot");
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::repo::{init_schema, NewPage};
    use rusqlite::Connection;
    use serde_json::json;

    fn doc(ids: &[&str]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let data = json!({});
        let repo = PageRepo::new(&conn);
        for (i, id) in ids.iter().enumerate() {
            repo.insert(&NewPage {
                page_id: id,
                position: i as i64 + 1,
                page_type: "heading",
                title: id,
                page_data: &data,
                updated_by: "test",
            })
            .unwrap();
        }
        conn
    }

    fn positions(repo: &PageRepo<'_>) -> Vec<(String, i64, i64)> {
        repo.active_slots()
            .unwrap()
            .into_iter()
            .map(|s| (s.page_id, s.position, s.page_number))
            .collect()
    }

    #[test]
    fn test_make_room_moves_tail_only() {
        let conn = doc(&["a", "b", "c"]);
        let repo = PageRepo::new(&conn);
        assert_eq!(make_room(&repo, 2).unwrap(), 2);
        assert_eq!(
            positions(&repo),
            vec![("a".into(), 1, 1), ("b".into(), 3, 3), ("c".into(), 4, 4)]
        );
    }

    #[test]
    fn test_make_room_at_end_moves_nothing() {
        let conn = doc(&["a", "b"]);
        assert_eq!(make_room(&PageRepo::new(&conn), 3).unwrap(), 0);
    }

    #[test]
    fn test_close_gap_ignores_deleted_rows() {
        let conn = doc(&["a", "b", "c"]);
        let repo = PageRepo::new(&conn);
        repo.mark_deleted("b", "test").unwrap();
        assert_eq!(close_gap(&repo, 2).unwrap(), 1);
        assert_eq!(positions(&repo), vec![("a".into(), 1, 1), ("c".into(), 2, 3)]);
        assert_eq!(repo.get("b", true).unwrap().unwrap().position, 2);
    }
}
