use std::collections::BTreeSet;

use thiserror::Error;

use crate::dedup::DuplicateGroup;
use crate::models::RecordId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("record {0} is the protected copy of its group and cannot be selected")]
    InvalidSelection(RecordId),

    #[error("record {0} is not part of any visible duplicate group")]
    UnknownRecord(RecordId),
}

/// Record ids the user has marked for deletion in the current view.
///
/// Never contains a keeper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTracker {
    selected: BTreeSet<RecordId>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips `record_id` in or out of the selection. Returns whether the id
    /// is selected afterwards.
    pub fn toggle(&mut self, record_id: RecordId, group: &DuplicateGroup) -> Result<bool, SelectionError> {
        if group.is_keeper(record_id) {
            return Err(SelectionError::InvalidSelection(record_id));
        }
        if !group.contains(record_id) {
            return Err(SelectionError::UnknownRecord(record_id));
        }
        if self.selected.remove(&record_id) {
            Ok(false)
        } else {
            self.selected.insert(record_id);
            Ok(true)
        }
    }

    /// Like [`toggle`](Self::toggle), locating the owning group among `groups`.
    pub fn toggle_visible(
        &mut self,
        record_id: RecordId,
        groups: &[DuplicateGroup],
    ) -> Result<bool, SelectionError> {
        let group = groups
            .iter()
            .find(|g| g.contains(record_id))
            .ok_or(SelectionError::UnknownRecord(record_id))?;
        self.toggle(record_id, group)
    }

    /// Adds every non-keeper across `groups`. Returns how many were newly added.
    pub fn select_all_deletable(&mut self, groups: &[DuplicateGroup]) -> usize {
        let before = self.selected.len();
        for group in groups {
            self.selected.extend(group.deletable_ids());
        }
        self.selected.len() - before
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, record_id: RecordId) -> bool {
        self.selected.contains(&record_id)
    }

    pub fn ids(&self) -> &BTreeSet<RecordId> {
        &self.selected
    }

    /// Snapshot of the selection, for building a deletion request.
    pub fn snapshot(&self) -> BTreeSet<RecordId> {
        self.selected.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{EquivalenceMode, KeeperPolicy};
    use crate::models::AudiobookRecord;

    fn group(ids: &[i64], hash: &str) -> DuplicateGroup {
        let members = ids
            .iter()
            .map(|id| AudiobookRecord::new(*id, "Dune", "Frank Herbert").with_hash(hash))
            .collect();
        DuplicateGroup::from_members(EquivalenceMode::ExactContent, hash, members, &KeeperPolicy).unwrap()
    }

    #[test]
    fn test_toggle_keeper_is_rejected_and_set_unchanged() {
        let g = group(&[1, 2, 3], "a");
        let mut tracker = SelectionTracker::new();
        tracker.toggle(RecordId(2), &g).unwrap();

        let err = tracker.toggle(g.keeper_id, &g).unwrap_err();
        assert_eq!(err, SelectionError::InvalidSelection(RecordId(1)));
        assert_eq!(tracker.ids().iter().copied().collect::<Vec<_>>(), vec![RecordId(2)]);
    }

    #[test]
    fn test_toggle_twice_deselects() {
        let g = group(&[1, 2], "a");
        let mut tracker = SelectionTracker::new();
        assert!(tracker.toggle(RecordId(2), &g).unwrap());
        assert!(!tracker.toggle(RecordId(2), &g).unwrap());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_toggle_unknown_record() {
        let groups = vec![group(&[1, 2], "a")];
        let mut tracker = SelectionTracker::new();
        assert_eq!(
            tracker.toggle_visible(RecordId(99), &groups),
            Err(SelectionError::UnknownRecord(RecordId(99)))
        );
        assert_eq!(
            tracker.toggle(RecordId(99), &groups[0]),
            Err(SelectionError::UnknownRecord(RecordId(99)))
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_select_all_deletable_skips_keepers() {
        let groups = vec![group(&[1, 2, 3], "a"), group(&[10, 11], "b")];
        let mut tracker = SelectionTracker::new();
        assert_eq!(tracker.select_all_deletable(&groups), 3);
        assert_eq!(tracker.len(), 3);
        for g in &groups {
            assert!(!tracker.contains(g.keeper_id));
        }
        assert_eq!(tracker.select_all_deletable(&groups), 0);

        tracker.clear();
        assert_eq!(tracker.len(), 0);
    }
}
