use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EquivalenceMode, KeeperPolicy};
use crate::models::{AudiobookRecord, RecordId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("group '{0}' has fewer than two members")]
    TooFewMembers(String),

    #[error("group '{title}' has {found} keepers, expected exactly one")]
    KeeperCount { title: String, found: usize },

    #[error("keeper {keeper} is not a member of group '{title}'")]
    KeeperNotMember { title: String, keeper: RecordId },

    #[error("record {0} appears twice in group")]
    DuplicateMember(RecordId),
}

/// Two or more records considered equivalent under one mode, with exactly
/// one protected keeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub mode: EquivalenceMode,
    /// Content hash or normalized title/author pair the members share.
    pub key: String,
    pub title: String,
    pub keeper_id: RecordId,
    /// Ordered by id.
    pub members: Vec<AudiobookRecord>,
    pub wasted_or_savable_bytes: u64,
}

impl DuplicateGroup {
    /// Builds a group and picks its keeper with `policy`. `None` for fewer
    /// than two distinct members.
    pub fn from_members(
        mode: EquivalenceMode,
        key: impl Into<String>,
        members: Vec<AudiobookRecord>,
        policy: &KeeperPolicy,
    ) -> Option<Self> {
        let members = distinct_sorted(members);
        if members.len() < 2 {
            return None;
        }
        let keeper_id = policy.select(&members)?;
        Some(Self::assemble(mode, key.into(), members, keeper_id))
    }

    /// Builds a group whose keeper was decided elsewhere (e.g. by the catalog
    /// API) and checks the group invariants.
    pub fn with_keeper(
        mode: EquivalenceMode,
        key: impl Into<String>,
        members: Vec<AudiobookRecord>,
        keeper_id: RecordId,
    ) -> Result<Self, GroupError> {
        let mut seen = HashSet::new();
        for member in &members {
            if !seen.insert(member.id) {
                return Err(GroupError::DuplicateMember(member.id));
            }
        }
        let mut members = members;
        members.sort_by_key(|m| m.id);
        let group = Self::assemble(mode, key.into(), members, keeper_id);
        group.validate()?;
        Ok(group)
    }

    fn assemble(
        mode: EquivalenceMode,
        key: String,
        members: Vec<AudiobookRecord>,
        keeper_id: RecordId,
    ) -> Self {
        let title = members
            .iter()
            .find(|m| m.id == keeper_id)
            .or_else(|| members.first())
            .map(|m| m.title.clone())
            .unwrap_or_default();
        let wasted_or_savable_bytes = members
            .iter()
            .filter(|m| m.id != keeper_id)
            .map(|m| m.file_size_bytes)
            .sum();
        Self {
            mode,
            key,
            title,
            keeper_id,
            members,
            wasted_or_savable_bytes,
        }
    }

    pub fn validate(&self) -> Result<(), GroupError> {
        if self.members.len() < 2 {
            return Err(GroupError::TooFewMembers(self.title.clone()));
        }
        if !self.contains(self.keeper_id) {
            return Err(GroupError::KeeperNotMember {
                title: self.title.clone(),
                keeper: self.keeper_id,
            });
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    pub fn is_keeper(&self, id: RecordId) -> bool {
        self.keeper_id == id
    }

    pub fn keeper(&self) -> Option<&AudiobookRecord> {
        self.members.iter().find(|m| m.id == self.keeper_id)
    }

    pub fn member(&self, id: RecordId) -> Option<&AudiobookRecord> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn member_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.members.iter().map(|m| m.id)
    }

    /// Every member except the keeper.
    pub fn deletable_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.member_ids().filter(move |id| *id != self.keeper_id)
    }
}

fn distinct_sorted(mut members: Vec<AudiobookRecord>) -> Vec<AudiobookRecord> {
    members.sort_by_key(|m| m.id);
    members.dedup_by_key(|m| m.id);
    members
}

/// Aggregate metrics over one duplicate view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSummary {
    pub mode: EquivalenceMode,
    pub total_groups: usize,
    /// Non-keeper members across all groups.
    pub total_duplicate_files: usize,
    pub total_wasted_or_savable_bytes: u64,
}

impl DuplicateSummary {
    pub fn from_groups(mode: EquivalenceMode, groups: &[DuplicateGroup]) -> Self {
        Self {
            mode,
            total_groups: groups.len(),
            total_duplicate_files: groups.iter().map(|g| g.count() - 1).sum(),
            total_wasted_or_savable_bytes: groups.iter().map(|g| g.wasted_or_savable_bytes).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: i64, size: u64) -> AudiobookRecord {
        AudiobookRecord::new(id, format!("Book {id}"), "Author").with_size(size)
    }

    #[test]
    fn test_from_members_drops_singletons() {
        let group = DuplicateGroup::from_members(
            EquivalenceMode::ExactContent,
            "h",
            vec![rec(1, 10)],
            &KeeperPolicy,
        );
        assert!(group.is_none());
    }

    #[test]
    fn test_from_members_ignores_repeated_ids() {
        let group = DuplicateGroup::from_members(
            EquivalenceMode::ExactContent,
            "h",
            vec![rec(1, 10), rec(1, 10)],
            &KeeperPolicy,
        );
        assert!(group.is_none());
    }

    #[test]
    fn test_wasted_excludes_keeper() {
        let group = DuplicateGroup::from_members(
            EquivalenceMode::ExactContent,
            "h",
            vec![rec(3, 30), rec(1, 10), rec(2, 20)],
            &KeeperPolicy,
        )
        .unwrap();
        assert_eq!(group.keeper_id, RecordId(1));
        assert_eq!(group.wasted_or_savable_bytes, 50);
        assert_eq!(group.member_ids().collect::<Vec<_>>(), vec![RecordId(1), RecordId(2), RecordId(3)]);
        assert_eq!(group.deletable_ids().count(), 2);
        assert_eq!(group.title, "Book 1");
    }

    #[test]
    fn test_with_keeper_rejects_foreign_keeper() {
        let err = DuplicateGroup::with_keeper(
            EquivalenceMode::TitleAuthor,
            "k",
            vec![rec(1, 10), rec(2, 10)],
            RecordId(9),
        )
        .unwrap_err();
        assert!(matches!(err, GroupError::KeeperNotMember { .. }));
    }

    #[test]
    fn test_with_keeper_rejects_repeated_member() {
        let err = DuplicateGroup::with_keeper(
            EquivalenceMode::TitleAuthor,
            "k",
            vec![rec(1, 10), rec(1, 10)],
            RecordId(1),
        )
        .unwrap_err();
        assert_eq!(err, GroupError::DuplicateMember(RecordId(1)));
    }

    #[test]
    fn test_summary_totals() {
        let groups = vec![
            DuplicateGroup::from_members(EquivalenceMode::ExactContent, "a", vec![rec(1, 5), rec(2, 5)], &KeeperPolicy).unwrap(),
            DuplicateGroup::from_members(EquivalenceMode::ExactContent, "b", vec![rec(3, 7), rec(4, 7), rec(5, 7)], &KeeperPolicy).unwrap(),
        ];
        let summary = DuplicateSummary::from_groups(EquivalenceMode::ExactContent, &groups);
        assert_eq!(summary.total_groups, 2);
        assert_eq!(summary.total_duplicate_files, 3);
        assert_eq!(summary.total_wasted_or_savable_bytes, 19);
    }
}
