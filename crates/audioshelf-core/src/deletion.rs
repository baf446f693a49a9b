//! Safe batch deletion of duplicate records.
//!
//! A deletion round never removes a group's keeper and never leaves a group
//! without at least one live member. Requests that would break either rule
//! are reported as blocked rather than failed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dedup::{DuplicateGroup, KeeperPolicy};
use crate::models::{AudiobookRecord, RecordId};
use crate::units::format_size;

/// Why a single record could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum DeleteFailure {
    #[error("record not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("{0}")]
    Other(String),
}

impl DeleteFailure {
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::Permission(err.to_string()),
            std::io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Why a requested record was protected from deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The record is its group's keeper.
    Keeper,
    /// Deleting it would leave its group without any remaining copy.
    LastCopy,
    /// The record is not a member of any duplicate group in the view.
    NotInGroup,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Keeper => "protected keeper",
            Self::LastCopy => "last remaining copy",
            Self::NotInGroup => "not a known duplicate",
        };
        f.write_str(s)
    }
}

/// Storage the coordinator deletes from.
pub trait CatalogStore {
    /// Whether the record still exists.
    fn contains(&self, id: RecordId) -> Result<bool, DeleteFailure>;

    /// Removes the record and its file.
    fn remove(&self, id: RecordId) -> Result<(), DeleteFailure>;
}

impl<S: CatalogStore + ?Sized> CatalogStore for &S {
    fn contains(&self, id: RecordId) -> Result<bool, DeleteFailure> {
        (**self).contains(id)
    }

    fn remove(&self, id: RecordId) -> Result<(), DeleteFailure> {
        (**self).remove(id)
    }
}

/// Outcome of the safety check, before anything is deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionPlan {
    pub to_delete: BTreeSet<RecordId>,
    pub blocked: BTreeMap<RecordId, BlockReason>,
}

impl DeletionPlan {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty()
    }
}

/// Result of one deletion round. Every requested id lands in exactly one of
/// `deleted`, `blocked` or `failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    pub deleted: BTreeSet<RecordId>,
    pub blocked: BTreeMap<RecordId, BlockReason>,
    pub failed: BTreeMap<RecordId, DeleteFailure>,
    #[serde(default)]
    pub freed_bytes: u64,
}

impl DeletionReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Union of the three buckets.
    pub fn requested(&self) -> BTreeSet<RecordId> {
        self.deleted
            .iter()
            .chain(self.blocked.keys())
            .chain(self.failed.keys())
            .copied()
            .collect()
    }

    /// True when the buckets are pairwise disjoint and cover `requested`.
    pub fn is_partition_of(&self, requested: &BTreeSet<RecordId>) -> bool {
        let total = self.deleted.len() + self.blocked.len() + self.failed.len();
        let union = self.requested();
        union.len() == total && &union == requested
    }

    pub fn is_partial_failure(&self) -> bool {
        !self.failed.is_empty() && !self.deleted.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "Deleted {} file(s), freed {}",
            self.deleted_count(),
            format_size(self.freed_bytes)
        );
        if !self.blocked.is_empty() {
            out.push_str(&format!("; {} protected from deletion", self.blocked_count()));
        }
        if !self.failed.is_empty() {
            out.push_str(&format!("; {} failed", self.failed_count()));
        }
        out
    }
}

/// Validates and executes deletion requests against a [`CatalogStore`].
pub struct DeletionCoordinator<S> {
    store: S,
    policy: KeeperPolicy,
}

impl<S: CatalogStore> DeletionCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: KeeperPolicy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decides which requested ids may be deleted, without deleting anything.
    pub fn plan(&self, requested: &BTreeSet<RecordId>, groups: &[DuplicateGroup]) -> DeletionPlan {
        let mut membership: HashMap<RecordId, usize> = HashMap::new();
        for (idx, group) in groups.iter().enumerate() {
            for id in group.member_ids() {
                membership.entry(id).or_insert(idx);
            }
        }

        let mut plan = DeletionPlan::default();
        let mut candidates: BTreeMap<usize, Vec<RecordId>> = BTreeMap::new();

        for id in requested {
            match membership.get(id) {
                None => {
                    plan.blocked.insert(*id, BlockReason::NotInGroup);
                }
                Some(&idx) if groups[idx].is_keeper(*id) => {
                    plan.blocked.insert(*id, BlockReason::Keeper);
                }
                Some(&idx) => candidates.entry(idx).or_default().push(*id),
            }
        }

        for (idx, ids) in candidates {
            let group = &groups[idx];
            let survivors = group
                .member_ids()
                .filter(|id| !ids.contains(id))
                .filter(|id| self.is_live(*id))
                .count();

            let mut ids = ids;
            if survivors == 0 {
                let live: Vec<&AudiobookRecord> = ids
                    .iter()
                    .filter_map(|id| group.member(*id))
                    .filter(|member| self.is_live(member.id))
                    .collect();
                if let Some(protected) = self.policy.select(live) {
                    debug!(group = %group.title, id = %protected, "protecting last remaining copy");
                    plan.blocked.insert(protected, BlockReason::LastCopy);
                    ids.retain(|id| *id != protected);
                }
            }
            plan.to_delete.extend(ids);
        }

        plan
    }

    /// Runs one deletion round. Each allowed id is deleted independently; a
    /// failure never stops the remaining deletions.
    pub fn execute(&self, requested: &BTreeSet<RecordId>, groups: &[DuplicateGroup]) -> DeletionReport {
        let plan = self.plan(requested, groups);
        let sizes: HashMap<RecordId, u64> = groups
            .iter()
            .flat_map(|g| g.members.iter())
            .map(|m| (m.id, m.file_size_bytes))
            .collect();

        let mut report = DeletionReport {
            blocked: plan.blocked,
            ..DeletionReport::default()
        };

        for id in plan.to_delete {
            match self.store.remove(id) {
                Ok(()) => {
                    report.freed_bytes += sizes.get(&id).copied().unwrap_or(0);
                    report.deleted.insert(id);
                }
                Err(failure) => {
                    warn!(%id, error = %failure, "failed to delete duplicate");
                    report.failed.insert(id, failure);
                }
            }
        }

        for (id, reason) in &report.blocked {
            warn!(%id, %reason, "deletion blocked");
        }
        info!(
            deleted = report.deleted_count(),
            blocked = report.blocked_count(),
            failed = report.failed_count(),
            "deletion round finished"
        );
        debug_assert!(report.is_partition_of(requested));
        report
    }

    fn is_live(&self, id: RecordId) -> bool {
        // An unreadable record is not counted as a surviving copy.
        self.store.contains(id).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{EquivalenceMode, compute_groups};
    use std::cell::RefCell;

    #[derive(Default)]
    struct MemoryStore {
        live: RefCell<BTreeSet<RecordId>>,
        failing: BTreeMap<RecordId, DeleteFailure>,
    }

    impl MemoryStore {
        fn with(ids: &[i64]) -> Self {
            Self {
                live: RefCell::new(ids.iter().map(|id| RecordId(*id)).collect()),
                failing: BTreeMap::new(),
            }
        }
    }

    impl CatalogStore for MemoryStore {
        fn contains(&self, id: RecordId) -> Result<bool, DeleteFailure> {
            Ok(self.live.borrow().contains(&id))
        }

        fn remove(&self, id: RecordId) -> Result<(), DeleteFailure> {
            if let Some(failure) = self.failing.get(&id) {
                return Err(failure.clone());
            }
            if self.live.borrow_mut().remove(&id) {
                Ok(())
            } else {
                Err(DeleteFailure::NotFound)
            }
        }
    }

    fn record(id: i64, hash: &str, editions: u32) -> AudiobookRecord {
        AudiobookRecord::new(id, "Dune", "Frank Herbert")
            .with_hash(hash)
            .with_editions(editions)
            .with_size(100)
    }

    fn ids(values: &[i64]) -> BTreeSet<RecordId> {
        values.iter().map(|v| RecordId(*v)).collect()
    }

    #[test]
    fn test_keeper_in_request_is_blocked() {
        let groups = compute_groups(
            &[record(1, "A", 1), record(2, "A", 2)],
            EquivalenceMode::ExactContent,
        );
        assert_eq!(groups[0].keeper_id, RecordId(2));

        let coordinator = DeletionCoordinator::new(MemoryStore::with(&[1, 2]));
        let requested = ids(&[1, 2]);
        let report = coordinator.execute(&requested, &groups);

        assert_eq!(report.deleted, ids(&[1]));
        assert_eq!(report.blocked.get(&RecordId(2)), Some(&BlockReason::Keeper));
        assert!(report.failed.is_empty());
        assert!(report.is_partition_of(&requested));
        assert_eq!(report.freed_bytes, 100);
        // group ends with exactly its keeper
        assert_eq!(*coordinator.store().live.borrow(), ids(&[2]));
    }

    #[test]
    fn test_stale_view_never_empties_group() {
        let groups = compute_groups(
            &[record(2, "A", 2), record(3, "A", 1)],
            EquivalenceMode::ExactContent,
        );
        assert_eq!(groups[0].keeper_id, RecordId(2));

        // keeper 2 was removed out-of-band; only 3 remains
        let coordinator = DeletionCoordinator::new(MemoryStore::with(&[3]));
        let requested = ids(&[3]);
        let report = coordinator.execute(&requested, &groups);

        assert!(report.deleted.is_empty());
        assert_eq!(report.blocked.get(&RecordId(3)), Some(&BlockReason::LastCopy));
        assert!(coordinator.store().live.borrow().contains(&RecordId(3)));
        assert!(report.is_partition_of(&requested));
    }

    #[test]
    fn test_last_copy_protection_prefers_policy_choice() {
        let groups = compute_groups(
            &[record(1, "A", 3), record(4, "A", 1), record(5, "A", 2)],
            EquivalenceMode::ExactContent,
        );
        // keeper 1 gone; 4 and 5 requested
        let coordinator = DeletionCoordinator::new(MemoryStore::with(&[4, 5]));
        let report = coordinator.execute(&ids(&[4, 5]), &groups);

        assert_eq!(report.blocked.get(&RecordId(5)), Some(&BlockReason::LastCopy));
        assert_eq!(report.deleted, ids(&[4]));
    }

    #[test]
    fn test_unknown_ids_are_blocked() {
        let groups = compute_groups(
            &[record(1, "A", 1), record(2, "A", 1)],
            EquivalenceMode::ExactContent,
        );
        let coordinator = DeletionCoordinator::new(MemoryStore::with(&[1, 2, 77]));
        let report = coordinator.execute(&ids(&[77]), &groups);
        assert_eq!(report.blocked.get(&RecordId(77)), Some(&BlockReason::NotInGroup));
        assert!(coordinator.store().live.borrow().contains(&RecordId(77)));
    }

    #[test]
    fn test_partial_failure_continues() {
        let groups = compute_groups(
            &[record(1, "A", 1), record(2, "A", 1), record(3, "A", 1), record(4, "A", 1)],
            EquivalenceMode::ExactContent,
        );
        let mut store = MemoryStore::with(&[1, 2, 3]);
        store
            .failing
            .insert(RecordId(2), DeleteFailure::Permission("read-only volume".into()));
        let coordinator = DeletionCoordinator::new(store);

        let requested = ids(&[2, 3, 4]);
        let report = coordinator.execute(&requested, &groups);

        assert_eq!(report.deleted, ids(&[3]));
        assert!(matches!(report.failed.get(&RecordId(2)), Some(DeleteFailure::Permission(_))));
        assert_eq!(report.failed.get(&RecordId(4)), Some(&DeleteFailure::NotFound));
        assert!(report.is_partial_failure());
        assert!(report.is_partition_of(&requested));
        assert!(report.summary().contains("2 failed"));
    }

    #[test]
    fn test_plan_does_not_touch_store() {
        let groups = compute_groups(
            &[record(1, "A", 1), record(2, "A", 1), record(3, "A", 1)],
            EquivalenceMode::ExactContent,
        );
        let coordinator = DeletionCoordinator::new(MemoryStore::with(&[1, 2, 3]));
        let plan = coordinator.plan(&ids(&[1, 2, 3]), &groups);

        assert_eq!(plan.to_delete, ids(&[2, 3]));
        assert_eq!(plan.blocked.get(&RecordId(1)), Some(&BlockReason::Keeper));
        assert_eq!(coordinator.store().live.borrow().len(), 3);
    }

    #[test]
    fn test_partition_law_over_many_requests() {
        let records: Vec<AudiobookRecord> = (1..=30)
            .map(|id| record(id, &format!("h{}", id % 5), (id % 3) as u32))
            .collect();
        let groups = compute_groups(&records, EquivalenceMode::ExactContent);

        for mask in [0b1010_1010u64, 0xFFFF_FFFF, 0b1, 0x5555_5555] {
            let requested: BTreeSet<RecordId> = (1..=32)
                .filter(|bit| mask & (1u64 << *bit) != 0)
                .map(RecordId)
                .collect();
            let live: Vec<i64> = (1..=30).filter(|id| id % 4 != 0).collect();
            let coordinator = DeletionCoordinator::new(MemoryStore::with(&live));
            let report = coordinator.execute(&requested, &groups);

            assert!(report.is_partition_of(&requested));
            for group in &groups {
                let group_had_live = group.member_ids().any(|id| live.contains(&id.0));
                let remaining = group
                    .member_ids()
                    .filter(|id| coordinator.store().live.borrow().contains(id))
                    .count();
                if group_had_live {
                    assert!(remaining >= 1, "group {} was emptied", group.key);
                }
            }
        }
    }
}
