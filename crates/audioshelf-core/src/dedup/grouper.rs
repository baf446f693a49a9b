use std::collections::{HashMap, HashSet};

use super::{DuplicateGroup, EquivalenceMode, KeeperPolicy};
use crate::models::AudiobookRecord;

/// Partitions records into duplicate groups.
#[derive(Debug, Clone, Default)]
pub struct DuplicateGrouper {
    policy: KeeperPolicy,
}

impl DuplicateGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups `records` under `mode`. Only groups with two or more members
    /// are returned, ordered by savable bytes (desc), then title.
    pub fn compute_groups(
        &self,
        records: &[AudiobookRecord],
        mode: EquivalenceMode,
    ) -> Vec<DuplicateGroup> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, record) in records.iter().enumerate() {
            if !seen.insert(record.id) {
                continue;
            }
            if let Some(key) = equivalence_key(record, mode) {
                buckets.entry(key).or_default().push(idx);
            }
        }

        let mut groups: Vec<DuplicateGroup> = buckets
            .into_iter()
            .filter(|(_, indexes)| indexes.len() > 1)
            .filter_map(|(key, indexes)| {
                let members = indexes.into_iter().map(|idx| records[idx].clone()).collect();
                DuplicateGroup::from_members(mode, key, members, &self.policy)
            })
            .collect();

        sort_groups_deterministically(&mut groups);
        groups
    }
}

/// Convenience wrapper using the default keeper policy.
pub fn compute_groups(records: &[AudiobookRecord], mode: EquivalenceMode) -> Vec<DuplicateGroup> {
    DuplicateGrouper::new().compute_groups(records, mode)
}

/// Bucket key for `record`, or `None` when it can never be a duplicate.
pub fn equivalence_key(record: &AudiobookRecord, mode: EquivalenceMode) -> Option<String> {
    match mode {
        EquivalenceMode::ExactContent => record
            .content_hash
            .as_deref()
            .map(str::trim)
            .filter(|hash| !hash.is_empty())
            .map(str::to_ascii_lowercase),
        EquivalenceMode::TitleAuthor => {
            let title = normalize_text(&record.title);
            if title.is_empty() {
                return None;
            }
            let author = normalize_text(&record.author);
            Some(format!("{title}\u{1f}{author}"))
        }
    }
}

/// Lowercases, replaces punctuation with spaces and collapses whitespace.
pub fn normalize_text(text: &str) -> String {
    let lowercase = text.to_lowercase();
    let cleaned: String = lowercase
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn sort_groups_deterministically(groups: &mut [DuplicateGroup]) {
    groups.sort_by(|a, b| {
        b.wasted_or_savable_bytes
            .cmp(&a.wasted_or_savable_bytes)
            .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
            .then_with(|| a.keeper_id.cmp(&b.keeper_id))
    });
}
