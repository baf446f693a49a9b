use std::cmp::Ordering;

use crate::models::{AudiobookRecord, RecordId};

/// Picks the protected member of a duplicate group.
///
/// Highest `edition_count` wins; among equals the lowest id (the first copy
/// imported) wins. The choice depends only on the candidates, never on the
/// order they are supplied in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeeperPolicy;

impl KeeperPolicy {
    /// `Greater` means `a` is the better keeper.
    pub fn compare(&self, a: &AudiobookRecord, b: &AudiobookRecord) -> Ordering {
        a.edition_count
            .cmp(&b.edition_count)
            .then_with(|| b.id.cmp(&a.id))
    }

    pub fn select<'a, I>(&self, candidates: I) -> Option<RecordId>
    where
        I: IntoIterator<Item = &'a AudiobookRecord>,
    {
        candidates
            .into_iter()
            .max_by(|a, b| self.compare(a, b))
            .map(|record| record.id)
    }
}
