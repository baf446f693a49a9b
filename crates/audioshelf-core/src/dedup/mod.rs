//! Duplicate detection: equivalence modes, keeper selection and grouping.

mod group;
mod grouper;
mod keeper;
mod mode;

pub use group::{DuplicateGroup, DuplicateSummary, GroupError};
pub use grouper::{
    DuplicateGrouper, compute_groups, equivalence_key, normalize_text,
    sort_groups_deterministically,
};
pub use keeper::KeeperPolicy;
pub use mode::EquivalenceMode;
