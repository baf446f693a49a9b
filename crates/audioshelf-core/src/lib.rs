pub mod config;
pub mod dedup;
pub mod deletion;
pub mod error;
pub mod hashing;
pub mod import;
pub mod models;
pub mod review;
pub mod selection;
pub mod storage;
pub mod units;

pub use config::AppConfig;
pub use error::{ExitCode, Result, ShelfError};
pub use models::*;

pub use dedup::{
    DuplicateGroup, DuplicateGrouper, DuplicateSummary, EquivalenceMode, GroupError, KeeperPolicy,
    compute_groups,
};
pub use deletion::{
    BlockReason, CatalogStore, DeleteFailure, DeletionCoordinator, DeletionPlan, DeletionReport,
};
pub use hashing::{HashGenerator, HashRunOptions, HashRunReport, VerifyReport, sha256_file};
pub use import::{ImportOptions, ImportReport, import_file};
pub use review::{LoadError, Notice, NoticeLevel, ReviewCommand, ReviewEffect, ReviewSession, ViewStatus};
pub use selection::{SelectionError, SelectionTracker};
pub use storage::database::{ConnectionPool, Database, open_database, open_in_memory};
pub use storage::queries::{HashStatsQuery, LibraryStatsQuery};
pub use storage::repositories::{AudiobookRepository, Repository, SqliteAudiobookRepository};
pub use units::format_size;
