mod connection;
mod migrations;
pub(crate) mod schema;

pub use connection::ConnectionPool;
pub use migrations::{Migration, get_applied_versions, run_migrations};
pub use schema::SCHEMA_VERSION;

use std::path::Path;

use tracing::{debug, warn};

use crate::dedup::{DuplicateGroup, DuplicateGrouper, EquivalenceMode};
use crate::deletion::{CatalogStore, DeleteFailure};
use crate::error::{Result, ShelfError};
use crate::models::{AudiobookRecord, HashStats, LibraryStats, NewAudiobook, RecordId};

use super::queries::{HashStatsQuery, LibraryStatsQuery};
use super::repositories::{AudiobookRepository, Repository, SqliteAudiobookRepository};

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

/// The local audiobook catalog.
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = open_database(path)?;
        Ok(Self { pool })
    }

    /// Opens an existing catalog without creating one.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ShelfError::LibraryNotInitialized);
        }
        Self::open(path)
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = open_in_memory()?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    fn audiobooks(&self) -> SqliteAudiobookRepository<'_> {
        SqliteAudiobookRepository::new(self.pool.get_connection())
    }

    /// Runs `f` in one transaction. An error rolls back everything `f` wrote.
    pub fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&SqliteAudiobookRepository<'_>) -> Result<T>,
    {
        let mut conn = self.pool.get_connection();
        let tx = conn.transaction()?;
        let value = f(&SqliteAudiobookRepository::borrowed(&tx))?;
        tx.commit()?;
        Ok(value)
    }

    pub fn insert_audiobook(&self, audiobook: &NewAudiobook) -> Result<RecordId> {
        self.audiobooks().insert(audiobook)
    }

    pub fn get_audiobook(&self, id: RecordId) -> Result<AudiobookRecord> {
        self.audiobooks()
            .find_by_id(&id)?
            .ok_or(ShelfError::RecordNotFound(id))
    }

    pub fn has_file_path(&self, file_path: &str) -> Result<bool> {
        self.audiobooks().exists_path(file_path)
    }

    pub fn list_audiobooks(&self) -> Result<Vec<AudiobookRecord>> {
        self.audiobooks().list_all()
    }

    pub fn list_by_hash(&self, hash: &str) -> Result<Vec<AudiobookRecord>> {
        self.audiobooks().list_by_hash(hash)
    }

    pub fn list_pending_hash(&self, force: bool, limit: Option<usize>) -> Result<Vec<AudiobookRecord>> {
        self.audiobooks().list_pending_hash(force, limit)
    }

    pub fn sample_hashed(&self, size: usize) -> Result<Vec<AudiobookRecord>> {
        self.audiobooks().sample_hashed(size)
    }

    pub fn update_hash(&self, id: RecordId, hash: &str) -> Result<()> {
        self.audiobooks().update_hash(&id, hash)
    }

    pub fn genres(&self, id: RecordId) -> Result<Vec<String>> {
        self.audiobooks().genres(&id)
    }

    pub fn count_audiobooks(&self) -> Result<usize> {
        self.audiobooks().count()
    }

    pub fn hash_stats(&self) -> Result<HashStats> {
        HashStatsQuery::new(self.pool.get_connection()).get_stats()
    }

    pub fn library_stats(&self) -> Result<LibraryStats> {
        LibraryStatsQuery::new(self.pool.get_connection()).get_stats()
    }

    /// Groups the whole catalog under `mode`.
    pub fn duplicate_groups(&self, grouper: &DuplicateGrouper, mode: EquivalenceMode) -> Result<Vec<DuplicateGroup>> {
        let records = self.list_audiobooks()?;
        Ok(grouper.compute_groups(&records, mode))
    }
}

impl CatalogStore for Database {
    fn contains(&self, id: RecordId) -> std::result::Result<bool, DeleteFailure> {
        self.audiobooks()
            .exists(&id)
            .map_err(|e| DeleteFailure::Other(e.to_string()))
    }

    /// Unlinks the file, then drops the rows. A file that is already gone is
    /// not an error.
    fn remove(&self, id: RecordId) -> std::result::Result<(), DeleteFailure> {
        let repo = self.audiobooks();
        let record = repo
            .find_by_id(&id)
            .map_err(|e| DeleteFailure::Other(e.to_string()))?
            .ok_or(DeleteFailure::NotFound)?;

        let mut unlinked = false;
        if !record.file_path.is_empty() {
            match std::fs::remove_file(&record.file_path) {
                Ok(()) => {
                    debug!(%id, path = %record.file_path, "removed file");
                    unlinked = true;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(%id, path = %record.file_path, "file already missing, dropping catalog entry");
                }
                Err(e) => return Err(DeleteFailure::from_io(&e)),
            }
        }

        match repo.delete(&id) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeleteFailure::NotFound),
            Err(e) if unlinked => {
                warn!(%id, path = %record.file_path, error = %e, "file removed but catalog entry kept");
                Err(DeleteFailure::Other(format!(
                    "file {} was removed but its catalog entry was kept: {e}",
                    record.file_path
                )))
            }
            Err(e) => Err(DeleteFailure::Other(e.to_string())),
        }
    }
}
