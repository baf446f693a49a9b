use std::ops::Deref;
use std::sync::MutexGuard;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{AudioFormat, AudiobookRecord, NewAudiobook, RecordId};

use super::Repository;

const RECORD_COLUMNS: &str = "id, title, author, narrator, format, duration_seconds, file_size_bytes,
     file_path, content_hash, edition_count, supplement_count";

pub trait AudiobookRepository: Repository<Entity = AudiobookRecord, Id = RecordId> {
    fn insert(&self, audiobook: &NewAudiobook) -> Result<RecordId>;
    fn exists(&self, id: &RecordId) -> Result<bool>;
    fn exists_path(&self, file_path: &str) -> Result<bool>;
    fn count(&self) -> Result<usize>;
    fn list_all(&self) -> Result<Vec<AudiobookRecord>>;
    fn list_by_hash(&self, hash: &str) -> Result<Vec<AudiobookRecord>>;
    fn list_pending_hash(&self, force: bool, limit: Option<usize>) -> Result<Vec<AudiobookRecord>>;
    fn sample_hashed(&self, size: usize) -> Result<Vec<AudiobookRecord>>;
    fn update_hash(&self, id: &RecordId, hash: &str) -> Result<()>;
    fn genres(&self, id: &RecordId) -> Result<Vec<String>>;
    fn clear(&self) -> Result<usize>;
}

enum Conn<'a> {
    Locked(MutexGuard<'a, Connection>),
    /// Usually an open transaction.
    Borrowed(&'a Connection),
}

impl Deref for Conn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Conn::Locked(guard) => &**guard,
            Conn::Borrowed(conn) => *conn,
        }
    }
}

pub struct SqliteAudiobookRepository<'a> {
    conn: Conn<'a>,
}

impl<'a> SqliteAudiobookRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn: Conn::Locked(conn) }
    }

    pub fn borrowed(conn: &'a Connection) -> Self {
        Self { conn: Conn::Borrowed(conn) }
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<AudiobookRecord> {
        let format: String = row.get(4)?;
        Ok(AudiobookRecord {
            id: RecordId(row.get(0)?),
            title: row.get(1)?,
            author: row.get(2)?,
            narrator: row.get(3)?,
            format: AudioFormat::from_extension(&format),
            duration_seconds: row.get::<_, i64>(5)?.max(0) as u64,
            file_size_bytes: row.get::<_, i64>(6)?.max(0) as u64,
            file_path: row.get(7)?,
            content_hash: row.get(8)?,
            edition_count: row.get::<_, i64>(9)?.max(0) as u32,
            supplement_count: row.get::<_, i64>(10)?.max(0) as u32,
        })
    }

    fn query_records(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<AudiobookRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(params, Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl<'a> Repository for SqliteAudiobookRepository<'a> {
    type Entity = AudiobookRecord;
    type Id = RecordId;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM audiobooks WHERE id = ?1"),
                params![id.0],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        self.conn
            .execute("DELETE FROM audiobook_genres WHERE audiobook_id = ?1", params![id.0])?;
        let affected = self
            .conn
            .execute("DELETE FROM audiobooks WHERE id = ?1", params![id.0])?;
        Ok(affected > 0)
    }
}

impl<'a> AudiobookRepository for SqliteAudiobookRepository<'a> {
    fn insert(&self, audiobook: &NewAudiobook) -> Result<RecordId> {
        self.conn.execute(
            "INSERT INTO audiobooks
                (title, author, narrator, format, duration_seconds, file_size_bytes,
                 file_path, content_hash, edition_count, supplement_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                audiobook.title,
                audiobook.author,
                audiobook.narrator,
                audiobook.format.to_string(),
                audiobook.duration_seconds as i64,
                audiobook.file_size_bytes as i64,
                audiobook.file_path,
                audiobook.content_hash,
                audiobook.edition_count,
                audiobook.supplement_count,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = RecordId(self.conn.last_insert_rowid());

        let mut stmt = self
            .conn
            .prepare("INSERT OR IGNORE INTO audiobook_genres (audiobook_id, genre) VALUES (?1, ?2)")?;
        for genre in audiobook.genres.iter().map(|g| g.trim()).filter(|g| !g.is_empty()) {
            stmt.execute(params![id.0, genre])?;
        }
        Ok(id)
    }

    fn exists(&self, id: &RecordId) -> Result<bool> {
        let exists = self
            .conn
            .prepare("SELECT 1 FROM audiobooks WHERE id = ?1")?
            .exists(params![id.0])?;
        Ok(exists)
    }

    fn exists_path(&self, file_path: &str) -> Result<bool> {
        let exists = self
            .conn
            .prepare("SELECT 1 FROM audiobooks WHERE file_path = ?1")?
            .exists(params![file_path])?;
        Ok(exists)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audiobooks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn list_all(&self) -> Result<Vec<AudiobookRecord>> {
        self.query_records(&format!("SELECT {RECORD_COLUMNS} FROM audiobooks ORDER BY id"), [])
    }

    fn list_by_hash(&self, hash: &str) -> Result<Vec<AudiobookRecord>> {
        self.query_records(
            &format!("SELECT {RECORD_COLUMNS} FROM audiobooks WHERE content_hash = ?1 ORDER BY id"),
            params![hash],
        )
    }

    /// Records still to hash, smallest files first. With `force`, every record.
    fn list_pending_hash(&self, force: bool, limit: Option<usize>) -> Result<Vec<AudiobookRecord>> {
        let filter = if force {
            ""
        } else {
            "WHERE content_hash IS NULL OR content_hash = ''"
        };
        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM audiobooks {filter}
                 ORDER BY file_size_bytes ASC, id ASC LIMIT ?1"
            ),
            params![limit],
        )
    }

    fn sample_hashed(&self, size: usize) -> Result<Vec<AudiobookRecord>> {
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM audiobooks
                 WHERE content_hash IS NOT NULL AND content_hash != ''
                 ORDER BY RANDOM() LIMIT ?1"
            ),
            params![size as i64],
        )
    }

    fn update_hash(&self, id: &RecordId, hash: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE audiobooks SET content_hash = ?1, hash_verified_at = ?2 WHERE id = ?3",
            params![hash, Utc::now().to_rfc3339(), id.0],
        )?;
        Ok(())
    }

    fn genres(&self, id: &RecordId) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT genre FROM audiobook_genres WHERE audiobook_id = ?1 ORDER BY genre")?;
        let genres = stmt
            .query_map(params![id.0], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(genres)
    }

    fn clear(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM audiobook_genres", [])?;
        let removed = self.conn.execute("DELETE FROM audiobooks", [])?;
        Ok(removed)
    }
}
