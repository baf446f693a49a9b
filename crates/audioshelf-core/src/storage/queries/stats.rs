use rusqlite::Connection;
use std::sync::MutexGuard;

use crate::error::Result;
use crate::models::{HashStats, LibraryStats};
use crate::storage::database::schema;

fn count(conn: &Connection, sql: &str) -> Result<usize> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n.max(0) as usize)
}

pub struct LibraryStatsQuery<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> LibraryStatsQuery<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    pub fn get_stats(&self) -> Result<LibraryStats> {
        let (total, seconds, bytes): (i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_seconds), 0), COALESCE(SUM(file_size_bytes), 0)
             FROM audiobooks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let unique_authors = count(
            &self.conn,
            "SELECT COUNT(DISTINCT author) FROM audiobooks WHERE author != ''",
        )?;
        let unique_narrators = count(
            &self.conn,
            "SELECT COUNT(DISTINCT narrator) FROM audiobooks
             WHERE narrator IS NOT NULL AND narrator != ''",
        )?;

        Ok(LibraryStats {
            total_audiobooks: total.max(0) as usize,
            total_hours: (seconds.max(0) as f64 / 3600.0).round() as u64,
            total_size_bytes: bytes.max(0) as u64,
            unique_authors,
            unique_narrators,
        })
    }
}

pub struct HashStatsQuery<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> HashStatsQuery<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    pub fn get_stats(&self) -> Result<HashStats> {
        let total = count(&self.conn, "SELECT COUNT(*) FROM audiobooks")?;

        if !schema::has_column(&self.conn, "content_hash")? {
            return Ok(HashStats {
                hash_column_exists: false,
                total_audiobooks: total,
                unhashed_count: total,
                ..HashStats::default()
            });
        }

        let hashed = count(
            &self.conn,
            "SELECT COUNT(*) FROM audiobooks WHERE content_hash IS NOT NULL AND content_hash != ''",
        )?;
        let duplicate_groups = count(
            &self.conn,
            "SELECT COUNT(*) FROM (
                SELECT content_hash FROM audiobooks
                WHERE content_hash IS NOT NULL AND content_hash != ''
                GROUP BY content_hash HAVING COUNT(*) > 1
             )",
        )?;

        Ok(HashStats::new(total, hashed, duplicate_groups))
    }
}
