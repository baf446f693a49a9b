use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 2;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audiobooks (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            title            TEXT NOT NULL,
            author           TEXT NOT NULL DEFAULT '',
            narrator         TEXT,
            format           TEXT NOT NULL DEFAULT 'other',
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            file_size_bytes  INTEGER NOT NULL DEFAULT 0,
            file_path        TEXT NOT NULL,
            edition_count    INTEGER NOT NULL DEFAULT 1,
            supplement_count INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audiobook_genres (
            audiobook_id INTEGER NOT NULL REFERENCES audiobooks(id) ON DELETE CASCADE,
            genre        TEXT NOT NULL,
            PRIMARY KEY (audiobook_id, genre)
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_audiobooks_title     ON audiobooks(title);
        CREATE INDEX IF NOT EXISTS idx_audiobooks_author    ON audiobooks(author);
        CREATE INDEX IF NOT EXISTS idx_audiobooks_file_path ON audiobooks(file_path);
        ",
    )?;
    Ok(())
}

/// Whether `audiobooks` has a column named `column`.
pub fn has_column(conn: &Connection, column: &str) -> Result<bool> {
    let exists = conn
        .prepare("SELECT 1 FROM pragma_table_info('audiobooks') WHERE name = ?1")?
        .exists(rusqlite::params![column])?;
    Ok(exists)
}
