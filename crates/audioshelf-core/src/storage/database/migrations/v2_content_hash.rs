use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema;

pub struct V2ContentHash;

impl Migration for V2ContentHash {
    fn version(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Add content_hash and hash_verified_at columns to audiobooks"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        if !schema::has_column(conn, "content_hash")? {
            conn.execute_batch(
                "
                ALTER TABLE audiobooks ADD COLUMN content_hash TEXT;
                ALTER TABLE audiobooks ADD COLUMN hash_verified_at TEXT;
                CREATE INDEX IF NOT EXISTS idx_audiobooks_content_hash ON audiobooks(content_hash);
                ",
            )?;
        }
        Ok(())
    }
}
