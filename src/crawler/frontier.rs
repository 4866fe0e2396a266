//! Per-pass crawl frontier kept in the engine's working directory
//!
//! The frontier database holds every URL seen during a pass and the queue of
//! URLs still to visit. It is cleared when a pass starts and deleted with the
//! working directory on reset.

use crate::storage::StorageResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use url::Url;

pub const FRONTIER_DB: &str = "frontier.db";

const FRONTIER_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS seen (
    url TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL
);

DELETE FROM seen;
DELETE FROM queue;
"#;

pub struct FrontierState {
    conn: Connection,
    path: PathBuf,
}

impl FrontierState {
    /// Opens the frontier in `working_dir`, creating the directory if needed,
    /// and clears any state left by an earlier pass
    pub fn open(working_dir: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(working_dir)?;
        let path = working_dir.join(FRONTIER_DB);
        let conn = Connection::open(&path)?;
        conn.execute_batch(FRONTIER_SQL)?;
        Ok(Self { conn, path })
    }

    /// Records `url` as seen; returns false if it was already seen
    pub fn mark_seen(&mut self, url: &Url) -> StorageResult<bool> {
        let inserted = self
            .conn
            .execute("INSERT OR IGNORE INTO seen (url) VALUES (?1)", params![url.as_str()])?;
        Ok(inserted == 1)
    }

    pub fn push(&mut self, url: &Url, depth: u32) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO queue (url, depth) VALUES (?1, ?2)",
            params![url.as_str(), depth],
        )?;
        Ok(())
    }

    /// Removes and returns the oldest queued URL
    pub fn pop(&mut self) -> StorageResult<Option<(Url, u32)>> {
        let next: Option<(i64, String, u32)> = self
            .conn
            .query_row(
                "SELECT id, url, depth FROM queue ORDER BY id ASC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((id, url, depth)) = next else {
            return Ok(None);
        };
        self.conn
            .execute("DELETE FROM queue WHERE id = ?1", params![id])?;

        match Url::parse(&url) {
            Ok(url) => Ok(Some((url, depth))),
            Err(e) => {
                tracing::warn!("Dropping unparseable frontier entry {}: {}", url, e);
                self.pop()
            }
        }
    }

    pub fn queued(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
