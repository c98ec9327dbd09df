//! SQLite-backed cache

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};

use super::LocalCache;
use crate::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv_cache (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

/// Key-value cache stored in a single `SQLite` table.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    /// Open an in-memory cache (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        // WAL is unavailable for in-memory databases
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalCache for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM kv_cache WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn().execute(
            "INSERT INTO kv_cache (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM kv_cache WHERE key = ?", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_get_remove() {
        let cache = SqliteCache::open_in_memory().unwrap();
        assert_eq!(cache.get("owners").unwrap(), None);

        cache.set("owners", "[]").unwrap();
        cache.set("owners", "[1]").unwrap();
        assert_eq!(cache.get("owners").unwrap().as_deref(), Some("[1]"));

        cache.remove("owners").unwrap();
        assert_eq!(cache.get("owners").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("cache.db");

        {
            let cache = SqliteCache::open(&path).unwrap();
            cache.set("lioreStoryOwners", "[{\"id\":\"a\"}]").unwrap();
        }

        let reopened = SqliteCache::open(&path).unwrap();
        assert_eq!(
            reopened.get("lioreStoryOwners").unwrap().as_deref(),
            Some("[{\"id\":\"a\"}]")
        );
    }
}
