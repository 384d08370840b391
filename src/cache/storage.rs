//! SQLite-backed durable store
//!
//! One row per durable key. An optional byte budget makes the store report
//! `CapacityExceeded` the way a quota-limited browser store would.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::store::DurableStore;
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

const DB_FILE: &str = "cache.db";

type Result<T> = std::result::Result<T, CacheError>;

/// SQLite-backed key-value store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    max_bytes: Option<usize>,
}

impl SqliteStore {
    /// Get the cache directory path (~/.cache/sensiscan on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("sensiscan"))
    }

    /// Open the store inside a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join(DB_FILE);
        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path)?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                store_key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: db_path,
            max_bytes: None,
        })
    }

    /// Cap the total stored bytes (keys + values).
    pub fn with_max_bytes(mut self, max_bytes: Option<usize>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Path of the SQLite database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;

        let (entries, total_size, oldest, newest): (i64, i64, Option<i64>, Option<i64>) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0), MIN(updated_at), MAX(updated_at)
                 FROM kv_entries",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )?;

        Ok(StoreStats {
            total_entries: entries as usize,
            total_size_bytes: total_size as usize,
            oldest_entry: oldest,
            newest_entry: newest,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Io("cache connection lock poisoned".to_string()))
    }

    /// Nuke the cache database
    fn nuke(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        Ok(())
    }
}

impl DurableStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM kv_entries WHERE store_key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        let size = key.len() + value.len();

        if let Some(max) = self.max_bytes {
            let used: i64 = conn.query_row(
                "SELECT COALESCE(SUM(size_bytes), 0) FROM kv_entries WHERE store_key != ?1",
                [key],
                |r| r.get(0),
            )?;
            if used as usize + size > max {
                return Err(CacheError::CapacityExceeded);
            }
        }

        conn.execute(
            "INSERT OR REPLACE INTO kv_entries (store_key, value, size_bytes, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, value, size as i64, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM kv_entries WHERE store_key = ?1", [key])?;
        Ok(deleted > 0)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT store_key FROM kv_entries
             WHERE substr(store_key, 1, length(?1)) = ?1
             ORDER BY store_key",
        )?;
        let keys = stmt
            .query_map([prefix], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

/// Statistics about the durable store
#[derive(Debug)]
pub struct StoreStats {
    pub total_entries: usize,
    pub total_size_bytes: usize,
    pub oldest_entry: Option<i64>,
    pub newest_entry: Option<i64>,
}
