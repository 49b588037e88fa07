//! SQLite-based cache implementation.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, instrument};
use twdata_core::{CacheKey, DataError, RawCache, Result};

/// SQLite-based raw response cache.
///
/// Stores every entry as a blob row in a single database file, which is
/// easier to ship around than a directory of files.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Create a new SQLite cache at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| DataError::Cache(e.to_string()))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory SQLite cache.
    ///
    /// Useful for testing; data is lost when the cache is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DataError::Cache(e.to_string()))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS raw_cache (
                key TEXT PRIMARY KEY,
                body BLOB NOT NULL,
                cached_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl RawCache for SqliteCache {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        let body: Option<Vec<u8>> = conn
            .query_row(
                "SELECT body FROM raw_cache WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        if body.is_some() {
            debug!("Cache hit");
        } else {
            debug!("Cache miss");
        }
        Ok(body)
    }

    #[instrument(skip(self, body), fields(key = %key, bytes = body.len()))]
    async fn put(&self, key: &CacheKey, body: &[u8]) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO raw_cache (key, body, cached_at) VALUES (?1, ?2, ?3)",
            params![key.as_str(), body, Utc::now().to_rfc3339()],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;

        debug!("Cached response");
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        let removed = conn
            .execute("DELETE FROM raw_cache WHERE key = ?1", params![key.as_str()])
            .map_err(|e| DataError::Cache(e.to_string()))?;
        Ok(removed > 0)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        conn.execute("DELETE FROM raw_cache", [])
            .map_err(|e| DataError::Cache(e.to_string()))?;

        debug!("Cleared all cache entries");
        Ok(())
    }
}
