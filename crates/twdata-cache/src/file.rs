//! File-per-key cache implementation.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};
use twdata_core::{CacheKey, DataError, RawCache, Result};

/// Directory name used under the system temp dir when the preferred
/// directory is unusable.
pub const FALLBACK_DIR_NAME: &str = ".twdata-cache";

/// Cache storing each entry as a file named by its key.
///
/// Entries are written to a temporary sibling file and renamed into place,
/// so concurrent writers for one key never expose a partial file.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Opens a cache rooted at `dir`, creating it if needed.
    ///
    /// If `dir` cannot be created or written to, falls back to
    /// `<temp dir>/.twdata-cache` and logs a warning.
    ///
    /// # Errors
    /// Returns an error if neither directory is usable.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        match ensure_writable(dir) {
            Ok(()) => Ok(Self {
                dir: dir.to_path_buf(),
            }),
            Err(e) => {
                let fallback = std::env::temp_dir().join(FALLBACK_DIR_NAME);
                warn!(
                    dir = %dir.display(),
                    fallback = %fallback.display(),
                    error = %e,
                    "Cache directory unusable, using fallback"
                );
                ensure_writable(&fallback).map_err(|e| DataError::Cache(e.to_string()))?;
                Ok(Self { dir: fallback })
            }
        }
    }

    /// Directory holding the entries.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for a key.
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    fn temp_path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir
            .join(format!(".{}.{:016x}.tmp", key.as_str(), rand::random::<u64>()))
    }
}

/// Creates `dir` and checks that a file can be written in it.
fn ensure_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let check = dir.join(format!(".write-check.{:016x}", rand::random::<u64>()));
    std::fs::write(&check, b"")?;
    std::fs::remove_file(&check)
}

#[async_trait]
impl RawCache for FileCache {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(body) => {
                debug!(bytes = body.len(), "Cache hit");
                Ok(Some(body))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cache miss");
                Ok(None)
            }
            Err(e) => Err(DataError::Cache(e.to_string())),
        }
    }

    #[instrument(skip(self, body), fields(key = %key, bytes = body.len()))]
    async fn put(&self, key: &CacheKey, body: &[u8]) -> Result<()> {
        let tmp = self.temp_path_for(key);
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| DataError::Cache(e.to_string()))?;
        if let Err(e) = tokio::fs::rename(&tmp, self.path_for(key)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(DataError::Cache(e.to_string()));
        }
        debug!("Cached response");
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!("Removed cache entry");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DataError::Cache(e.to_string())),
        }
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(DataError::Cache(e.to_string())),
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DataError::Cache(e.to_string()))?;
        debug!("Cleared all cache entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_file_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache")).unwrap();
        let key = CacheKey::from_parts("https://www.twse.com.tw/fund/T86", Some("date=20240105"));

        assert!(cache.get(&key).await.unwrap().is_none());

        cache.put(&key, "證券代號,證券名稱".as_bytes()).await.unwrap();
        assert!(cache.path_for(&key).exists());
        assert_eq!(
            cache.get(&key).await.unwrap().as_deref(),
            Some("證券代號,證券名稱".as_bytes())
        );
    }

    #[tokio::test]
    async fn test_file_cache_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        let key = CacheKey::from_parts("https://example.com/a", None);

        assert!(!cache.remove(&key).await.unwrap());
        cache.put(&key, b"body").await.unwrap();
        assert!(cache.remove(&key).await.unwrap());
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_cache_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("c")).unwrap();
        let a = CacheKey::from_parts("https://example.com/a", None);
        let b = CacheKey::from_parts("https://example.com/b", None);
        cache.put(&a, b"a").await.unwrap();
        cache.put(&b, b"b").await.unwrap();

        cache.clear().await.unwrap();

        assert!(cache.dir().exists());
        assert!(cache.get(&a).await.unwrap().is_none());
        assert!(cache.get(&b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_cache_falls_back_when_dir_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let cache = FileCache::new(blocker.join("cache")).unwrap();
        assert_eq!(cache.dir(), std::env::temp_dir().join(FALLBACK_DIR_NAME));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_cache_falls_back_when_dir_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users can write anyway; nothing to check then.
        let writable = std::fs::write(locked.join("x"), b"").is_ok();
        let cache = FileCache::new(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        if writable {
            return;
        }

        assert_eq!(cache.dir(), std::env::temp_dir().join(FALLBACK_DIR_NAME));
    }

    #[tokio::test]
    async fn test_file_cache_leaves_no_write_check_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        assert_eq!(cache.dir(), dir.path());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_puts_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileCache::new(dir.path()).unwrap());
        let key = CacheKey::from_parts("https://example.com/same", None);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                tokio::spawn(async move { cache.put(&key, b"identical").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            cache.get(&key).await.unwrap().as_deref(),
            Some(&b"identical"[..])
        );
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }
}
