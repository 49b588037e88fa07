//! No-op cache implementation.

use async_trait::async_trait;
use tracing::trace;
use twdata_core::{CacheKey, RawCache, Result};

/// A no-op cache that doesn't store anything.
///
/// `get` always returns `Ok(None)`, so every request goes to the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RawCache for NoopCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>> {
        trace!("NoopCache: get called, returning None");
        Ok(None)
    }

    async fn put(&self, _key: &CacheKey, _body: &[u8]) -> Result<()> {
        trace!("NoopCache: put called, doing nothing");
        Ok(())
    }

    async fn remove(&self, _key: &CacheKey) -> Result<bool> {
        trace!("NoopCache: remove called, returning false");
        Ok(false)
    }

    async fn clear(&self) -> Result<()> {
        trace!("NoopCache: clear called, doing nothing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_cache_stores_nothing() {
        let cache = NoopCache::new();
        let key = CacheKey::from_parts("https://example.com/a", None);

        assert!(cache.put(&key, b"body").await.is_ok());
        assert!(cache.get(&key).await.unwrap().is_none());
        assert!(!cache.remove(&key).await.unwrap());
        assert!(cache.clear().await.is_ok());
    }
}
