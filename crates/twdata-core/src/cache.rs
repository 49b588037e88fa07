//! Raw response cache.
//!
//! Responses are stored exactly as received (after charset normalization)
//! under a [`CacheKey`] derived from the request. Entries never expire; they
//! are only removed explicitly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{error::Result, request::HttpRequest};

/// Fingerprint of an outbound request.
///
/// A BLAKE3 digest of the URL and, for form requests, the URL-encoded body,
/// rendered as 64 lowercase hex characters. Identical requests always map to
/// the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprints a URL and optional encoded body.
    #[must_use]
    pub fn from_parts(url: &str, body: Option<&str>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(url.as_bytes());
        if let Some(body) = body {
            hasher.update(&[0]);
            hasher.update(body.as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// Fingerprints an HTTP request.
    #[must_use]
    pub fn for_request(request: &HttpRequest) -> Self {
        Self::from_parts(&request.url, request.encoded_body().as_deref())
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for raw response bodies.
///
/// Implementations must tolerate concurrent `put` calls for the same key;
/// the content for a key is always the same, so the last writer may win.
#[async_trait]
pub trait RawCache: Send + Sync {
    /// Returns the stored bytes, or `Ok(None)` when the key is absent.
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    /// Stores bytes under a key.
    async fn put(&self, key: &CacheKey, body: &[u8]) -> Result<()>;

    /// Removes one entry. Returns `true` if something was removed.
    async fn remove(&self, key: &CacheKey) -> Result<bool>;

    /// Removes every entry.
    async fn clear(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Destination;

    #[test]
    fn test_key_is_deterministic() {
        let a = CacheKey::from_parts("https://www.twse.com.tw/fund/T86", Some("date=20240105"));
        let b = CacheKey::from_parts("https://www.twse.com.tw/fund/T86", Some("date=20240105"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_body_changes_key() {
        let url = "https://www.twse.com.tw/fund/T86";
        let a = CacheKey::from_parts(url, Some("date=20240105"));
        let b = CacheKey::from_parts(url, Some("date=20240104"));
        let c = CacheKey::from_parts(url, None);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_for_request_uses_form() {
        let req = HttpRequest::post(
            "https://www.twse.com.tw/fund/TWT44U",
            Destination::Primary,
            [("response", "csv"), ("date", "20240105")],
        );
        assert_eq!(
            CacheKey::for_request(&req),
            CacheKey::from_parts(&req.url, Some("response=csv&date=20240105"))
        );
    }
}
