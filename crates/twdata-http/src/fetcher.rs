//! Cached HTTP fetcher.

use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument, warn};
use twdata_core::{CacheKey, DataError, Destination, HttpRequest, RawCache, Result};

use crate::{charset::Charset, config::FetchConfig, limiter::RateLimiter};

/// Fetches report bodies through a raw cache and a rate limiter.
///
/// A request whose [`CacheKey`] is already cached never touches the network
/// or the limiter. Otherwise the body is fetched, converted to UTF-8 and
/// stored before it is returned.
pub struct Fetcher {
    client: Client,
    cache: Arc<dyn RawCache>,
    limiter: Arc<RateLimiter>,
    primary_charset: Charset,
    secondary_charset: Charset,
    network_calls: AtomicU64,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("limiter", &self.limiter)
            .field("primary_charset", &self.primary_charset)
            .field("secondary_charset", &self.secondary_charset)
            .field("network_calls", &self.network_calls)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    /// Creates a fetcher with its own HTTP client and rate limiter.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &FetchConfig, cache: Arc<dyn RawCache>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| DataError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(
            client,
            config,
            cache,
            Arc::new(RateLimiter::from_config(config)),
        ))
    }

    /// Creates a fetcher from a pre-configured client and a shared limiter.
    #[must_use]
    pub fn with_client(
        client: Client,
        config: &FetchConfig,
        cache: Arc<dyn RawCache>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            client,
            cache,
            limiter,
            primary_charset: config.primary.charset,
            secondary_charset: config.secondary.charset,
            network_calls: AtomicU64::new(0),
        }
    }

    /// The limiter pacing this fetcher.
    #[must_use]
    pub const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The raw cache behind this fetcher.
    #[must_use]
    pub const fn cache(&self) -> &Arc<dyn RawCache> {
        &self.cache
    }

    /// Number of HTTP calls issued so far.
    #[must_use]
    pub fn network_calls(&self) -> u64 {
        self.network_calls.load(Ordering::Relaxed)
    }

    const fn charset(&self, destination: Destination) -> Charset {
        match destination {
            Destination::Primary => self.primary_charset,
            Destination::Secondary => self.secondary_charset,
        }
    }

    /// Returns the UTF-8 body for a request, from cache when possible.
    ///
    /// # Errors
    /// Returns [`DataError::Transport`] on network failure or a non-success
    /// status; nothing is cached in that case.
    #[instrument(skip(self, request), fields(url = %request.url, destination = %request.destination))]
    pub async fn fetch(&self, request: &HttpRequest) -> Result<Vec<u8>> {
        let key = CacheKey::for_request(request);
        if let Some(body) = self.cache.get(&key).await? {
            debug!(key = %key, "Serving from cache");
            return Ok(body);
        }

        self.limiter.throttle(request.destination).await;

        let body = self.send(request).await?;
        let text = self.charset(request.destination).to_utf8(&body);
        let body = text.into_bytes();

        if let Err(e) = self.cache.put(&key, &body).await {
            warn!(key = %key, error = %e, "Failed to cache response");
        }
        Ok(body)
    }

    async fn send(&self, request: &HttpRequest) -> Result<Vec<u8>> {
        self.network_calls.fetch_add(1, Ordering::Relaxed);
        debug!("Sending request");

        let builder = match &request.form {
            Some(form) => self.client.post(&request.url).form(form),
            None => self.client.get(&request.url),
        };
        let response = builder
            .send()
            .await
            .map_err(|e| DataError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Request failed");
            return Err(DataError::Transport(format!(
                "HTTP {} for {}",
                status, request.url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DataError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Removes the cached body for a request. Returns `true` if one existed.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn evict(&self, request: &HttpRequest) -> Result<bool> {
        let key = CacheKey::for_request(request);
        let removed = self.cache.remove(&key).await?;
        if removed {
            debug!(key = %key, "Evicted cached response");
        }
        Ok(removed)
    }

    /// Removes every cached body.
    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear().await
    }
}
