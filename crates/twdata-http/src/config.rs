//! Fetch configuration.
//!
//! All durations are in milliseconds so the config reads naturally as JSON:
//!
//! ```json
//! {
//!   "primary": { "min_interval_ms": 5000, "max_jitter_ms": 1000 },
//!   "timeout_ms": 30000
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use twdata_core::{DataError, Destination, Result};

use crate::charset::Charset;

/// Default TWSE base URL.
pub const TWSE_BASE_URL: &str = "https://www.twse.com.tw/";
/// Default TPEx base URL.
pub const TPEX_BASE_URL: &str = "https://www.tpex.org.tw/";

/// Settings for one destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Base URL report paths are joined onto. Must end with `/`.
    pub base_url: String,
    /// Minimum time between two requests.
    pub min_interval_ms: u64,
    /// Upper bound (exclusive) of the random delay added to each wait.
    pub max_jitter_ms: u64,
    /// Charset responses are served in.
    pub charset: Charset,
}

impl DestinationConfig {
    /// TWSE defaults: 5 s between requests plus up to 999 ms jitter.
    #[must_use]
    pub fn twse() -> Self {
        Self {
            base_url: TWSE_BASE_URL.to_string(),
            min_interval_ms: 5_000,
            max_jitter_ms: 1_000,
            charset: Charset::Big5,
        }
    }

    /// TPEx defaults: no pacing.
    #[must_use]
    pub fn tpex() -> Self {
        Self {
            base_url: TPEX_BASE_URL.to_string(),
            min_interval_ms: 0,
            max_jitter_ms: 0,
            charset: Charset::Big5,
        }
    }

    /// Minimum interval as a duration.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Maximum jitter as a duration.
    #[must_use]
    pub const fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self::twse()
    }
}

/// Settings for the [`Fetcher`](crate::Fetcher).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Taiwan Stock Exchange.
    pub primary: DestinationConfig,
    /// Taipei Exchange.
    pub secondary: DestinationConfig,
    /// Overall timeout of one HTTP call.
    pub timeout_ms: u64,
    /// Timeout for establishing a connection.
    pub connect_timeout_ms: u64,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            primary: DestinationConfig::twse(),
            secondary: DestinationConfig::tpex(),
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            user_agent: concat!("twdata/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DataError::InvalidParameter(e.to_string()))
    }

    /// Settings for a destination.
    #[must_use]
    pub const fn destination(&self, destination: Destination) -> &DestinationConfig {
        match destination {
            Destination::Primary => &self.primary,
            Destination::Secondary => &self.secondary,
        }
    }

    /// Overall timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Connect timeout as a duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Points both destinations at one base URL and disables pacing.
    ///
    /// Used against local mock servers.
    #[must_use]
    pub fn unthrottled(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let dest = |charset| DestinationConfig {
            base_url: base_url.clone(),
            min_interval_ms: 0,
            max_jitter_ms: 0,
            charset,
        };
        Self {
            primary: dest(Charset::Utf8),
            secondary: dest(Charset::Utf8),
            ..Self::default()
        }
    }
}
