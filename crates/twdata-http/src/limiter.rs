//! Per-destination rate limiter.

use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::trace;
use twdata_core::Destination;

use crate::config::FetchConfig;

#[derive(Debug)]
struct Lane {
    last_visit: Option<Instant>,
    min_interval: Duration,
    max_jitter: Duration,
}

impl Lane {
    const fn new(min_interval: Duration, max_jitter: Duration) -> Self {
        Self {
            last_visit: None,
            min_interval,
            max_jitter,
        }
    }

    fn jitter(&self) -> Duration {
        let max = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_visit {
            let ready_at = last + self.min_interval + self.jitter();
            let now = Instant::now();
            if now < ready_at {
                let remaining = ready_at - now;
                trace!(?remaining, "Rate limiting");
                sleep_until(ready_at).await;
            }
        }
        self.last_visit = Some(Instant::now());
    }
}

/// Paces outbound requests per [`Destination`].
///
/// Each destination has its own lock. A caller holds it while waiting, so
/// requests to one destination are serialized and spaced by at least the
/// minimum interval. Destinations never wait on each other.
#[derive(Debug)]
pub struct RateLimiter {
    primary: Mutex<Lane>,
    secondary: Mutex<Lane>,
}

impl RateLimiter {
    /// Creates a limiter with explicit settings per destination.
    #[must_use]
    pub const fn new(
        primary_interval: Duration,
        primary_jitter: Duration,
        secondary_interval: Duration,
        secondary_jitter: Duration,
    ) -> Self {
        Self {
            primary: Mutex::const_new(Lane::new(primary_interval, primary_jitter)),
            secondary: Mutex::const_new(Lane::new(secondary_interval, secondary_jitter)),
        }
    }

    /// Creates a limiter from fetch settings.
    #[must_use]
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.primary.min_interval(),
            config.primary.max_jitter(),
            config.secondary.min_interval(),
            config.secondary.max_jitter(),
        )
    }

    /// A limiter that never waits.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    const fn lane(&self, destination: Destination) -> &Mutex<Lane> {
        match destination {
            Destination::Primary => &self.primary,
            Destination::Secondary => &self.secondary,
        }
    }

    /// Waits until a request to `destination` may be sent and records it.
    ///
    /// The first request to a destination is never delayed.
    pub async fn throttle(&self, destination: Destination) {
        self.lane(destination).lock().await.wait().await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}
