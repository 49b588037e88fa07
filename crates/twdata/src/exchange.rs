//! One-stop wiring of caches, fetcher, stores and calendar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use twdata_cache::FileCache;
use twdata_core::{
    DataError, Destination, RawCache, ReportKind, ReportRequest, ReportSource, Result,
    TradingCalendar, VolumeField,
};
use twdata_http::{FetchConfig, Fetcher};
use twdata_reports::{
    Endpoints, ExchangeSource, MarginCheck, ReportStore, StoreConfig, StreakEvaluator,
};

use crate::screener::{PriceHistory, Screener, ScreenerConfig};

/// Default on-disk cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".twdata-cache";

/// Settings for an [`Exchange`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Directory for the raw response cache.
    pub cache_dir: PathBuf,
    /// HTTP and pacing settings.
    pub fetch: FetchConfig,
    /// Rollback settings shared by all stores.
    pub store: StoreConfig,
    /// Screening settings.
    pub screener: ScreenerConfig,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            fetch: FetchConfig::default(),
            store: StoreConfig::default(),
            screener: ScreenerConfig::default(),
        }
    }
}

impl ExchangeConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DataError::InvalidParameter(e.to_string()))
    }
}

type StoreKey = (ReportKind, Option<String>);

/// Entry point tying every layer together.
///
/// Stores are created on first use and shared afterwards, so every caller
/// asking for the same kind and filter sees the same memoized days.
pub struct Exchange {
    config: ExchangeConfig,
    source: Arc<ExchangeSource>,
    calendar: Arc<dyn TradingCalendar>,
    stores: Mutex<HashMap<StoreKey, Arc<ReportStore>>>,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stores: Vec<StoreKey> = self
            .stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("Exchange")
            .field("config", &self.config)
            .field("calendar", &self.calendar)
            .field("stores", &stores)
            .finish_non_exhaustive()
    }
}

impl Exchange {
    /// Creates an exchange with a [`FileCache`] in `config.cache_dir`.
    ///
    /// # Errors
    /// Returns an error if the cache directory or HTTP client cannot be
    /// created.
    pub fn new(config: ExchangeConfig, calendar: Arc<dyn TradingCalendar>) -> Result<Self> {
        let cache = Arc::new(FileCache::new(&config.cache_dir)?);
        Self::with_cache(config, calendar, cache)
    }

    /// Creates an exchange over any raw cache.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_cache(
        config: ExchangeConfig,
        calendar: Arc<dyn TradingCalendar>,
        cache: Arc<dyn RawCache>,
    ) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(&config.fetch, cache)?);
        let source = Arc::new(ExchangeSource::new(
            fetcher,
            Endpoints::from_config(&config.fetch),
        ));
        Ok(Self {
            config,
            source,
            calendar,
            stores: Mutex::new(HashMap::new()),
        })
    }

    /// The settings in use.
    #[must_use]
    pub const fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// The fetcher shared by every store.
    #[must_use]
    pub fn fetcher(&self) -> &Arc<Fetcher> {
        self.source.fetcher()
    }

    /// The trading calendar.
    #[must_use]
    pub fn calendar(&self) -> &Arc<dyn TradingCalendar> {
        &self.calendar
    }

    /// Store for a kind with its default filter.
    #[must_use]
    pub fn store(&self, kind: ReportKind) -> Arc<ReportStore> {
        self.store_for(kind, None)
    }

    /// Store for a kind and category filter.
    #[must_use]
    pub fn store_for(&self, kind: ReportKind, filter: Option<&str>) -> Arc<ReportStore> {
        let key = (kind, filter.map(str::to_string));
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        let store = stores.entry(key).or_insert_with(|| {
            debug!(kind = %kind, filter = ?filter, "Creating report store");
            let source: Arc<dyn ReportSource> = self.source.clone();
            let mut store = ReportStore::new(kind, source, Arc::clone(&self.calendar))
                .with_config(self.config.store);
            if let Some(filter) = filter {
                store = store.with_filter(filter);
            }
            Arc::new(store)
        });
        Arc::clone(store)
    }

    /// Streak evaluator over a kind's `field` totals.
    #[must_use]
    pub fn streak(
        &self,
        kind: ReportKind,
        field: VolumeField,
        reference_day: NaiveDate,
    ) -> StreakEvaluator {
        StreakEvaluator::new(self.store(kind), field, reference_day)
    }

    /// Margin/short check over the TWSE margin report.
    ///
    /// # Errors
    /// Never in practice; the store is always of the right kind.
    pub fn margin_check(&self) -> Result<MarginCheck> {
        MarginCheck::new(self.store(ReportKind::TwseMarginShort))
    }

    /// Screener for one market on one day.
    ///
    /// TWSE securities are checked against TWT38U/TWT44U flows and margin
    /// balances; TPEx securities against the TPEx flows, without a margin
    /// check.
    ///
    /// # Errors
    /// Propagates errors building the margin check.
    pub fn screener(
        &self,
        market: Destination,
        day: NaiveDate,
        prices: Arc<dyn PriceHistory>,
    ) -> Result<Screener> {
        let (foreign, trust, margin) = match market {
            Destination::Primary => (
                ReportKind::TwseForeign,
                ReportKind::TwseTrust,
                Some(self.margin_check()?),
            ),
            Destination::Secondary => (ReportKind::TpexForeign, ReportKind::TpexTrust, None),
        };
        Ok(Screener::new(
            self.config.screener,
            day,
            prices,
            self.streak(foreign, VolumeField::Foreign, day),
            self.streak(trust, VolumeField::Trust, day),
            margin,
        ))
    }

    /// Force-evicts the raw response for one request and forgets its
    /// memoized report. Returns `true` if a raw response was evicted.
    pub async fn evict(&self, request: &ReportRequest) -> Result<bool> {
        let store = self
            .stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(request.kind, request.filter.clone()))
            .cloned();
        if let Some(store) = store {
            store.forget(request.day).await;
        }
        self.source.evict(request).await
    }

    /// Removes every raw response and every memoized report.
    ///
    /// Stores stay registered, so evaluators and screeners created earlier
    /// see the cleared state too.
    pub async fn clear_cache(&self) -> Result<()> {
        let stores: Vec<Arc<ReportStore>> = self
            .stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for store in stores {
            store.clear().await;
        }
        self.fetcher().clear_cache().await
    }
}
