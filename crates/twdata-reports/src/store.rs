//! Day-indexed report memoization with trading-day rollback.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};
use twdata_core::{
    DataError, Report, ReportKind, ReportRequest, ReportSource, Result, TradingCalendar,
    exchange_day,
};

/// Settings for a [`ReportStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of rollbacks to earlier trading days per lookup.
    pub max_rollback: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_rollback: 12 }
    }
}

#[derive(Debug, Default)]
struct Days {
    reports: HashMap<NaiveDate, Arc<Report>>,
    /// Days without a report, mapped to the day that was served instead.
    rolled_back: HashMap<NaiveDate, NaiveDate>,
}

impl Days {
    fn lookup(&self, day: NaiveDate) -> Option<Arc<Report>> {
        let served = self.rolled_back.get(&day).copied().unwrap_or(day);
        self.reports.get(&served).cloned()
    }
}

/// Memoizes decoded reports of one kind by day.
///
/// [`get_data`](Self::get_data) serves a day from memory when it can. When
/// the source reports that a day has no data, the raw response is evicted
/// and the lookup moves to the previous trading day, up to
/// [`StoreConfig::max_rollback`] times. The report is stored under the day
/// it actually covers; the skipped days remember where they resolved to.
///
/// Reads run concurrently. Loads are serialized, so each day is decoded at
/// most once.
pub struct ReportStore {
    kind: ReportKind,
    filter: Option<String>,
    source: Arc<dyn ReportSource>,
    calendar: Arc<dyn TradingCalendar>,
    max_rollback: usize,
    days: RwLock<Days>,
    load_lock: Mutex<()>,
}

impl std::fmt::Debug for ReportStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportStore")
            .field("kind", &self.kind)
            .field("filter", &self.filter)
            .field("source", &self.source.name())
            .field("calendar", &self.calendar)
            .field("max_rollback", &self.max_rollback)
            .finish_non_exhaustive()
    }
}

impl ReportStore {
    /// Creates a store for one report kind.
    #[must_use]
    pub fn new(
        kind: ReportKind,
        source: Arc<dyn ReportSource>,
        calendar: Arc<dyn TradingCalendar>,
    ) -> Self {
        Self {
            kind,
            filter: None,
            source,
            calendar,
            max_rollback: StoreConfig::default().max_rollback,
            days: RwLock::new(Days::default()),
            load_lock: Mutex::new(()),
        }
    }

    /// Sets the category filter sent with every request.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Applies store settings.
    #[must_use]
    pub const fn with_config(mut self, config: StoreConfig) -> Self {
        self.max_rollback = config.max_rollback;
        self
    }

    /// Report kind served by this store.
    #[must_use]
    pub const fn kind(&self) -> ReportKind {
        self.kind
    }

    /// Calendar used for rollback.
    #[must_use]
    pub fn calendar(&self) -> &Arc<dyn TradingCalendar> {
        &self.calendar
    }

    fn request(&self, day: NaiveDate) -> ReportRequest {
        ReportRequest {
            kind: self.kind,
            day,
            filter: self.filter.clone(),
        }
    }

    /// Report for an instant, taken as its calendar day in Taipei.
    pub async fn get_at(&self, instant: DateTime<Utc>) -> Result<Arc<Report>> {
        self.get_data(exchange_day(instant)).await
    }

    /// Report for `day`, or for the closest earlier trading day that has one.
    ///
    /// The returned report's `day` tells which day was served.
    ///
    /// # Errors
    /// - Transport and format errors from the source, unchanged.
    /// - [`DataError::RollbackExhausted`] when no report turned up within the
    ///   rollback limit.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn get_data(&self, day: NaiveDate) -> Result<Arc<Report>> {
        let requested = day;
        let mut day = day;
        let mut skipped = Vec::new();

        loop {
            let cached = self.days.read().await.lookup(day);
            if let Some(report) = cached {
                self.remember_rollback(&skipped, &report).await;
                return Ok(report);
            }

            let _load = self.load_lock.lock().await;
            let cached = self.days.read().await.lookup(day);
            if let Some(report) = cached {
                self.remember_rollback(&skipped, &report).await;
                return Ok(report);
            }

            let request = self.request(day);
            match self.source.load(&request).await {
                Ok(report) => {
                    let report = Arc::new(report);
                    let mut days = self.days.write().await;
                    days.reports.insert(day, Arc::clone(&report));
                    for &skipped_day in &skipped {
                        days.rolled_back.insert(skipped_day, day);
                    }
                    debug!(day = %day, records = report.len(), "Stored report");
                    return Ok(report);
                }
                Err(DataError::NoDataForDay { .. }) => {
                    if let Err(e) = self.source.evict(&request).await {
                        warn!(day = %day, error = %e, "Failed to evict empty response");
                    }
                    skipped.push(day);

                    let previous = if skipped.len() > self.max_rollback {
                        None
                    } else {
                        self.calendar.previous_open(day)
                    };
                    let Some(previous) = previous else {
                        return Err(DataError::RollbackExhausted {
                            kind: self.kind,
                            requested,
                            last_tried: day,
                            attempts: skipped.len() - 1,
                        });
                    };
                    debug!(from = %day, to = %previous, "No data, rolling back");
                    day = previous;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn remember_rollback(&self, skipped: &[NaiveDate], report: &Report) {
        if skipped.is_empty() {
            return;
        }
        let mut days = self.days.write().await;
        for &day in skipped {
            days.rolled_back.insert(day, report.day);
        }
    }

    /// Days with a stored report, ascending.
    pub async fn cached_days(&self) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = self.days.read().await.reports.keys().copied().collect();
        days.sort();
        days
    }

    /// Drops the memoized report for a day and any rollback that resolved
    /// to it or from it. Returns `true` if anything was dropped.
    pub async fn forget(&self, day: NaiveDate) -> bool {
        let mut days = self.days.write().await;
        let removed = days.reports.remove(&day).is_some();
        let before = days.rolled_back.len();
        days.rolled_back.retain(|from, to| *from != day && *to != day);
        removed || days.rolled_back.len() != before
    }

    /// Drops every memoized report and rollback.
    pub async fn clear(&self) {
        let mut days = self.days.write().await;
        days.reports.clear();
        days.rolled_back.clear();
    }

    /// Forgets a day and evicts its raw response, so the next lookup fetches
    /// it again. Returns `true` if a raw response was evicted.
    pub async fn evict(&self, day: NaiveDate) -> Result<bool> {
        self.forget(day).await;
        self.source.evict(&self.request(day)).await
    }
}
