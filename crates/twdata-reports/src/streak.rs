//! Overbought streak evaluation.

use chrono::{Days, NaiveDate};
use std::sync::Arc;
use tracing::{debug, instrument};
use twdata_core::{DataError, Result, StreakResult, VolumeField};

use crate::store::ReportStore;

/// Calendar days added to the window to bound how far back a walk may go.
pub const LOOKBACK_SLACK_DAYS: u64 = 10;

/// Walks back over trading days collecting one security's totals.
///
/// The walk starts at the reference day and stops once `window` values are
/// collected or the cursor reaches `reference - (10 + window)` calendar days.
/// Positive totals are always accepted. The first non-positive total is
/// accepted once; later ones are skipped. A security missing from a report
/// reads as zero.
#[derive(Debug, Clone)]
pub struct StreakEvaluator {
    store: Arc<ReportStore>,
    field: VolumeField,
    reference_day: NaiveDate,
}

impl StreakEvaluator {
    /// Creates an evaluator over a store's `field` totals.
    #[must_use]
    pub const fn new(store: Arc<ReportStore>, field: VolumeField, reference_day: NaiveDate) -> Self {
        Self {
            store,
            field,
            reference_day,
        }
    }

    /// Day walks start from.
    #[must_use]
    pub const fn reference_day(&self) -> NaiveDate {
        self.reference_day
    }

    /// Field whose totals are collected.
    #[must_use]
    pub const fn field(&self) -> VolumeField {
        self.field
    }

    /// The store walks read through.
    #[must_use]
    pub const fn store(&self) -> &Arc<ReportStore> {
        &self.store
    }

    /// Evaluates the most recent `window` trading days for `code`.
    ///
    /// The result is complete only if `window` values were collected; it is
    /// non-increasing only if complete and every value is at least the one
    /// after it.
    ///
    /// # Errors
    /// Transport and format errors from the store. Running out of rollbacks
    /// ends the walk instead of failing it.
    #[instrument(skip(self), fields(kind = %self.store.kind(), field = %self.field, reference = %self.reference_day))]
    pub async fn is_overbought_streak(&self, code: &str, window: usize) -> Result<StreakResult> {
        if window == 0 {
            return Ok(StreakResult::default());
        }

        let floor = self
            .reference_day
            .checked_sub_days(Days::new(
                LOOKBACK_SLACK_DAYS.saturating_add(u64::try_from(window).unwrap_or(u64::MAX)),
            ))
            .unwrap_or(NaiveDate::MIN);
        let calendar = self.store.calendar();

        let mut cursor = Some(self.reference_day);
        let mut inspected = 0usize;
        let mut tolerance = true;
        let mut values = Vec::with_capacity(window.min(64));

        while let Some(day) = cursor {
            if values.len() == window || day <= floor {
                break;
            }
            let report = match self.store.get_data(day).await {
                Ok(report) => report,
                Err(DataError::RollbackExhausted { .. }) => break,
                Err(e) => return Err(e),
            };
            // A rollback may land before the lookback window.
            if report.day <= floor {
                break;
            }
            inspected += 1;

            let value = report.total_for(code, self.field);
            if value > 0 || tolerance {
                if value <= 0 {
                    tolerance = false;
                }
                values.push(value);
            }
            cursor = calendar.previous_open(report.day);
        }

        let complete = values.len() == window;
        let monotone_non_increasing = complete && values.windows(2).all(|w| w[0] >= w[1]);
        debug!(inspected, collected = values.len(), complete, "Streak walk finished");

        Ok(StreakResult {
            complete,
            monotone_non_increasing,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSource;
    use twdata_core::{ReportKind, WeekdayCalendar};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn evaluator(source: FakeSource, reference: NaiveDate) -> (StreakEvaluator, Arc<FakeSource>) {
        let source = Arc::new(source);
        let store = Arc::new(ReportStore::new(
            ReportKind::TwseForeign,
            source.clone(),
            Arc::new(WeekdayCalendar::new()),
        ));
        (
            StreakEvaluator::new(store, VolumeField::Foreign, reference),
            source,
        )
    }

    fn source_with(totals: &[(u32, i64)]) -> FakeSource {
        totals.iter().fold(FakeSource::new(), |source, &(day, total)| {
            source.with_total(d(day), "2330", VolumeField::Foreign, total)
        })
    }

    #[tokio::test]
    async fn test_non_increasing_streak() {
        let (evaluator, _) = evaluator(source_with(&[(10, 50), (9, 30), (8, 10)]), d(10));

        let result = evaluator.is_overbought_streak("2330", 3).await.unwrap();
        assert_eq!(
            result,
            StreakResult {
                complete: true,
                monotone_non_increasing: true,
                values: vec![50, 30, 10],
            }
        );
        assert!(result.is_overbought());
    }

    #[tokio::test]
    async fn test_single_zero_tolerated_but_breaks_monotonicity() {
        let (evaluator, _) = evaluator(source_with(&[(10, 50), (9, 0), (8, 10)]), d(10));

        let result = evaluator.is_overbought_streak("2330", 3).await.unwrap();
        assert!(result.complete);
        assert!(!result.monotone_non_increasing);
        assert_eq!(result.values, vec![50, 0, 10]);
    }

    #[tokio::test]
    async fn test_second_non_positive_skipped() {
        let (evaluator, _) = evaluator(
            source_with(&[(10, 40), (9, -5), (8, 0), (5, 20)]),
            d(10),
        );

        let result = evaluator.is_overbought_streak("2330", 3).await.unwrap();
        assert_eq!(result.values, vec![40, -5, 20]);
        assert!(result.complete);
        assert!(!result.monotone_non_increasing);
    }

    #[tokio::test]
    async fn test_insufficient_window() {
        // Only three days of data exist within the lookback.
        let (evaluator, _) = evaluator(source_with(&[(19, 9), (18, 8), (17, 7)]), d(19));

        let result = evaluator.is_overbought_streak("2330", 5).await.unwrap();
        assert!(!result.complete);
        assert!(!result.monotone_non_increasing);
        assert_eq!(result.values, vec![9, 8, 7]);
    }

    #[tokio::test]
    async fn test_absent_code_reads_as_zero() {
        let source = FakeSource::new()
            .with_total(d(10), "2330", VolumeField::Foreign, 5)
            .with_empty(d(9))
            .with_total(d(8), "2330", VolumeField::Foreign, 3);
        let (evaluator, _) = evaluator(source, d(10));

        let result = evaluator.is_overbought_streak("2330", 3).await.unwrap();
        assert_eq!(result.values, vec![5, 0, 3]);
    }

    #[tokio::test]
    async fn test_walk_continues_before_rolled_back_day() {
        // Jan 10 has no report; it rolls back to Jan 9 and the walk goes on
        // from Jan 8.
        let (evaluator, source) = evaluator(source_with(&[(9, 30), (8, 20)]), d(10));

        let result = evaluator.is_overbought_streak("2330", 2).await.unwrap();
        assert_eq!(result.values, vec![30, 20]);
        assert_eq!(source.loads(), vec![d(10), d(9), d(8)]);
    }

    #[tokio::test]
    async fn test_reference_day_unchanged_between_walks() {
        let (evaluator, source) = evaluator(source_with(&[(10, 3), (9, 2), (8, 1)]), d(10));

        let first = evaluator.is_overbought_streak("2330", 3).await.unwrap();
        let second = evaluator.is_overbought_streak("2330", 3).await.unwrap();

        assert_eq!(evaluator.reference_day(), d(10));
        assert_eq!(first, second);
        // The second walk is served from memory.
        assert_eq!(source.loads().len(), 3);
    }

    #[tokio::test]
    async fn test_rollback_before_lookback_not_counted() {
        // Lookback for Jan 19 with a window of 3 ends at Jan 6. Jan 17 rolls
        // back to Jan 3, which lies outside it.
        let (evaluator, _) = evaluator(source_with(&[(19, 9), (18, 8), (3, 7)]), d(19));

        let result = evaluator.is_overbought_streak("2330", 3).await.unwrap();
        assert!(!result.complete);
        assert!(!result.is_overbought());
        assert_eq!(result.values, vec![9, 8]);
    }

    #[tokio::test]
    async fn test_huge_window() {
        let (evaluator, _) = evaluator(source_with(&[(10, 3)]), d(10));

        let result = evaluator
            .is_overbought_streak("2330", usize::MAX)
            .await
            .unwrap();
        assert!(!result.complete);
        assert_eq!(result.values, vec![3]);
    }

    #[tokio::test]
    async fn test_zero_window() {
        let (evaluator, source) = evaluator(source_with(&[(10, 3)]), d(10));
        let result = evaluator.is_overbought_streak("2330", 0).await.unwrap();
        assert_eq!(result, StreakResult::default());
        assert!(source.loads().is_empty());
    }
}
