//! Concurrent screening of securities against check rules.
//!
//! Rules run one after another. Within a rule, every security is checked
//! concurrently (bounded by [`ScreenerConfig::concurrency`]) under a
//! per-task deadline, and the batch finishes before the next rule starts.
//! Results are collected and sorted by code; a failing security is logged
//! and reported, never fatal to the batch.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use twdata_core::{DataError, Result, StreakResult};
use twdata_reports::{MarginCheck, StreakEvaluator};

/// Daily range percentage at or above which a security counts as moving.
pub const DEFAULT_MIN_RANGE_PERCENT: f64 = 3.5;

/// Settings for a [`Screener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    /// Securities checked at the same time.
    pub concurrency: usize,
    /// Deadline for one security's check.
    pub task_timeout_ms: u64,
    /// Moving average length in trading days.
    pub ma_days: usize,
    /// Streak window in trading days.
    pub streak_days: usize,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            task_timeout_ms: 120_000,
            ma_days: 3,
            streak_days: 3,
        }
    }
}

impl ScreenerConfig {
    /// Per-task deadline as a duration.
    #[must_use]
    pub const fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

/// Closing price data for one security on one day.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Closing price.
    pub close: f64,
    /// Day's price range (high minus low).
    pub change: f64,
    /// Moving average of closes over the requested days.
    pub moving_average: f64,
}

impl PriceSnapshot {
    /// Range as a percentage of the close; zero without a close.
    #[must_use]
    pub fn range_percent(&self) -> f64 {
        if self.close == 0.0 {
            0.0
        } else {
            self.change / self.close * 100.0
        }
    }
}

/// Source of daily price data.
#[async_trait]
pub trait PriceHistory: Send + Sync + Debug {
    /// Snapshot for `code` on `day` with a `ma_days` moving average.
    async fn snapshot(&self, code: &str, day: NaiveDate, ma_days: usize) -> Result<PriceSnapshot>;
}

/// Outcome of one rule for one security.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVerdict {
    /// Whether the security passed.
    pub passed: bool,
    /// Values the verdict was based on, most recent first.
    pub values: Vec<i64>,
}

impl From<StreakResult> for RuleVerdict {
    fn from(streak: StreakResult) -> Self {
        Self {
            passed: streak.is_overbought(),
            values: streak.values,
        }
    }
}

/// A check applied to one security at a time.
#[async_trait]
pub trait CheckRule: Send + Sync + Debug {
    /// Name used in logs and outcomes.
    fn name(&self) -> &str;

    /// Checks one security.
    async fn check(&self, code: &str) -> Result<RuleVerdict>;
}

/// Passes when a flow streak is complete and non-increasing.
#[derive(Debug, Clone)]
pub struct StreakRule {
    name: String,
    evaluator: StreakEvaluator,
    window: usize,
}

impl StreakRule {
    /// Creates a rule over an evaluator and window.
    #[must_use]
    pub fn new(name: impl Into<String>, evaluator: StreakEvaluator, window: usize) -> Self {
        Self {
            name: name.into(),
            evaluator,
            window,
        }
    }
}

#[async_trait]
impl CheckRule for StreakRule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, code: &str) -> Result<RuleVerdict> {
        Ok(self
            .evaluator
            .is_overbought_streak(code, self.window)
            .await?
            .into())
    }
}

/// Passes when both margin buying and short selling grew on the day.
#[derive(Debug, Clone)]
pub struct MarginRule {
    check: MarginCheck,
    day: NaiveDate,
}

impl MarginRule {
    /// Creates a rule for one day.
    #[must_use]
    pub const fn new(check: MarginCheck, day: NaiveDate) -> Self {
        Self { check, day }
    }
}

#[async_trait]
impl CheckRule for MarginRule {
    fn name(&self) -> &str {
        "margin"
    }

    async fn check(&self, code: &str) -> Result<RuleVerdict> {
        let verdict = self.check.check(code, self.day).await?;
        Ok(RuleVerdict {
            passed: verdict.is_overbought(),
            values: vec![verdict.margin_total, verdict.short_total],
        })
    }
}

/// One rule's result for one security.
#[derive(Debug)]
pub struct RuleOutcome {
    /// Rule name.
    pub rule: String,
    /// Security code.
    pub code: String,
    /// Verdict, or why none was reached.
    pub verdict: Result<RuleVerdict>,
}

/// One screened security.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenRow {
    /// Security code.
    pub code: String,
    /// Day's range as a percentage of the close.
    pub daily_range_percent: f64,
    /// Closing price.
    pub close_price: f64,
    /// Moving average of closes.
    pub moving_average: f64,
    /// Moving average length.
    pub ma_days: usize,
    /// Close above the moving average.
    pub is_above_moving_average: bool,
    /// Foreign buying streak.
    pub is_foreign_overbought: bool,
    /// Investment trust buying streak.
    pub is_trust_overbought: bool,
    /// Margin and short balances both grew.
    pub is_margin_overbought: bool,
    /// Foreign totals, most recent first.
    pub foreign_values: Vec<i64>,
    /// Trust totals, most recent first.
    pub trust_values: Vec<i64>,
}

/// Which rows [`Screener::screen`] keeps. The default keeps everything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenFilter {
    /// Minimum daily range percentage.
    pub min_range_percent: Option<f64>,
    /// Close must be above the moving average.
    pub require_above_ma: bool,
    /// Foreign streak required.
    pub require_foreign: bool,
    /// Trust streak required.
    pub require_trust: bool,
    /// Margin condition required.
    pub require_margin: bool,
}

impl ScreenFilter {
    /// Whether a row passes.
    #[must_use]
    pub fn matches(&self, row: &ScreenRow) -> bool {
        self.min_range_percent
            .is_none_or(|min| row.daily_range_percent >= min)
            && (!self.require_above_ma || row.is_above_moving_average)
            && (!self.require_foreign || row.is_foreign_overbought)
            && (!self.require_trust || row.is_trust_overbought)
            && (!self.require_margin || row.is_margin_overbought)
    }
}

/// Screens securities of one market on one day.
#[derive(Debug, Clone)]
pub struct Screener {
    config: ScreenerConfig,
    day: NaiveDate,
    prices: Arc<dyn PriceHistory>,
    foreign: StreakEvaluator,
    trust: StreakEvaluator,
    margin: Option<MarginCheck>,
}

impl Screener {
    /// Creates a screener. Without a margin check, the margin flag is
    /// always `false`.
    #[must_use]
    pub fn new(
        config: ScreenerConfig,
        day: NaiveDate,
        prices: Arc<dyn PriceHistory>,
        foreign: StreakEvaluator,
        trust: StreakEvaluator,
        margin: Option<MarginCheck>,
    ) -> Self {
        Self {
            config,
            day,
            prices,
            foreign,
            trust,
            margin,
        }
    }

    /// Day being screened.
    #[must_use]
    pub const fn day(&self) -> NaiveDate {
        self.day
    }

    /// The built-in rules: foreign streak, trust streak and, when
    /// available, the margin condition.
    #[must_use]
    pub fn default_rules(&self) -> Vec<Arc<dyn CheckRule>> {
        let window = self.config.streak_days;
        let mut rules: Vec<Arc<dyn CheckRule>> = vec![
            Arc::new(StreakRule::new("foreign", self.foreign.clone(), window)),
            Arc::new(StreakRule::new("trust", self.trust.clone(), window)),
        ];
        if let Some(margin) = &self.margin {
            rules.push(Arc::new(MarginRule::new(margin.clone(), self.day)));
        }
        rules
    }

    /// Runs each rule over every code, one rule batch at a time.
    ///
    /// Outcomes are grouped by rule in the given order and sorted by code
    /// within a rule.
    pub async fn run_rules(
        &self,
        rules: &[Arc<dyn CheckRule>],
        codes: &[String],
    ) -> Vec<RuleOutcome> {
        let mut outcomes = Vec::with_capacity(rules.len() * codes.len());
        for rule in rules {
            debug!(rule = rule.name(), securities = codes.len(), "Running rule batch");
            let mut batch: Vec<RuleOutcome> = stream::iter(codes)
                .map(|code| {
                    let rule = Arc::clone(rule);
                    async move {
                        let verdict = self.with_deadline(code, rule.check(code)).await;
                        if let Err(e) = &verdict {
                            warn!(rule = rule.name(), code = %code, error = %e, "Check failed");
                        }
                        RuleOutcome {
                            rule: rule.name().to_string(),
                            code: code.clone(),
                            verdict,
                        }
                    }
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;
            batch.sort_by(|a, b| a.code.cmp(&b.code));
            outcomes.extend(batch);
        }
        outcomes
    }

    async fn with_deadline<T>(
        &self,
        code: &str,
        task: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.task_timeout(), task).await {
            Ok(result) => result,
            Err(_) => Err(DataError::Timeout(format!(
                "{code} after {:?}",
                self.config.task_timeout()
            ))),
        }
    }

    async fn row(&self, code: &str) -> Result<ScreenRow> {
        let ma_days = self.config.ma_days;
        let window = self.config.streak_days;

        let snapshot = self.prices.snapshot(code, self.day, ma_days).await?;
        let foreign = self.foreign.is_overbought_streak(code, window).await?;
        let trust = self.trust.is_overbought_streak(code, window).await?;
        let is_margin_overbought = match &self.margin {
            Some(margin) => margin.check(code, self.day).await?.is_overbought(),
            None => false,
        };

        Ok(ScreenRow {
            code: code.to_string(),
            daily_range_percent: snapshot.range_percent(),
            close_price: snapshot.close,
            moving_average: snapshot.moving_average,
            ma_days,
            is_above_moving_average: snapshot.close > snapshot.moving_average,
            is_foreign_overbought: foreign.is_overbought(),
            is_trust_overbought: trust.is_overbought(),
            is_margin_overbought,
            foreign_values: foreign.values,
            trust_values: trust.values,
        })
    }

    /// Builds a row per code, keeps the rows passing `filter`, sorted by
    /// code. Securities whose data cannot be loaded are logged and skipped.
    pub async fn screen(&self, codes: &[String], filter: &ScreenFilter) -> Vec<ScreenRow> {
        let mut rows: Vec<ScreenRow> = stream::iter(codes)
            .map(|code| async move {
                match self.with_deadline(code, self.row(code)).await {
                    Ok(row) => Some(row),
                    Err(e) => {
                        warn!(code = %code, error = %e, "Skipping security");
                        None
                    }
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .filter_map(|row| async move { row.filter(|row| filter.matches(row)) })
            .collect()
            .await;
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        rows
    }
}
