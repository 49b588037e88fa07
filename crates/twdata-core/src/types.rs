//! Decoded report types.
//!
//! - [`VolumeField`] - Which buy/sell column group a value belongs to
//! - [`BuySellVolume`] - Buy, sell and total share counts
//! - [`Record`] - One security's row in a report
//! - [`Report`] - All records of one report kind on one day
//! - [`StreakResult`] - Outcome of a streak evaluation

use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::{
    error::{DataError, Result},
    request::ReportKind,
};

/// A buy/sell column group in a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeField {
    /// Margin purchases.
    Margin,
    /// Short sales.
    Short,
    /// Foreign investors.
    Foreign,
    /// Investment trusts.
    Trust,
    /// Dealers trading on their own account.
    DealerSelf,
    /// Dealers hedging.
    DealerHedge,
    /// Dealers combined.
    Dealer,
    /// Trading value in NT dollars rather than shares.
    Amount,
}

impl VolumeField {
    /// Column prefix used in data frames.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Margin => "margin",
            Self::Short => "short",
            Self::Foreign => "foreign",
            Self::Trust => "trust",
            Self::DealerSelf => "dealer_self",
            Self::DealerHedge => "dealer_hedge",
            Self::Dealer => "dealer",
            Self::Amount => "amount",
        }
    }
}

impl fmt::Display for VolumeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buy, sell and total share counts.
///
/// `total` is either transmitted by the exchange or derived from buy and
/// sell, depending on the report kind and field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuySellVolume {
    /// Shares bought.
    pub buy: i64,
    /// Shares sold.
    pub sell: i64,
    /// Net figure.
    pub total: i64,
}

impl BuySellVolume {
    /// Creates a volume triple.
    #[must_use]
    pub const fn new(buy: i64, sell: i64, total: i64) -> Self {
        Self { buy, sell, total }
    }
}

/// One security's row in a report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Security code (e.g. "2330").
    pub code: String,
    /// Display name.
    pub name: String,
    /// Volumes by column group.
    pub volumes: BTreeMap<VolumeField, BuySellVolume>,
    /// Net difference column, when the report carries one.
    pub net: Option<i64>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds a volume group.
    #[must_use]
    pub fn with_volume(mut self, field: VolumeField, volume: BuySellVolume) -> Self {
        self.volumes.insert(field, volume);
        self
    }

    /// Volume for a field, if the report carries it.
    #[must_use]
    pub fn volume(&self, field: VolumeField) -> Option<BuySellVolume> {
        self.volumes.get(&field).copied()
    }

    /// Total for a field, zero when absent.
    #[must_use]
    pub fn total(&self, field: VolumeField) -> i64 {
        self.volume(field).map_or(0, |v| v.total)
    }
}

/// All records of one report kind on one day.
///
/// A code missing from `records` means the security had no reported activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Report kind.
    pub kind: ReportKind,
    /// Day the report covers.
    pub day: NaiveDate,
    /// Records keyed by security code.
    pub records: HashMap<String, Record>,
}

impl Report {
    /// Creates an empty report.
    #[must_use]
    pub fn new(kind: ReportKind, day: NaiveDate) -> Self {
        Self {
            kind,
            day,
            records: HashMap::new(),
        }
    }

    /// Inserts a record, replacing any earlier row with the same code.
    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.code.clone(), record);
    }

    /// Looks up a security.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Record> {
        self.records.get(code)
    }

    /// Total for a security and field; zero when the security is absent.
    #[must_use]
    pub fn total_for(&self, code: &str, field: VolumeField) -> i64 {
        self.get(code).map_or(0, |r| r.total(field))
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the report has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Converts the report into a DataFrame sorted by code.
    ///
    /// Columns: `code`, `name`, then `<field>_buy`, `<field>_sell` and
    /// `<field>_total` for every field present in any record, and `net` when
    /// the report carries it. Missing values are zero.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut rows: Vec<&Record> = self.records.values().collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));

        let mut fields: Vec<VolumeField> = rows
            .iter()
            .flat_map(|r| r.volumes.keys().copied())
            .collect();
        fields.sort();
        fields.dedup();

        let mut columns = vec![
            Column::new(
                "code".into(),
                rows.iter().map(|r| r.code.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                "name".into(),
                rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            ),
        ];

        for field in fields {
            let volumes: Vec<BuySellVolume> = rows
                .iter()
                .map(|r| r.volume(field).unwrap_or_default())
                .collect();
            columns.push(Column::new(
                format!("{field}_buy").into(),
                volumes.iter().map(|v| v.buy).collect::<Vec<_>>(),
            ));
            columns.push(Column::new(
                format!("{field}_sell").into(),
                volumes.iter().map(|v| v.sell).collect::<Vec<_>>(),
            ));
            columns.push(Column::new(
                format!("{field}_total").into(),
                volumes.iter().map(|v| v.total).collect::<Vec<_>>(),
            ));
        }

        if rows.iter().any(|r| r.net.is_some()) {
            columns.push(Column::new(
                "net".into(),
                rows.iter().map(|r| r.net.unwrap_or(0)).collect::<Vec<_>>(),
            ));
        }

        DataFrame::new(columns).map_err(|e| DataError::Other(e.to_string()))
    }
}

/// Outcome of a streak evaluation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakResult {
    /// Whether the full window of values was collected.
    pub complete: bool,
    /// Whether every value is at least the one after it. Only meaningful
    /// when `complete`; `false` otherwise.
    pub monotone_non_increasing: bool,
    /// Accepted values, most recent day first.
    pub values: Vec<i64>,
}

impl StreakResult {
    /// A streak is overbought when it is complete and non-increasing.
    #[must_use]
    pub const fn is_overbought(&self) -> bool {
        self.complete && self.monotone_non_increasing
    }
}
