//! Margin and short balance check.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use twdata_core::{DataError, ReportKind, Result, VolumeField};

use crate::store::ReportStore;

/// Margin and short totals of one security on one day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginVerdict {
    /// Day the totals come from, after any rollback.
    pub day: NaiveDate,
    /// Margin purchases minus sales.
    pub margin_total: i64,
    /// Short sales minus covers.
    pub short_total: i64,
}

impl MarginVerdict {
    /// Both margin buying and short selling grew on the day.
    #[must_use]
    pub const fn is_overbought(&self) -> bool {
        self.margin_total > 0 && self.short_total > 0
    }
}

/// Reads margin/short totals from a [`ReportKind::TwseMarginShort`] store.
#[derive(Debug, Clone)]
pub struct MarginCheck {
    store: Arc<ReportStore>,
}

impl MarginCheck {
    /// Wraps a margin/short store.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] for a store of another kind.
    pub fn new(store: Arc<ReportStore>) -> Result<Self> {
        if store.kind() != ReportKind::TwseMarginShort {
            return Err(DataError::InvalidParameter(format!(
                "margin check needs a {} store, got {}",
                ReportKind::TwseMarginShort,
                store.kind()
            )));
        }
        Ok(Self { store })
    }

    /// Totals for `code` on `day`, or the closest earlier trading day.
    pub async fn check(&self, code: &str, day: NaiveDate) -> Result<MarginVerdict> {
        let report = self.store.get_data(day).await?;
        Ok(MarginVerdict {
            day: report.day,
            margin_total: report.total_for(code, VolumeField::Margin),
            short_total: report.total_for(code, VolumeField::Short),
        })
    }
}
