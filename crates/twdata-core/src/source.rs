//! Report source trait.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::Result, request::ReportRequest, types::Report};

/// Loads decoded reports.
///
/// `load` returns [`DataError::NoDataForDay`](crate::DataError::NoDataForDay)
/// when the requested day has no report, and
/// [`DataError::FormatMismatch`](crate::DataError::FormatMismatch) when the
/// content cannot be trusted.
#[async_trait]
pub trait ReportSource: Send + Sync + Debug {
    /// Returns the name of this source.
    fn name(&self) -> &str;

    /// Loads the report for a request.
    async fn load(&self, request: &ReportRequest) -> Result<Report>;

    /// Drops any stored raw response for a request so the next `load`
    /// fetches it again. Returns `true` if something was removed.
    async fn evict(&self, request: &ReportRequest) -> Result<bool>;
}
