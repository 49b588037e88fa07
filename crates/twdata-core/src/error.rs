//! Error types for report operations.
//!
//! [`DataError`] covers transport failures, unusable report content, cache
//! backend failures and the bounded rollback giving up.

use chrono::NaiveDate;
use thiserror::Error;

use crate::request::ReportKind;

/// Errors that can occur while fetching, decoding or caching reports.
#[derive(Error, Debug)]
pub enum DataError {
    /// Network failure, timeout or a non-success HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The report for the day is too short to hold any data.
    ///
    /// Typical for holidays, days before publication, or days in the future.
    #[error("No {kind} data for {day}")]
    NoDataForDay {
        /// Report kind that was requested.
        kind: ReportKind,
        /// Day that was requested.
        day: NaiveDate,
    },

    /// The report content does not match the expected table layout.
    #[error("Format mismatch in {kind}: {reason}")]
    FormatMismatch {
        /// Report kind being decoded.
        kind: ReportKind,
        /// What did not match.
        reason: String,
    },

    /// Rolling back to earlier trading days did not find a report.
    #[error(
        "No {kind} report found after {attempts} rollbacks from {requested} (last tried {last_tried})"
    )]
    RollbackExhausted {
        /// Report kind that was requested.
        kind: ReportKind,
        /// Day originally requested.
        requested: NaiveDate,
        /// Last day that was tried.
        last_tried: NaiveDate,
        /// Number of rollbacks performed.
        attempts: usize,
    },

    /// Error interacting with the cache.
    #[error("Cache error: {0}")]
    Cache(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A task exceeded its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// Returns `true` if this error means the requested day has no report.
    #[must_use]
    pub const fn is_no_data(&self) -> bool {
        matches!(self, Self::NoDataForDay { .. })
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;
