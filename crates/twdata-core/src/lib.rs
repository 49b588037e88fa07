#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/twdata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for Taiwan exchange report acquisition.
//!
//! - [`ReportSource`](source::ReportSource) - Loads one decoded report for a request
//! - [`RawCache`](cache::RawCache) - Raw response storage keyed by [`CacheKey`](cache::CacheKey)
//! - [`TradingCalendar`](calendar::TradingCalendar) - Trading-day oracle

/// Raw response cache trait and fingerprint keys.
pub mod cache;
/// Trading calendar trait and exchange-local day handling.
pub mod calendar;
/// Error types for report operations.
pub mod error;
/// Report requests and their HTTP form.
pub mod request;
/// Report source trait.
pub mod source;
/// Decoded report types.
pub mod types;

pub use cache::{CacheKey, RawCache};
pub use calendar::{TradingCalendar, WeekdayCalendar, exchange_day};
pub use error::{DataError, Result};
pub use request::{Destination, HttpRequest, ReportKind, ReportRequest};
pub use source::ReportSource;
pub use types::{BuySellVolume, Record, Report, StreakResult, VolumeField};
