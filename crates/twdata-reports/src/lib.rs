#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/twdata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Report decoding, day-indexed memoization and streak evaluation.

/// Table decoder and per-kind layouts.
pub mod decoder;
/// URL and form construction.
pub mod endpoint;
/// Margin and short balance check.
pub mod margin;
/// HTTP-backed report source.
pub mod source;
/// Day-indexed memoization with rollback.
pub mod store;
/// Overbought streak evaluation.
pub mod streak;

#[cfg(test)]
mod testing;

pub use decoder::{FieldSpec, TableDescriptor, TotalRule, decode, descriptor};
pub use endpoint::Endpoints;
pub use margin::{MarginCheck, MarginVerdict};
pub use source::ExchangeSource;
pub use store::{ReportStore, StoreConfig};
pub use streak::StreakEvaluator;
