#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/twdata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Taiwan exchange report acquisition and institutional-flow screening.
//!
//! This crate re-exports the core types, caches, fetcher and report layers,
//! and adds:
//!
//! - [`Exchange`] - Wires cache, fetcher, stores and calendar from one config
//! - [`Screener`] - Runs check rules over many securities concurrently
//!
//! # Features
//!
//! - `cache-sqlite` - SQLite-based raw cache

// Core types and traits
pub use twdata_core::*;

// Cache implementations
#[cfg(feature = "cache-sqlite")]
pub use twdata_cache::SqliteCache;
pub use twdata_cache::{FileCache, InMemoryCache, NoopCache};

// Fetching
pub use twdata_http::{Charset, DestinationConfig, FetchConfig, Fetcher, RateLimiter};

// Reports
pub use twdata_reports::{
    Endpoints, ExchangeSource, MarginCheck, MarginVerdict, ReportStore, StoreConfig,
    StreakEvaluator, decode,
};

mod exchange;
mod screener;

pub use exchange::{DEFAULT_CACHE_DIR, Exchange, ExchangeConfig};
pub use screener::{
    CheckRule, DEFAULT_MIN_RANGE_PERCENT, MarginRule, PriceHistory, PriceSnapshot, RuleOutcome,
    RuleVerdict, ScreenFilter, ScreenRow, Screener, ScreenerConfig, StreakRule,
};
