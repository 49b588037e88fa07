#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/twdata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Raw response caches for Taiwan exchange reports.
//!
//! This crate provides implementations of the [`RawCache`] trait from `twdata-core`:
//!
//! - [`FileCache`] - One file per key on disk (the default durable store)
//! - [`SqliteCache`] - Single-file SQLite store (requires `sqlite` feature)
//! - [`InMemoryCache`] - In-memory cache for testing
//! - [`NoopCache`] - No-op cache that doesn't store anything

/// File-per-key cache implementation.
pub mod file;
/// In-memory cache implementation.
pub mod memory;
/// No-op cache implementation.
pub mod noop;

/// SQLite-based cache implementation.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the trait for convenience
pub use twdata_core::RawCache;

pub use file::FileCache;
pub use memory::InMemoryCache;
pub use noop::NoopCache;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCache;
