#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/twdata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Rate-limited, cached HTTP fetching for Taiwan exchange reports.

/// Response charset normalization.
pub mod charset;
/// Fetch configuration.
pub mod config;
/// Cached HTTP fetcher.
pub mod fetcher;
/// Per-destination rate limiter.
pub mod limiter;

pub use charset::Charset;
pub use config::{DestinationConfig, FetchConfig};
pub use fetcher::Fetcher;
pub use limiter::RateLimiter;
