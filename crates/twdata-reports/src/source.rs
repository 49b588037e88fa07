//! HTTP-backed report source.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};
use twdata_core::{Report, ReportRequest, ReportSource, Result};
use twdata_http::Fetcher;

use crate::{decoder::decode, endpoint::Endpoints};

/// Loads reports by fetching them through a [`Fetcher`] and decoding them.
#[derive(Debug, Clone)]
pub struct ExchangeSource {
    fetcher: Arc<Fetcher>,
    endpoints: Endpoints,
}

impl ExchangeSource {
    /// Creates a source.
    #[must_use]
    pub const fn new(fetcher: Arc<Fetcher>, endpoints: Endpoints) -> Self {
        Self { fetcher, endpoints }
    }

    /// The underlying fetcher.
    #[must_use]
    pub const fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    /// The endpoints requests are built against.
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

#[async_trait]
impl ReportSource for ExchangeSource {
    fn name(&self) -> &str {
        "exchange"
    }

    #[instrument(skip(self), fields(kind = %request.kind, day = %request.day))]
    async fn load(&self, request: &ReportRequest) -> Result<Report> {
        let http = self.endpoints.request(request);
        let body = self.fetcher.fetch(&http).await?;
        debug!(bytes = body.len(), "Fetched report body");
        decode(request.kind, request.day, &body)
    }

    async fn evict(&self, request: &ReportRequest) -> Result<bool> {
        self.fetcher.evict(&self.endpoints.request(request)).await
    }
}
