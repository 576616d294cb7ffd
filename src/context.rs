use crate::backtester::Backtester;
use crate::config::DataClientSettings;
use crate::price_client::{HistoricalDataClient, HttpChartSource};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use anyhow::Result;
use log::info;
use std::sync::Arc;

/// Process-wide wiring: one rate limiter and one data client shared by every run.
#[derive(Clone)]
pub struct AppContext {
    limiter: Arc<RateLimiter>,
    client: Arc<HistoricalDataClient<HttpChartSource>>,
}

impl AppContext {
    pub fn initialize(settings: DataClientSettings) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(settings.min_request_interval));
        let source = HttpChartSource::new(&settings)?;
        let retry = RetryPolicy::new(settings.max_retries, settings.backoff_base);
        let client = Arc::new(HistoricalDataClient::new(
            source,
            Arc::clone(&limiter),
            retry,
        ));
        info!(
            "Price provider {} (min interval {}ms, {} retries, backoff base {}ms)",
            settings.base_url,
            settings.min_request_interval.as_millis(),
            settings.max_retries,
            settings.backoff_base.as_millis()
        );
        Ok(Self { limiter, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::initialize(DataClientSettings::from_env()?)
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn backtester(&self) -> Backtester<HttpChartSource> {
        Backtester::new(Arc::clone(&self.client))
    }
}
