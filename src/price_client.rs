use crate::config::DataClientSettings;
use crate::error::FetchError;
use crate::models::PricePoint;
use crate::rate_limiter::RateLimiter;
use crate::retry::{retry_rate_limited, Attempt, RetryPolicy};
use anyhow::{Context, Result};
use chrono::{DateTime, Days, NaiveDate};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode, Url};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Raw provider reply before any interpretation.
#[derive(Debug, Clone)]
pub struct ChartResponse {
    pub status: u16,
    pub body: String,
}

impl ChartResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// One round trip to the daily chart endpoint. Implementations must not
/// retry or throttle; `HistoricalDataClient` owns both.
pub trait ChartSource: Send + Sync {
    fn request_chart(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<ChartResponse, FetchError>> + Send;
}

pub struct HttpChartSource {
    http: Client,
    base_url: Url,
}

impl HttpChartSource {
    pub fn new(settings: &DataClientSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: Url::parse(&settings.base_url)
                .with_context(|| format!("invalid price API base URL {}", settings.base_url))?,
        })
    }
}

/// Chart endpoint for `symbol` under `base`, with the symbol percent-encoded
/// as a single path segment.
pub fn chart_url(base: &Url, symbol: &str) -> Result<Url, FetchError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| FetchError::Transport(format!("{} cannot take a path", base)))?
        .pop_if_empty()
        .extend(["v8", "finance", "chart", symbol]);
    Ok(url)
}

impl ChartSource for HttpChartSource {
    async fn request_chart(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ChartResponse, FetchError> {
        let url = chart_url(&self.base_url, symbol)?;
        let (period1, period2) = chart_period_bounds(start, end);
        let period1 = period1.to_string();
        let period2 = period2.to_string();
        debug!("GET {} period1={} period2={}", url, period1, period2);

        let response = self
            .http
            .get(url)
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", "1d"),
                ("events", "history"),
                ("includeAdjustedClose", "true"),
            ])
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ChartResponse { status, body })
    }
}

/// Unix second bounds for an inclusive daily range: start-of-day of `start`
/// through start-of-day after `end`.
pub fn chart_period_bounds(start: NaiveDate, end: NaiveDate) -> (i64, i64) {
    let period1 = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
    let day_after_end = end.checked_add_days(Days::new(1)).unwrap_or(end);
    let period2 = day_after_end
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
        .timestamp();
    (period1, period2)
}

pub fn normalize_symbol(value: &str) -> Option<String> {
    let normalized = value.trim().to_uppercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

pub struct HistoricalDataClient<S> {
    source: S,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl<S: ChartSource> HistoricalDataClient<S> {
    pub fn new(source: S, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            source,
            limiter,
            retry,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Daily bars for `symbol` in `[start, end]`, ascending and unique by date.
    /// An empty vector means the provider had no bars for the range.
    pub async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let Some(symbol) = normalize_symbol(symbol) else {
            return Err(FetchError::NotFound(symbol.to_string()));
        };
        if start > end {
            return Ok(Vec::new());
        }

        let context = format!("price history for {} ({} to {})", symbol, start, end);
        let limiter = self.limiter.as_ref();
        let source = &self.source;
        let symbol_ref = symbol.as_str();
        let response = retry_rate_limited(&self.retry, &context, || async move {
            limiter.acquire().await;
            let response = source.request_chart(symbol_ref, start, end).await?;
            if response.status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
                Ok(Attempt::RateLimited)
            } else {
                Ok(Attempt::Done(response))
            }
        })
        .await?;

        if response.status == StatusCode::NOT_FOUND.as_u16() {
            return Err(FetchError::NotFound(symbol));
        }
        if !(200..300).contains(&response.status) {
            return Err(FetchError::Transport(format!(
                "GET {} returned HTTP {}",
                context, response.status
            )));
        }

        let points = parse_chart_payload(&symbol, &response.body, start, end)?;
        info!("Fetched {} daily bars for {}", points.len(), context);
        Ok(points)
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChartErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<Option<i64>>>,
    #[serde(default)]
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Option<Vec<LooseF64>>,
    #[serde(default)]
    high: Option<Vec<LooseF64>>,
    #[serde(default)]
    low: Option<Vec<LooseF64>>,
    #[serde(default)]
    close: Option<Vec<LooseF64>>,
    #[serde(default)]
    volume: Option<Vec<LooseF64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<LooseF64>,
}

/// Array entry that may be null, a number or a numeric string.
#[derive(Debug, Clone, Copy, Default)]
struct LooseF64(Option<f64>);

impl<'de> Deserialize<'de> for LooseF64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LooseF64Visitor;

        impl<'de> Visitor<'de> for LooseF64Visitor {
            type Value = LooseF64;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a number, numeric string or null")
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(LooseF64(None))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(LooseF64(None))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(LooseF64(Some(value)))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(LooseF64(Some(value as f64)))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(LooseF64(Some(value as f64)))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(LooseF64(value.trim().parse::<f64>().ok()))
            }
        }

        deserializer.deserialize_any(LooseF64Visitor)
    }
}

/// A quote array that must line up with the timestamps one to one.
fn required_series(
    values: Option<Vec<LooseF64>>,
    field: &str,
    expected: usize,
    symbol: &str,
) -> Result<Vec<LooseF64>, FetchError> {
    let values = values.ok_or_else(|| {
        FetchError::Parse(format!("chart payload for {} has no {} array", symbol, field))
    })?;
    if values.len() != expected {
        return Err(FetchError::Parse(format!(
            "chart payload for {} has {} {} values for {} timestamps",
            symbol,
            values.len(),
            field,
            expected
        )));
    }
    Ok(values)
}

fn value_at(values: &[LooseF64], index: usize) -> Option<f64> {
    values
        .get(index)
        .and_then(|entry| entry.0)
        .filter(|value| value.is_finite())
}

/// Turns a chart payload into a clean daily series limited to `[start, end]`.
pub fn parse_chart_payload(
    symbol: &str,
    body: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PricePoint>, FetchError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|err| FetchError::Parse(format!("chart payload for {}: {}", symbol, err)))?;

    if let Some(error) = envelope.chart.error {
        let code = error.code.unwrap_or_default();
        let description = error.description.unwrap_or_default();
        if code.eq_ignore_ascii_case("not found") {
            return Err(FetchError::NotFound(symbol.to_string()));
        }
        return Err(FetchError::Transport(format!(
            "price provider rejected {}: {} {}",
            symbol, code, description
        )));
    }

    let Some(result) = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
    else {
        return Ok(Vec::new());
    };

    let timestamps = result.timestamp.unwrap_or_default();
    if timestamps.is_empty() {
        return Ok(Vec::new());
    }

    let indicators = result.indicators.ok_or_else(|| {
        FetchError::Parse(format!(
            "chart payload for {} has timestamps but no indicators",
            symbol
        ))
    })?;
    let quote = indicators.quote.into_iter().next().ok_or_else(|| {
        FetchError::Parse(format!(
            "chart payload for {} has timestamps but no quote block",
            symbol
        ))
    })?;
    let bars = timestamps.len();
    let opens = required_series(quote.open, "open", bars, symbol)?;
    let highs = required_series(quote.high, "high", bars, symbol)?;
    let lows = required_series(quote.low, "low", bars, symbol)?;
    let closes = required_series(quote.close, "close", bars, symbol)?;
    let volumes = required_series(quote.volume, "volume", bars, symbol)?;
    let adj_close = indicators
        .adjclose
        .and_then(|blocks| blocks.into_iter().next())
        .map(|block| block.adjclose)
        .unwrap_or_default();

    let mut by_date: BTreeMap<NaiveDate, PricePoint> = BTreeMap::new();
    let mut dropped = 0usize;
    let mut duplicates = 0usize;

    for (index, timestamp) in timestamps.iter().enumerate() {
        let date = timestamp
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
            .map(|moment| moment.date_naive());
        let fields = (
            date,
            value_at(&opens, index),
            value_at(&highs, index),
            value_at(&lows, index),
            value_at(&closes, index),
            value_at(&volumes, index).filter(|volume| *volume >= 0.0),
        );
        let (Some(date), Some(open), Some(high), Some(low), Some(close), Some(volume)) = fields
        else {
            dropped += 1;
            continue;
        };
        if date < start || date > end {
            continue;
        }

        let point = PricePoint {
            date,
            open,
            high,
            low,
            close,
            adj_close: value_at(&adj_close, index).unwrap_or(close),
            volume: volume.round() as u64,
        };
        if by_date.contains_key(&date) {
            duplicates += 1;
            continue;
        }
        by_date.insert(date, point);
    }

    if dropped > 0 {
        warn!(
            "Dropped {} incomplete bar{} from {} chart payload",
            dropped,
            if dropped == 1 { "" } else { "s" },
            symbol
        );
    }
    if duplicates > 0 {
        warn!(
            "Ignored {} duplicate bar{} in {} chart payload",
            duplicates,
            if duplicates == 1 { "" } else { "s" },
            symbol
        );
    }

    Ok(by_date.into_values().collect())
}
