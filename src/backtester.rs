use crate::error::BacktestError;
use crate::models::*;
use crate::performance::MetricsCalculator;
use crate::price_client::{normalize_symbol, ChartSource, HistoricalDataClient};
use crate::simulator::PortfolioSimulator;
use crate::strategy::{self, SignalGenerator};
use crate::strategy_utils::calculate_period_days;
use futures::future::{AbortRegistration, Abortable};
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Runs single-symbol backtests against a shared data client.
pub struct Backtester<S> {
    client: Arc<HistoricalDataClient<S>>,
}

impl<S> Clone for Backtester<S> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<S: ChartSource> Backtester<S> {
    pub fn new(client: Arc<HistoricalDataClient<S>>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<HistoricalDataClient<S>> {
        &self.client
    }

    pub async fn run(&self, request: &BacktestRequest) -> BacktestOutcome {
        let started = Instant::now();
        let result = self.execute(request).await;
        finish(request, result, started)
    }

    /// Like [`run`](Self::run), but gives up with a `Cancelled` failure once
    /// `deadline` elapses.
    pub async fn run_with_deadline(
        &self,
        request: &BacktestRequest,
        deadline: Duration,
    ) -> BacktestOutcome {
        let started = Instant::now();
        let result = match tokio::time::timeout(deadline, self.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(BacktestError::Cancelled(format!(
                "deadline of {}ms elapsed",
                deadline.as_millis()
            ))),
        };
        finish(request, result, started)
    }

    /// Like [`run`](Self::run), but stops with a `Cancelled` failure when the
    /// matching `AbortHandle` fires.
    pub async fn run_cancellable(
        &self,
        request: &BacktestRequest,
        registration: AbortRegistration,
    ) -> BacktestOutcome {
        let started = Instant::now();
        let result = match Abortable::new(self.execute(request), registration).await {
            Ok(result) => result,
            Err(_) => Err(BacktestError::Cancelled("run was aborted".to_string())),
        };
        finish(request, result, started)
    }

    async fn execute(&self, request: &BacktestRequest) -> Result<BacktestReport, BacktestError> {
        let symbol = validate_request(request)?;
        // Strategy problems must surface before any network traffic.
        let strategy = strategy::create_strategy(&request.strategy, &request.parameters)?;

        info!(
            "Running {} backtest for {} from {} to {}",
            strategy.name(),
            symbol,
            request.start_date,
            request.end_date
        );

        let series = self
            .client
            .fetch(&symbol, request.start_date, request.end_date)
            .await?;
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Err(BacktestError::DataUnavailable {
                symbol,
                start: request.start_date.to_string(),
                end: request.end_date.to_string(),
            });
        };
        if series.len() < strategy.min_data_points() {
            warn!(
                "{} has {} bars, fewer than the {} {} needs for a signal",
                symbol,
                series.len(),
                strategy.min_data_points(),
                strategy.name()
            );
        }

        let signals = strategy.generate(&series);
        if signals.len() != series.len() {
            return Err(BacktestError::InternalConsistency(format!(
                "{} produced {} signals for {} bars",
                strategy.name(),
                signals.len(),
                series.len()
            )));
        }

        let simulation = PortfolioSimulator::run(&series, &signals, request.initial_capital)?;
        let total_days = calculate_period_days(first.date, last.date);
        let metrics = MetricsCalculator::calculate(
            &simulation.value_history,
            request.initial_capital,
            total_days,
            simulation.buy_count(),
        );
        let benchmark_history = benchmark_history(&series, request.initial_capital);
        let benchmark_metrics = MetricsCalculator::calculate(
            &benchmark_history,
            request.initial_capital,
            total_days,
            0,
        );

        Ok(BacktestReport {
            run_id: Uuid::new_v4(),
            symbol,
            strategy: strategy.name().to_string(),
            parameters: strategy.parameters(),
            start_date: first.date,
            end_date: last.date,
            metrics,
            benchmark_metrics,
            value_history: simulation.value_history,
            benchmark_history,
            trades: simulation.trades,
        })
    }
}

/// Checks request fields and returns the normalized symbol.
fn validate_request(request: &BacktestRequest) -> Result<String, BacktestError> {
    let symbol = normalize_symbol(&request.symbol)
        .ok_or_else(|| BacktestError::configuration("Symbol must not be empty"))?;
    if request.start_date > request.end_date {
        return Err(BacktestError::configuration(format!(
            "Start date {} is after end date {}",
            request.start_date, request.end_date
        )));
    }
    if !request.initial_capital.is_finite() || request.initial_capital < 0.0 {
        return Err(BacktestError::configuration(format!(
            "Initial capital must be a finite, non-negative amount (value: {})",
            request.initial_capital
        )));
    }
    Ok(symbol)
}

/// Buy-and-hold value of `initial_capital` put into the first close.
pub fn benchmark_history(series: &[PricePoint], initial_capital: f64) -> Vec<ValueSample> {
    let base_price = series.first().map(|point| point.close).unwrap_or(0.0);
    series
        .iter()
        .map(|point| ValueSample {
            date: point.date,
            value: if base_price > 0.0 {
                point.close / base_price * initial_capital
            } else {
                initial_capital
            },
        })
        .collect()
}

fn finish(
    request: &BacktestRequest,
    result: Result<BacktestReport, BacktestError>,
    started: Instant,
) -> BacktestOutcome {
    let elapsed_ms = started.elapsed().as_millis();
    match result {
        Ok(report) => {
            info!(
                "Backtest {} for {} finished in {}ms: return {:.2}% over {} trades \
                 (benchmark {:.2}%)",
                report.run_id,
                report.symbol,
                elapsed_ms,
                report.metrics.total_return_pct,
                report.trades.len(),
                report.benchmark_metrics.total_return_pct
            );
            BacktestOutcome::Completed(Box::new(report))
        }
        Err(error) => {
            warn!(
                "Backtest for {} failed after {}ms ({}): {}",
                request.symbol,
                elapsed_ms,
                error.kind(),
                error
            );
            BacktestOutcome::Failed(BacktestFailure {
                kind: error.kind(),
                message: error.to_string(),
                symbol: request.symbol.clone(),
                start_date: request.start_date,
                end_date: request.end_date,
                strategy: request.strategy.clone(),
            })
        }
    }
}
