use crate::models::*;
use statrs::statistics::Statistics;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.25;

pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn calculate(
        value_history: &[ValueSample],
        initial_capital: f64,
        total_days: i64,
        buy_trade_count: usize,
    ) -> PerformanceMetrics {
        let final_value = value_history
            .last()
            .map(|sample| sample.value)
            .unwrap_or(initial_capital);

        if value_history.is_empty() || !(initial_capital > 0.0) {
            return PerformanceMetrics {
                initial_capital,
                final_value,
                ..PerformanceMetrics::default()
            };
        }

        PerformanceMetrics {
            initial_capital,
            final_value,
            total_return_pct: (final_value / initial_capital - 1.0) * 100.0,
            annualized_return_pct: Self::calculate_annualized_return(
                initial_capital,
                final_value,
                total_days,
            ),
            sharpe_ratio: Self::calculate_sharpe_ratio(value_history),
            max_drawdown_pct: Self::calculate_max_drawdown(value_history, initial_capital),
            trade_pair_count: buy_trade_count,
        }
    }

    fn calculate_annualized_return(initial_capital: f64, final_value: f64, total_days: i64) -> f64 {
        let years = total_days.max(1) as f64 / DAYS_PER_YEAR;
        let ratio = final_value.max(0.0) / initial_capital;
        (ratio.powf(1.0 / years) - 1.0) * 100.0
    }

    /// Annualized Sharpe over daily sample-to-sample returns, no risk-free rate.
    pub fn calculate_sharpe_ratio(value_history: &[ValueSample]) -> f64 {
        if value_history.len() < 2 {
            return 0.0;
        }

        let returns: Vec<f64> = value_history
            .windows(2)
            .map(|window| {
                let prev_value = window[0].value;
                if prev_value == 0.0 {
                    0.0
                } else {
                    window[1].value / prev_value - 1.0
                }
            })
            .collect();

        let mean_return = returns.iter().mean();
        let std_dev = returns.iter().population_std_dev();
        if !std_dev.is_finite() || std_dev == 0.0 {
            return 0.0;
        }

        mean_return / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Deepest peak-to-trough decline in percent, as a value <= 0.
    pub fn calculate_max_drawdown(value_history: &[ValueSample], initial_capital: f64) -> f64 {
        let mut peak_value = initial_capital;
        let mut worst = 0.0_f64;

        for sample in value_history {
            if sample.value > peak_value {
                peak_value = sample.value;
            }
            if peak_value > 0.0 {
                let drawdown = (sample.value - peak_value) / peak_value;
                worst = worst.min(drawdown);
            }
        }

        worst * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};

    fn history(values: &[f64]) -> Vec<ValueSample> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| ValueSample {
                date: start + Days::new(i as u64),
                value,
            })
            .collect()
    }

    #[test]
    fn flat_history_has_zero_return_and_risk() {
        let metrics = MetricsCalculator::calculate(&history(&[10_000.0; 300]), 10_000.0, 299, 0);
        assert_eq!(metrics.final_value, 10_000.0);
        assert_eq!(metrics.total_return_pct, 0.0);
        assert_eq!(metrics.annualized_return_pct, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.max_drawdown_pct, 0.0);
    }

    #[test]
    fn annualizes_over_calendar_days() {
        let metrics =
            MetricsCalculator::calculate(&history(&[100_000.0, 121_000.0]), 100_000.0, 731, 1);
        let years = 731.0 / 365.25;
        let expected = (1.21_f64.powf(1.0 / years) - 1.0) * 100.0;
        assert!((metrics.total_return_pct - 21.0).abs() < 1e-9);
        assert!((metrics.annualized_return_pct - expected).abs() < 1e-9);
        assert_eq!(metrics.trade_pair_count, 1);
    }

    #[test]
    fn short_spans_count_as_at_least_one_day() {
        let metrics = MetricsCalculator::calculate(&history(&[100.0, 101.0]), 100.0, 0, 0);
        let expected = (1.01_f64.powf(365.25) - 1.0) * 100.0;
        assert!((metrics.annualized_return_pct - expected).abs() < 1e-6);
    }

    #[test]
    fn wiped_out_portfolio_annualizes_to_minus_100() {
        let metrics = MetricsCalculator::calculate(&history(&[100.0, 0.0]), 100.0, 400, 1);
        assert_eq!(metrics.annualized_return_pct, -100.0);
        assert_eq!(metrics.max_drawdown_pct, -100.0);
    }

    #[test]
    fn sharpe_uses_population_std_dev() {
        let values = history(&[100.0, 110.0, 99.0, 108.9]);
        let returns = [0.1, -0.1, 0.1];
        let mean = returns.iter().sum::<f64>() / 3.0;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 3.0;
        let expected = mean / variance.sqrt() * 252.0_f64.sqrt();
        assert!((MetricsCalculator::calculate_sharpe_ratio(&values) - expected).abs() < 1e-9);
    }

    #[test]
    fn drawdown_peak_starts_at_initial_capital() {
        // The first sample is already below the starting capital.
        let dd = MetricsCalculator::calculate_max_drawdown(&history(&[80.0, 90.0]), 100.0);
        assert!((dd + 20.0).abs() < 1e-9);

        let values = history(&[100.0, 150.0, 120.0, 160.0]);
        let dd = MetricsCalculator::calculate_max_drawdown(&values, 100.0);
        assert!((dd + 20.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_is_zero_only_for_non_decreasing_history() {
        let rising = history(&[100.0, 100.0, 105.0, 120.0]);
        assert_eq!(MetricsCalculator::calculate_max_drawdown(&rising, 100.0), 0.0);
        let dipping = history(&[100.0, 105.0, 104.99, 120.0]);
        assert!(MetricsCalculator::calculate_max_drawdown(&dipping, 100.0) < 0.0);
    }

    #[test]
    fn degenerate_inputs_only_populate_capital() {
        let empty = MetricsCalculator::calculate(&[], 5_000.0, 30, 2);
        assert_eq!(empty.initial_capital, 5_000.0);
        assert_eq!(empty.final_value, 5_000.0);
        assert_eq!(empty.total_return_pct, 0.0);
        assert_eq!(empty.trade_pair_count, 0);

        let broke = MetricsCalculator::calculate(&history(&[0.0, 0.0]), 0.0, 30, 0);
        assert_eq!(broke.final_value, 0.0);
        assert_eq!(broke.sharpe_ratio, 0.0);
        assert_eq!(broke.annualized_return_pct, 0.0);
    }
}
