use serde::{Deserialize, Serialize};

/// Per-bar indicator output. Bars before the lookback is filled are
/// `NotYetAvailable` rather than a placeholder number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndicatorValue {
    NotYetAvailable,
    Available(f64),
}

impl IndicatorValue {
    pub fn value(self) -> Option<f64> {
        match self {
            IndicatorValue::NotYetAvailable => None,
            IndicatorValue::Available(value) => Some(value),
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, IndicatorValue::Available(_))
    }
}

/// Simple moving average over a running window sum.
pub fn calculate_sma(prices: &[f64], period: usize) -> Vec<IndicatorValue> {
    let mut sma_values = vec![IndicatorValue::NotYetAvailable; prices.len()];
    if period == 0 || prices.len() < period {
        return sma_values;
    }

    let mut window_sum: f64 = prices[..period].iter().sum();
    sma_values[period - 1] = IndicatorValue::Available(window_sum / period as f64);
    for i in period..prices.len() {
        window_sum += prices[i] - prices[i - period];
        sma_values[i] = IndicatorValue::Available(window_sum / period as f64);
    }

    sma_values
}

fn rsi_from_avgs(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// RSI where every value uses plain means of the trailing `period` gains and
/// losses. The first value lands on index `period`.
///
/// This is not Wilder's recursive smoothing; the rolling mean is kept so
/// results stay comparable with earlier runs.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<IndicatorValue> {
    let mut rsi_values = vec![IndicatorValue::NotYetAvailable; prices.len()];
    if period == 0 || prices.len() <= period {
        return rsi_values;
    }

    let gains: Vec<f64> = std::iter::once(0.0)
        .chain(prices.windows(2).map(|w| (w[1] - w[0]).max(0.0)))
        .collect();
    let losses: Vec<f64> = std::iter::once(0.0)
        .chain(prices.windows(2).map(|w| (w[0] - w[1]).max(0.0)))
        .collect();

    for i in period..prices.len() {
        let window = (i + 1 - period)..=i;
        let avg_gain = gains[window.clone()].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[window].iter().sum::<f64>() / period as f64;
        rsi_values[i] = IndicatorValue::Available(rsi_from_avgs(avg_gain, avg_loss));
    }

    rsi_values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available(values: &[IndicatorValue]) -> Vec<f64> {
        values.iter().filter_map(|v| v.value()).collect()
    }

    #[test]
    fn sma_is_unavailable_until_window_fills() {
        let sma = calculate_sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(sma[0], IndicatorValue::NotYetAvailable);
        assert_eq!(sma[1], IndicatorValue::NotYetAvailable);
        assert_eq!(available(&sma), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn sma_of_short_series_is_all_unavailable() {
        let sma = calculate_sma(&[1.0, 2.0], 3);
        assert!(sma.iter().all(|v| !v.is_available()));
        assert!(calculate_sma(&[], 3).is_empty());
    }

    #[test]
    fn rsi_starts_at_period_index() {
        let prices = [10.0, 11.0, 10.5, 11.5, 12.0];
        let rsi = calculate_rsi(&prices, 3);
        assert_eq!(rsi.len(), prices.len());
        assert!(!rsi[2].is_available());
        // gains 1.0, 0.0, 1.0; losses 0.0, 0.5, 0.0
        let expected = 100.0 - 100.0 / (1.0 + (2.0 / 3.0) / (0.5 / 3.0));
        assert!((rsi[3].value().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn rsi_uses_rolling_means_not_wilder_smoothing() {
        // After the loss leaves the window only gains remain.
        let prices = [10.0, 9.0, 10.0, 11.0, 12.0];
        let rsi = calculate_rsi(&prices, 2);
        assert_eq!(rsi[4], IndicatorValue::Available(100.0));
    }

    #[test]
    fn rsi_without_losses_is_100_even_when_flat() {
        let rsi = calculate_rsi(&[5.0; 6], 3);
        assert_eq!(available(&rsi), vec![100.0, 100.0, 100.0]);
    }

    #[test]
    fn huge_periods_are_all_unavailable() {
        assert!(calculate_rsi(&[1.0, 2.0, 3.0], usize::MAX)
            .iter()
            .all(|v| !v.is_available()));
        assert!(calculate_sma(&[1.0, 2.0, 3.0], usize::MAX)
            .iter()
            .all(|v| !v.is_available()));
    }

    #[test]
    fn rsi_with_only_losses_is_zero() {
        let rsi = calculate_rsi(&[5.0, 4.0, 3.0, 2.0], 2);
        assert_eq!(available(&rsi), vec![0.0, 0.0]);
    }
}
