use crate::error::BacktestError;
use crate::indicators;
use crate::models::*;
use crate::param_utils::{get_bounded_param, get_window_param, reject_unknown_params, MAX_WINDOW};
use crate::strategy_utils::{
    both_available, crossed_above, crossed_below, crossover, hold_no_crossover, hold_warmup,
    ExplainedSignal,
};
use std::collections::{BTreeMap, HashMap};

const RSI_WINDOW: &str = "rsiWindow";
const OVERSOLD: &str = "oversoldThreshold";
const OVERBOUGHT: &str = "overboughtThreshold";

#[derive(Debug, Clone, PartialEq)]
pub struct RsiStrategy {
    rsi_window: usize,
    oversold_threshold: f64,
    overbought_threshold: f64,
}

impl RsiStrategy {
    pub const NAME: &'static str = "rsi";
    pub const DEFAULT_WINDOW: usize = 14;
    pub const DEFAULT_OVERSOLD: f64 = 30.0;
    pub const DEFAULT_OVERBOUGHT: f64 = 70.0;

    pub fn new(
        rsi_window: usize,
        oversold_threshold: f64,
        overbought_threshold: f64,
    ) -> Result<Self, BacktestError> {
        if rsi_window < 2 {
            return Err(BacktestError::configuration(format!(
                "{} must be >= 2 (value: {})",
                RSI_WINDOW, rsi_window
            )));
        }
        let in_range = |value: f64| value.is_finite() && (0.0..=100.0).contains(&value);
        if !in_range(oversold_threshold) || !in_range(overbought_threshold) {
            return Err(BacktestError::configuration(format!(
                "{} and {} must be between 0 and 100",
                OVERSOLD, OVERBOUGHT
            )));
        }
        if oversold_threshold >= overbought_threshold {
            return Err(BacktestError::configuration(format!(
                "{} ({}) must be less than {} ({})",
                OVERSOLD, oversold_threshold, OVERBOUGHT, overbought_threshold
            )));
        }
        Ok(Self {
            rsi_window,
            oversold_threshold,
            overbought_threshold,
        })
    }

    pub fn from_parameters(parameters: &HashMap<String, f64>) -> Result<Self, BacktestError> {
        reject_unknown_params(parameters, &[RSI_WINDOW, OVERSOLD, OVERBOUGHT], Self::NAME)?;
        let rsi_window = get_window_param(parameters, RSI_WINDOW, Self::DEFAULT_WINDOW, 2)?;
        let oversold = get_bounded_param(parameters, OVERSOLD, Self::DEFAULT_OVERSOLD, 0.0, 100.0)?;
        let overbought =
            get_bounded_param(parameters, OVERBOUGHT, Self::DEFAULT_OVERBOUGHT, 0.0, 100.0)?;
        Self::new(rsi_window, oversold, overbought)
    }

    pub fn info() -> StrategyInfo {
        StrategyInfo {
            name: Self::NAME.to_string(),
            display_name: "RSI Threshold".to_string(),
            description: "Buys when RSI recovers up through the oversold level and sells when \
                          it falls back through the overbought level."
                .to_string(),
            parameters: vec![
                ParameterSpec {
                    name: RSI_WINDOW.to_string(),
                    r#type: "integer".to_string(),
                    min: Some(2.0),
                    max: Some(MAX_WINDOW as f64),
                    default: Self::DEFAULT_WINDOW as f64,
                    description: "Bars of price changes averaged per RSI value".to_string(),
                },
                ParameterSpec {
                    name: OVERSOLD.to_string(),
                    r#type: "number".to_string(),
                    min: Some(0.0),
                    max: Some(100.0),
                    default: Self::DEFAULT_OVERSOLD,
                    description: "Upward cross of this level triggers a buy".to_string(),
                },
                ParameterSpec {
                    name: OVERBOUGHT.to_string(),
                    r#type: "number".to_string(),
                    min: Some(0.0),
                    max: Some(100.0),
                    default: Self::DEFAULT_OVERBOUGHT,
                    description: "Downward cross of this level triggers a sell".to_string(),
                },
            ],
        }
    }
}

impl super::SignalGenerator for RsiStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> StrategyInfo {
        Self::info()
    }

    // First RSI lands on index `rsi_window`; a crossing needs the one before it too.
    fn min_data_points(&self) -> usize {
        self.rsi_window.saturating_add(2)
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            (RSI_WINDOW.to_string(), self.rsi_window as f64),
            (OVERSOLD.to_string(), self.oversold_threshold),
            (OVERBOUGHT.to_string(), self.overbought_threshold),
        ])
    }

    fn generate_explained(&self, series: &[PricePoint]) -> Vec<ExplainedSignal> {
        let closes: Vec<f64> = series.iter().map(|p| p.close).collect();
        let rsi = indicators::calculate_rsi(&closes, self.rsi_window);

        let mut signals = Vec::with_capacity(rsi.len());
        for i in 0..rsi.len() {
            let pair = if i == 0 {
                None
            } else {
                both_available(rsi[i - 1], rsi[i])
            };
            let Some((previous, current)) = pair else {
                signals.push(hold_warmup());
                continue;
            };

            let signal = if crossed_above(previous, current, self.oversold_threshold) {
                crossover(SignalAction::Buy)
            } else if crossed_below(previous, current, self.overbought_threshold) {
                crossover(SignalAction::Sell)
            } else {
                hold_no_crossover()
            };
            signals.push(signal);
        }
        signals
    }
}
