use crate::error::BacktestError;
use crate::indicators;
use crate::models::*;
use crate::param_utils::{get_window_param, reject_unknown_params, MAX_WINDOW};
use crate::strategy_utils::{
    both_available, crossover, hold_no_crossover, hold_warmup, ExplainedSignal,
};
use std::collections::{BTreeMap, HashMap};

const SHORT_WINDOW: &str = "shortWindow";
const LONG_WINDOW: &str = "longWindow";

/// `short > long` beyond the rounding a `terms`-element window sum can pick up,
/// so equal averages of a flat series never read as "above".
fn is_clearly_above(short: f64, long: f64, terms: usize) -> bool {
    short - long > f64::EPSILON * long.abs() * terms as f64
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmaCrossoverStrategy {
    short_window: usize,
    long_window: usize,
}

impl SmaCrossoverStrategy {
    pub const NAME: &'static str = "sma_crossover";
    pub const DEFAULT_SHORT_WINDOW: usize = 20;
    pub const DEFAULT_LONG_WINDOW: usize = 50;

    pub fn new(short_window: usize, long_window: usize) -> Result<Self, BacktestError> {
        if short_window == 0 || long_window == 0 {
            return Err(BacktestError::configuration(format!(
                "{} and {} must be greater than zero",
                SHORT_WINDOW, LONG_WINDOW
            )));
        }
        if short_window >= long_window {
            return Err(BacktestError::configuration(format!(
                "{} ({}) must be less than {} ({})",
                SHORT_WINDOW, short_window, LONG_WINDOW, long_window
            )));
        }
        Ok(Self {
            short_window,
            long_window,
        })
    }

    pub fn from_parameters(parameters: &HashMap<String, f64>) -> Result<Self, BacktestError> {
        reject_unknown_params(parameters, &[SHORT_WINDOW, LONG_WINDOW], Self::NAME)?;
        let short_window =
            get_window_param(parameters, SHORT_WINDOW, Self::DEFAULT_SHORT_WINDOW, 1)?;
        let long_window = get_window_param(parameters, LONG_WINDOW, Self::DEFAULT_LONG_WINDOW, 1)?;
        Self::new(short_window, long_window)
    }

    pub fn info() -> StrategyInfo {
        StrategyInfo {
            name: Self::NAME.to_string(),
            display_name: "SMA Crossover".to_string(),
            description: "Buys when the short simple moving average crosses above the long one \
                          and sells when it crosses back below."
                .to_string(),
            parameters: vec![
                ParameterSpec {
                    name: SHORT_WINDOW.to_string(),
                    r#type: "integer".to_string(),
                    min: Some(1.0),
                    max: Some(MAX_WINDOW as f64),
                    default: Self::DEFAULT_SHORT_WINDOW as f64,
                    description: "Bars in the fast average; must be below longWindow".to_string(),
                },
                ParameterSpec {
                    name: LONG_WINDOW.to_string(),
                    r#type: "integer".to_string(),
                    min: Some(2.0),
                    max: Some(MAX_WINDOW as f64),
                    default: Self::DEFAULT_LONG_WINDOW as f64,
                    description: "Bars in the slow average".to_string(),
                },
            ],
        }
    }
}

impl super::SignalGenerator for SmaCrossoverStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> StrategyInfo {
        Self::info()
    }

    fn min_data_points(&self) -> usize {
        self.long_window
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            (SHORT_WINDOW.to_string(), self.short_window as f64),
            (LONG_WINDOW.to_string(), self.long_window as f64),
        ])
    }

    fn generate_explained(&self, series: &[PricePoint]) -> Vec<ExplainedSignal> {
        if series.len() < self.long_window {
            return vec![hold_warmup(); series.len()];
        }

        let closes: Vec<f64> = series.iter().map(|p| p.close).collect();
        let short_sma = indicators::calculate_sma(&closes, self.short_window);
        let long_sma = indicators::calculate_sma(&closes, self.long_window);

        // The bar before the first comparable one counts as "not above".
        let mut was_above = false;
        short_sma
            .iter()
            .zip(long_sma.iter())
            .map(|(&short, &long)| {
                let Some((short, long)) = both_available(short, long) else {
                    return hold_warmup();
                };
                let is_above = is_clearly_above(short, long, self.long_window);
                let signal = match (was_above, is_above) {
                    (false, true) => crossover(SignalAction::Buy),
                    (true, false) => crossover(SignalAction::Sell),
                    _ => hold_no_crossover(),
                };
                was_above = is_above;
                signal
            })
            .collect()
    }
}
