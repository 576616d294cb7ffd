use crate::error::BacktestError;
use crate::models::*;
use crate::strategy_utils::ExplainedSignal;
use std::collections::{BTreeMap, HashMap};

/// Turns a daily price series into one signal per bar.
pub trait SignalGenerator {
    fn name(&self) -> &'static str;
    fn describe(&self) -> StrategyInfo;
    /// Bars needed before the first non-warmup decision is possible.
    fn min_data_points(&self) -> usize;
    fn parameters(&self) -> BTreeMap<String, f64>;
    fn generate_explained(&self, series: &[PricePoint]) -> Vec<ExplainedSignal>;

    fn generate(&self, series: &[PricePoint]) -> Vec<SignalAction> {
        self.generate_explained(series)
            .into_iter()
            .map(|signal| signal.action)
            .collect()
    }
}

#[path = "strategies/sma_crossover.rs"]
pub mod sma_crossover;

pub use sma_crossover::SmaCrossoverStrategy;

#[path = "strategies/rsi.rs"]
pub mod rsi;

pub use rsi::RsiStrategy;

/// The closed set of strategies the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    SmaCrossover,
    Rsi,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::SmaCrossover, StrategyKind::Rsi];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::SmaCrossover => SmaCrossoverStrategy::NAME,
            StrategyKind::Rsi => RsiStrategy::NAME,
        }
    }

    pub fn describe(self) -> StrategyInfo {
        match self {
            StrategyKind::SmaCrossover => SmaCrossoverStrategy::info(),
            StrategyKind::Rsi => RsiStrategy::info(),
        }
    }

    /// Validates `parameters` into a ready-to-run strategy.
    pub fn configure(self, parameters: &HashMap<String, f64>) -> Result<Strategy, BacktestError> {
        match self {
            StrategyKind::SmaCrossover => Ok(Strategy::SmaCrossover(
                SmaCrossoverStrategy::from_parameters(parameters)?,
            )),
            StrategyKind::Rsi => Ok(Strategy::Rsi(RsiStrategy::from_parameters(parameters)?)),
        }
    }
}

/// A configured strategy instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    SmaCrossover(SmaCrossoverStrategy),
    Rsi(RsiStrategy),
}

impl Strategy {
    fn inner(&self) -> &dyn SignalGenerator {
        match self {
            Strategy::SmaCrossover(strategy) => strategy,
            Strategy::Rsi(strategy) => strategy,
        }
    }
}

impl SignalGenerator for Strategy {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn describe(&self) -> StrategyInfo {
        self.inner().describe()
    }

    fn min_data_points(&self) -> usize {
        self.inner().min_data_points()
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        self.inner().parameters()
    }

    fn generate_explained(&self, series: &[PricePoint]) -> Vec<ExplainedSignal> {
        self.inner().generate_explained(series)
    }
}

pub fn lookup(name: &str) -> Result<StrategyKind, BacktestError> {
    let normalized = name.trim().to_ascii_lowercase();
    StrategyKind::ALL
        .into_iter()
        .find(|kind| kind.name() == normalized)
        .ok_or_else(|| {
            BacktestError::configuration(format!(
                "Unknown strategy: {} (available: {})",
                name,
                StrategyKind::ALL.map(StrategyKind::name).join(", ")
            ))
        })
}

pub fn list_all() -> Vec<StrategyInfo> {
    StrategyKind::ALL
        .into_iter()
        .map(StrategyKind::describe)
        .collect()
}

pub fn create_strategy(
    name: &str,
    parameters: &HashMap<String, f64>,
) -> Result<Strategy, BacktestError> {
    lookup(name)?.configure(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup(" SMA_Crossover ").unwrap(), StrategyKind::SmaCrossover);
        assert_eq!(lookup("rsi").unwrap(), StrategyKind::Rsi);
    }

    #[test]
    fn unknown_strategy_is_a_configuration_error() {
        let err = lookup("macd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("sma_crossover, rsi"));
    }

    #[test]
    fn listing_covers_every_kind_with_schema() {
        let infos = list_all();
        let names: Vec<&str> = infos.iter().map(|info| info.name.as_str()).collect();
        assert_eq!(names, vec!["sma_crossover", "rsi"]);
        assert!(infos.iter().all(|info| !info.parameters.is_empty()));
    }

    #[test]
    fn configured_strategy_reports_resolved_parameters() {
        let strategy = create_strategy("sma_crossover", &HashMap::new()).unwrap();
        let params = strategy.parameters();
        assert_eq!(params["shortWindow"], 20.0);
        assert_eq!(params["longWindow"], 50.0);
        assert_eq!(strategy.name(), "sma_crossover");
    }
}
