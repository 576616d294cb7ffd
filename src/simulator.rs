use crate::error::BacktestError;
use crate::models::*;
use log::debug;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Flat,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    pub shares_held: u64,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            shares_held: 0,
        }
    }

    pub fn position(&self) -> Position {
        if self.shares_held > 0 {
            Position::Long
        } else {
            Position::Flat
        }
    }

    pub fn value_at(&self, price: f64) -> f64 {
        self.cash + self.shares_held as f64 * price
    }

    /// Buys as many whole shares as cash allows. Returns the trade if any shares were bought.
    fn buy_all(&mut self, date: chrono::NaiveDate, price: f64) -> Option<Trade> {
        if self.cash <= 0.0 || !(price > 0.0) {
            return None;
        }
        let mut shares = (self.cash / price).floor() as u64;
        if shares > 0 && shares as f64 * price > self.cash {
            shares -= 1;
        }
        if shares == 0 {
            return None;
        }

        let amount = shares as f64 * price;
        self.cash = (self.cash - amount).max(0.0);
        self.shares_held = shares;
        Some(Trade {
            date,
            action: TradeAction::Buy,
            price,
            shares,
            amount,
        })
    }

    fn sell_all(&mut self, date: chrono::NaiveDate, price: f64) -> Option<Trade> {
        if self.shares_held == 0 || !(price > 0.0) {
            return None;
        }
        let shares = self.shares_held;
        let amount = shares as f64 * price;
        self.cash += amount;
        self.shares_held = 0;
        Some(Trade {
            date,
            action: TradeAction::Sell,
            price,
            shares,
            amount,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub value_history: Vec<ValueSample>,
    pub trades: Vec<Trade>,
    pub final_state: PortfolioState,
}

impl SimulationResult {
    pub fn final_value(&self) -> Option<f64> {
        self.value_history.last().map(|sample| sample.value)
    }

    pub fn buy_count(&self) -> usize {
        self.trades
            .iter()
            .filter(|trade| trade.action == TradeAction::Buy)
            .count()
    }
}

/// Long-only, all-in/all-out portfolio replay at each bar's close.
pub struct PortfolioSimulator;

impl PortfolioSimulator {
    pub fn run(
        series: &[PricePoint],
        signals: &[SignalAction],
        initial_capital: f64,
    ) -> Result<SimulationResult, BacktestError> {
        if series.len() != signals.len() {
            return Err(BacktestError::InternalConsistency(format!(
                "signal count {} does not match price count {}",
                signals.len(),
                series.len()
            )));
        }

        let mut state = PortfolioState::new(initial_capital);
        let mut value_history = Vec::with_capacity(series.len());
        let mut trades = Vec::new();

        for (point, signal) in series.iter().zip(signals.iter()) {
            // Sample before acting on the bar's signal.
            value_history.push(ValueSample {
                date: point.date,
                value: state.value_at(point.close),
            });

            let trade = match (state.position(), signal) {
                (Position::Flat, SignalAction::Buy) => state.buy_all(point.date, point.close),
                (Position::Long, SignalAction::Sell) => state.sell_all(point.date, point.close),
                _ => None,
            };
            if let Some(trade) = trade {
                debug!(
                    "{} {} shares at {:.2} on {}",
                    trade.action.as_str(),
                    trade.shares,
                    trade.price,
                    trade.date
                );
                trades.push(trade);
            }
        }

        Ok(SimulationResult {
            value_history,
            trades,
            final_state: state,
        })
    }

    /// Rebuilds the value history from a trade log alone.
    pub fn replay(
        series: &[PricePoint],
        trades: &[Trade],
        initial_capital: f64,
    ) -> Result<Vec<ValueSample>, BacktestError> {
        let mut trades_by_date: HashMap<chrono::NaiveDate, &Trade> =
            HashMap::with_capacity(trades.len());
        for trade in trades {
            if trades_by_date.insert(trade.date, trade).is_some() {
                return Err(BacktestError::InternalConsistency(format!(
                    "more than one trade recorded on {}",
                    trade.date
                )));
            }
        }

        let mut state = PortfolioState::new(initial_capital);
        let mut value_history = Vec::with_capacity(series.len());
        let mut applied = 0usize;

        for point in series {
            value_history.push(ValueSample {
                date: point.date,
                value: state.value_at(point.close),
            });
            let Some(trade) = trades_by_date.get(&point.date) else {
                continue;
            };
            match trade.action {
                TradeAction::Buy => {
                    state.cash = (state.cash - trade.amount).max(0.0);
                    state.shares_held += trade.shares;
                }
                TradeAction::Sell => {
                    if trade.shares > state.shares_held {
                        return Err(BacktestError::InternalConsistency(format!(
                            "sell of {} shares on {} exceeds {} held",
                            trade.shares, trade.date, state.shares_held
                        )));
                    }
                    state.cash += trade.amount;
                    state.shares_held -= trade.shares;
                }
            }
            applied += 1;
        }

        if applied != trades.len() {
            return Err(BacktestError::InternalConsistency(format!(
                "{} trade(s) fall on dates outside the price series",
                trades.len() - applied
            )));
        }
        Ok(value_history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{Days, NaiveDate};

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint::flat(start + Days::new(i as u64), close))
            .collect()
    }

    use SignalAction::{Buy, Hold, Sell};

    #[test]
    fn length_mismatch_is_internal_consistency() {
        let err = PortfolioSimulator::run(&series(&[1.0, 2.0]), &[Hold], 100.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalConsistency);
    }

    #[test]
    fn samples_before_acting_and_trades_at_close() {
        let prices = series(&[10.0, 12.0, 15.0, 9.0]);
        let result =
            PortfolioSimulator::run(&prices, &[Buy, Hold, Sell, Hold], 105.0).unwrap();

        let values: Vec<f64> = result.value_history.iter().map(|s| s.value).collect();
        // 10 shares at 10 leave 5 cash; sold at 15.
        assert_eq!(values, vec![105.0, 125.0, 155.0, 155.0]);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].shares, 10);
        assert_eq!(result.trades[0].amount, 100.0);
        assert_eq!(result.trades[1].action, TradeAction::Sell);
        assert_eq!(result.final_state.cash, 155.0);
        assert_eq!(result.buy_count(), 1);
    }

    #[test]
    fn redundant_signals_are_ignored() {
        let prices = series(&[10.0, 10.0, 10.0, 10.0, 10.0]);
        let result =
            PortfolioSimulator::run(&prices, &[Sell, Buy, Buy, Sell, Sell], 50.0).unwrap();
        let actions: Vec<TradeAction> = result.trades.iter().map(|t| t.action).collect();
        assert_eq!(actions, vec![TradeAction::Buy, TradeAction::Sell]);
    }

    #[test]
    fn cannot_afford_a_share_stays_flat() {
        let prices = series(&[500.0, 520.0]);
        let result = PortfolioSimulator::run(&prices, &[Buy, Hold], 100.0).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.final_value(), Some(100.0));
    }

    #[test]
    fn zero_capital_never_trades() {
        let prices = series(&[5.0, 6.0]);
        let result = PortfolioSimulator::run(&prices, &[Buy, Sell], 0.0).unwrap();
        assert!(result.trades.is_empty());
        assert!(result.value_history.iter().all(|s| s.value == 0.0));
    }

    #[test]
    fn cash_and_shares_never_go_negative() {
        let closes: Vec<f64> = (0..200).map(|i| 33.3 + ((i as f64) * 0.7).sin() * 7.1).collect();
        let signals: Vec<SignalAction> = (0..200)
            .map(|i| match i % 7 {
                0 => Buy,
                3 => Sell,
                _ => Hold,
            })
            .collect();
        let prices = series(&closes);
        let result = PortfolioSimulator::run(&prices, &signals, 1_000.0).unwrap();

        let mut state = PortfolioState::new(1_000.0);
        for trade in &result.trades {
            match trade.action {
                TradeAction::Buy => {
                    state.cash -= trade.amount;
                    state.shares_held += trade.shares;
                }
                TradeAction::Sell => {
                    state.cash += trade.amount;
                    state.shares_held -= trade.shares;
                }
            }
            assert!(state.cash >= 0.0);
        }
        assert!(result.final_state.cash >= 0.0);
    }

    #[test]
    fn trades_alternate_buy_then_sell() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + (i % 9) as f64).collect();
        let signals: Vec<SignalAction> = (0..100)
            .map(|i| match i % 5 {
                0 | 1 => Buy,
                2 | 3 => Sell,
                _ => Hold,
            })
            .collect();
        let result = PortfolioSimulator::run(&series(&closes), &signals, 10_000.0).unwrap();
        assert_eq!(result.trades[0].action, TradeAction::Buy);
        assert!(result
            .trades
            .windows(2)
            .all(|pair| pair[0].action != pair[1].action));
    }

    #[test]
    fn replay_reproduces_value_history() {
        let closes: Vec<f64> = (0..60).map(|i| 20.0 + ((i as f64) / 4.0).cos() * 3.0).collect();
        let signals: Vec<SignalAction> = (0..60)
            .map(|i| match i % 10 {
                1 => Buy,
                6 => Sell,
                _ => Hold,
            })
            .collect();
        let prices = series(&closes);
        let result = PortfolioSimulator::run(&prices, &signals, 2_500.0).unwrap();
        let replayed = PortfolioSimulator::replay(&prices, &result.trades, 2_500.0).unwrap();
        assert_eq!(replayed, result.value_history);
    }

    #[test]
    fn replay_rejects_trades_outside_series() {
        let prices = series(&[10.0, 11.0]);
        let stray = Trade {
            date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            action: TradeAction::Buy,
            price: 10.0,
            shares: 1,
            amount: 10.0,
        };
        let err = PortfolioSimulator::replay(&prices, &[stray], 100.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalConsistency);
    }
}
