use crate::indicators::IndicatorValue;
use crate::models::SignalAction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a bar received its signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalReason {
    /// Indicators needed for a decision are not available yet.
    Warmup,
    /// Indicators are available but nothing crossed.
    NoCrossover,
    Crossover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainedSignal {
    pub action: SignalAction,
    pub reason: SignalReason,
}

pub fn hold_warmup() -> ExplainedSignal {
    ExplainedSignal {
        action: SignalAction::Hold,
        reason: SignalReason::Warmup,
    }
}

pub fn hold_no_crossover() -> ExplainedSignal {
    ExplainedSignal {
        action: SignalAction::Hold,
        reason: SignalReason::NoCrossover,
    }
}

pub fn crossover(action: SignalAction) -> ExplainedSignal {
    ExplainedSignal {
        action,
        reason: SignalReason::Crossover,
    }
}

/// Series moved from at-or-below `threshold` to strictly above it.
pub fn crossed_above(previous: f64, current: f64, threshold: f64) -> bool {
    previous <= threshold && current > threshold
}

/// Series moved from at-or-above `threshold` to strictly below it.
pub fn crossed_below(previous: f64, current: f64, threshold: f64) -> bool {
    previous >= threshold && current < threshold
}

/// Both values, when both indicators are available.
pub fn both_available(first: IndicatorValue, second: IndicatorValue) -> Option<(f64, f64)> {
    match (first, second) {
        (IndicatorValue::Available(a), IndicatorValue::Available(b)) => Some((a, b)),
        _ => None,
    }
}

/// Calendar days between two dates, never negative.
pub fn calculate_period_days(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return 0;
    }
    (end - start).num_days()
}
