use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failures surfaced by the price provider transport and payload parsing.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("price provider kept rate limiting after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("symbol {0} was not found by the price provider")]
    NotFound(String),

    #[error("request to price provider failed: {0}")]
    Transport(String),

    #[error("unexpected price provider payload: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        FetchError::Transport(error.to_string())
    }
}

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("{0}")]
    Configuration(String),

    #[error("no price data available for {symbol} between {start} and {end}")]
    DataUnavailable {
        symbol: String,
        start: String,
        end: String,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("internal consistency check failed: {0}")]
    InternalConsistency(String),

    #[error("backtest was cancelled: {0}")]
    Cancelled(String),
}

impl BacktestError {
    pub fn configuration(message: impl Into<String>) -> Self {
        BacktestError::Configuration(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BacktestError::Configuration(_) => ErrorKind::Configuration,
            BacktestError::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            BacktestError::Fetch(FetchError::Parse(_)) => ErrorKind::DataParse,
            BacktestError::Fetch(_) => ErrorKind::DataFetch,
            BacktestError::InternalConsistency(_) => ErrorKind::InternalConsistency,
            BacktestError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}

/// Coarse error category reported across the public boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Configuration,
    DataUnavailable,
    DataFetch,
    DataParse,
    InternalConsistency,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::DataFetch => "data_fetch",
            ErrorKind::DataParse => "data_parse",
            ErrorKind::InternalConsistency => "internal_consistency",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
