pub mod backtester;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod indicators;
pub mod models;
pub mod param_utils;
pub mod performance;
pub mod price_client;
pub mod rate_limiter;
pub mod retry;
pub mod simulator;
pub mod strategy;
pub mod strategy_utils;
