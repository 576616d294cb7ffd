use crate::context::AppContext;
use crate::models::BacktestRequest;
use crate::param_utils::{parse_parameter_map, parse_parameter_pairs};
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use log::info;
use std::collections::HashMap;
use std::time::Duration;

pub struct BacktestArgs {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub strategy: String,
    pub initial_capital: f64,
    pub params: Vec<String>,
    pub params_json: Option<String>,
    pub timeout: Option<Duration>,
}

/// Merges `--params-json` with `--param key=value` pairs; pairs win on conflict.
pub fn resolve_parameters(
    params_json: Option<&str>,
    pairs: &[String],
) -> Result<HashMap<String, f64>> {
    let mut parameters = match params_json {
        Some(json) => parse_parameter_map(json)?,
        None => HashMap::new(),
    };
    parameters.extend(parse_parameter_pairs(pairs)?);
    Ok(parameters)
}

pub async fn run(app: &AppContext, args: BacktestArgs) -> Result<()> {
    let parameters = resolve_parameters(args.params_json.as_deref(), &args.params)?;
    let request = BacktestRequest {
        symbol: args.symbol,
        start_date: args.start_date,
        end_date: args.end_date,
        strategy: args.strategy,
        initial_capital: args.initial_capital,
        parameters,
    };
    info!(
        "Received backtest command for {} ({} to {}) with strategy {}",
        request.symbol, request.start_date, request.end_date, request.strategy
    );

    let backtester = app.backtester();
    let outcome = match args.timeout {
        Some(deadline) => backtester.run_with_deadline(&request, deadline).await,
        None => backtester.run(&request).await,
    };

    let json =
        serde_json::to_string_pretty(&outcome).context("failed to serialize backtest outcome")?;
    println!("{}", json);

    match outcome.failure() {
        Some(failure) => Err(anyhow!(
            "backtest failed ({}): {}",
            failure.kind,
            failure.message
        )),
        None => Ok(()),
    }
}
