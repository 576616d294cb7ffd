use anyhow::Result;
use backtest_engine::{
    commands::{backtest, strategies},
    context::AppContext,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "backtest-engine")]
#[command(about = "Backtest single-symbol trading strategies on daily price history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch history for a symbol, run a strategy over it and print the report as JSON
    Backtest {
        /// Ticker symbol, e.g. AAPL
        symbol: String,
        /// First day of the range (YYYY-MM-DD)
        #[arg(long = "start", value_name = "DATE")]
        start_date: NaiveDate,
        /// Last day of the range, inclusive (YYYY-MM-DD)
        #[arg(long = "end", value_name = "DATE")]
        end_date: NaiveDate,
        /// Strategy name (see the `strategies` command)
        #[arg(long, default_value = "sma_crossover")]
        strategy: String,
        /// Starting cash
        #[arg(long = "capital", default_value_t = 10_000.0)]
        initial_capital: f64,
        /// Strategy parameter as key=value; repeatable
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Strategy parameters as a JSON object
        #[arg(long = "params-json", value_name = "JSON")]
        params_json: Option<String>,
        /// Abandon the run after this many seconds
        #[arg(long = "timeout-secs", value_name = "SECS")]
        timeout_secs: Option<u64>,
    },
    /// List available strategies and their parameters as JSON
    Strategies,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { command } = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match command {
        Commands::Backtest {
            symbol,
            start_date,
            end_date,
            strategy,
            initial_capital,
            params,
            params_json,
            timeout_secs,
        } => {
            let app_context = AppContext::from_env()?;
            info!("Starting backtest engine. Not financial advice.");
            backtest::run(
                &app_context,
                backtest::BacktestArgs {
                    symbol,
                    start_date,
                    end_date,
                    strategy,
                    initial_capital,
                    params,
                    params_json,
                    timeout: timeout_secs.map(Duration::from_secs),
                },
            )
            .await?;
        }
        Commands::Strategies => {
            strategies::run()?;
        }
    }

    Ok(())
}
