use anyhow::{Context, Result};
use atr_trader::api::{ExchangeGateway, GmoClient};
use atr_trader::config::{load_config, AppConfig};
use atr_trader::cycle::TradingCycle;
use atr_trader::execution::TradingEngine;
use atr_trader::prediction::LinearPredictor;
use atr_trader::recorder::CsvRecorder;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::time::{interval_at, Instant};

#[derive(Parser, Debug)]
#[command(name = "atr-trader", version, about = "ATR limit-order trader for GMO Coin spot")]
struct Cli {
    /// TOML configuration file (defaults to ./atr-trader.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate on the clock-aligned schedule
    Run {
        /// Evaluate once right away before waiting for the schedule
        #[arg(long)]
        immediate: bool,
        /// Evaluate a single time and exit
        #[arg(long)]
        once: bool,
    },
    /// Print balances, instrument constraints and resting orders
    Status,
    /// Cancel every resting order for the configured symbol
    Cancel,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(config = ?config, "Configuration loaded");

    if !config.has_credentials() {
        anyhow::bail!("GMO_API_KEY and GMO_SECRET_KEY must be set");
    }

    let client = GmoClient::new(config.exchange.clone()).context("Failed to build GMO client")?;

    match cli.command {
        Command::Run { immediate, once } => run(client, config, immediate, once).await,
        Command::Status => status(&client, &config).await,
        Command::Cancel => cancel(&client, &config).await,
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("atr_trader=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(client: GmoClient, config: AppConfig, immediate: bool, once: bool) -> Result<()> {
    let predictor = LinearPredictor::from_config(&config.predictor).context("Invalid predictor weights")?;
    let engine = TradingEngine::new(client.clone(), config.strategy.clone()).await;

    let mut cycle = TradingCycle::new(client, engine, Box::new(predictor), config.market_data.clone());
    if config.recorder.enabled {
        cycle = cycle.with_recorder(Box::new(CsvRecorder::from_config(&config.recorder)));
    }

    tracing::info!(
        symbol = %config.strategy.symbol,
        mode = ?config.strategy.mode,
        long_threshold = config.strategy.long_threshold,
        short_threshold = config.strategy.short_threshold,
        atr_ratio = config.strategy.atr_ratio,
        equity_fraction = config.strategy.equity_fraction,
        "ATR trader starting"
    );

    if immediate || once {
        evaluate(&mut cycle).await;
        if once {
            return Ok(());
        }
    }

    let delay = config.schedule.delay_until_next(Utc::now());
    let period = config
        .schedule
        .period()
        .to_std()
        .context("Schedule period out of range")?;
    tracing::info!(
        next_run = %config.schedule.next_run(Utc::now()),
        interval_minutes = config.schedule.interval_minutes,
        offset_secs = config.schedule.offset_secs,
        "Waiting for next scheduled evaluation"
    );

    // Runs are awaited in this task, so they never overlap; ticks missed
    // during a slow run are skipped
    let mut ticker = interval_at(Instant::now() + delay, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                evaluate(&mut cycle).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Run one evaluation; failures are logged and the schedule carries on
async fn evaluate(cycle: &mut TradingCycle<GmoClient, GmoClient>) {
    if let Err(e) = cycle.run_once().await {
        tracing::error!(error = %e, "Evaluation failed");
    }
}

async fn status(client: &GmoClient, config: &AppConfig) -> Result<()> {
    let symbol = &config.strategy.symbol;

    let account = client.fetch_balance().await.context("Failed to fetch balance")?;
    for asset in [&config.strategy.quote_asset, &config.strategy.base_asset] {
        println!(
            "{:<6} available: {}",
            asset,
            account
                .available(asset)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    let constraints = client
        .fetch_instrument_constraints(symbol)
        .await
        .context("Failed to fetch instrument constraints")?;
    println!(
        "{} min_order_size={} size_step={} tick_size={}",
        symbol, constraints.min_order_size, constraints.size_step, constraints.tick_size
    );

    let orders = client
        .fetch_active_orders(symbol)
        .await
        .context("Failed to fetch active orders")?;
    if orders.is_empty() {
        println!("No resting orders");
    }
    for order in orders {
        println!(
            "  {} {} {} @ {}",
            order.order_id, order.side, order.size, order.price
        );
    }
    Ok(())
}

async fn cancel(client: &GmoClient, config: &AppConfig) -> Result<()> {
    let symbol = &config.strategy.symbol;
    let cancelled = client
        .cancel_all_orders(symbol)
        .await
        .context("Failed to cancel orders")?;
    tracing::info!(symbol = %symbol, cancelled, "Cancelled resting orders");
    Ok(())
}
