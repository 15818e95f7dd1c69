mod types;
mod analytics;
mod config;
mod data;
mod ml;
mod scoring;
mod client;
mod web;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use client::TimingClient;
use crate::config::AppConfig;
use data::{CsvRateStore, RateSource};
use ml::{train_model, ModelHandle};
use types::{CurrencyPair, TimingOutcome};
use web::{start_server, AppState};

#[derive(Parser)]
#[command(name = "fx-timing")]
#[command(version = "0.1.0")]
#[command(about = "Market-timing scores for currency transfers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scoring service
    Serve,
    /// Train a model artifact from the rates snapshot
    Train,
    /// Score one corridor from the command line
    Score {
        /// Source currency code (e.g. EUR)
        from: String,
        /// Target currency code (e.g. USD)
        to: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Serve => run_service(config).await?,
        Commands::Train => run_training(config)?,
        Commands::Score { from, to } => run_score(config, &from, &to).await?,
    }

    Ok(())
}

async fn run_service(config: AppConfig) -> Result<()> {
    let store = CsvRateStore::load(&config.data.rates_csv)?;

    let model = ModelHandle::new(&config.data.model_dir);
    if let Err(e) = model.reload().await {
        warn!("model load failed, serving percentile fallback only: {e:#}");
    }

    let state = AppState {
        config: Arc::new(config),
        model,
        rates: Arc::new(store),
    };
    start_server(state).await
}

fn run_training(config: AppConfig) -> Result<()> {
    let store = CsvRateStore::load(&config.data.rates_csv)?;
    let corridors = store.corridors();

    let artifact = train_model(&corridors, &config.training, Utc::now().date_naive())?;
    let path = artifact.save(&config.data.model_dir)?;

    info!("training complete, artifact at {}", path.display());
    Ok(())
}

async fn run_score(config: AppConfig, from: &str, to: &str) -> Result<()> {
    let Some(pair) = CurrencyPair::new(from, to) else {
        return Err(anyhow::anyhow!("invalid currency pair {from:?}/{to:?}"));
    };

    let store = CsvRateStore::load(&config.data.rates_csv)?;
    let series = store.series_for(&pair).await?;

    let client = TimingClient::new(&config.inference)?;
    let outcome = client
        .score_with_fallback(&pair, series.as_ref(), &config.scoring)
        .await;

    match outcome {
        TimingOutcome::Scored { path, result } => {
            println!("\n=== {} ===", pair);
            println!("Timing score: {:.2} ({})", result.score, path.as_str());
            println!("Recommendation: {}", result.recommendation);
            println!("Reasoning: {}", result.reasoning);
            let insights = &result.market_insights;
            println!(
                "2-month range: {:.4} to {:.4} (avg {:.4})",
                insights.two_month_low, insights.two_month_high, insights.two_month_avg
            );
            println!(
                "1-year trend: {} | Volatility: {}",
                insights.one_year_trend, insights.volatility
            );
        }
        TimingOutcome::Unavailable { reason } => {
            println!("\nTiming score unavailable for {}: {}", pair, reason);
        }
    }

    Ok(())
}
