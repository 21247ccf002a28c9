mod config;
mod engine;
mod error;
mod indicators;
mod market;
mod ml;
mod types;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::AppConfig;
use engine::{run_check, SignalPipeline};
use market::{create_market_data, MarketData};
use ml::ModelLoader;

#[derive(Parser)]
#[command(name = "signal-forward-test")]
#[command(version = "0.1.0")]
#[command(about = "Forward-test and live inference for buy/sell/hold signal models", long_about = None)]
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
    /// Build the labeled forward-test dataset for a date range
    Prepare {
        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        start: String,
        /// End date (YYYY-MM-DD), inclusive
        #[arg(short, long)]
        end: String,
    },
    /// Evaluate the trained model against the prepared dataset
    ForwardTest,
    /// Predict a signal for the most recent bar
    Live {
        /// Print the prediction as JSON
        #[arg(long)]
        json: bool,
    },
    /// Prepare, forward test and run live inference, exiting non-zero on failure
    Check {
        #[arg(short, long, default_value = "2024-06-01")]
        start: String,
        #[arg(short, long, default_value = "2024-06-10")]
        end: String,
    },
    /// Validate a model/scaler pair and copy it to the configured artifact paths
    ImportModel {
        /// Path to the model JSON
        #[arg(short, long)]
        model: String,
        /// Path to the scaler JSON
        #[arg(short, long)]
        scaler: String,
    },
    /// Write the default configuration as TOML
    InitConfig {
        #[arg(short, long, default_value = "config.toml")]
        output: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::InitConfig { output } = &cli.command {
        let rendered = AppConfig::default().to_toml()?;
        std::fs::write(output, rendered).with_context(|| format!("Failed to write {}", output))?;
        info!("Default configuration written to {}", output);
        return Ok(());
    }

    let config = AppConfig::load(Some(Path::new(&cli.config)))?;

    if let Commands::ImportModel { model, scaler } = &cli.command {
        let target = ModelLoader::from_paths(&config.artifacts);
        target.import_from(&ModelLoader::new(model, scaler))?;
        return Ok(());
    }

    let market: Arc<dyn MarketData> = Arc::from(create_market_data(&config.market));
    info!("Market data: {} ({})", market.describe(), config.market.timeframe);
    let mut pipeline = SignalPipeline::new(&config, market);

    match cli.command {
        Commands::Prepare { start, end } => {
            let (start, end) = (parse_date(&start)?, parse_date(&end)?);
            let summary = pipeline.prepare_forward_test_data(start, end).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::ForwardTest => match pipeline.run_forward_test() {
            Ok(metrics) => metrics.print_summary(),
            Err(e) if e.is_skip() => warn!("Forward test skipped: {}", e),
            Err(e) => return Err(e.into()),
        },
        Commands::Live { json } => match pipeline.run_live_inference().await {
            Ok(prediction) if json => println!("{}", serde_json::to_string_pretty(&prediction)?),
            Ok(prediction) => {
                println!("Signal:     {}", prediction.prediction);
                println!("Confidence: {:.2}%", prediction.confidence * 100.0);
                println!("Bar:        {}", prediction.bar_time);
                println!("Price:      {}", prediction.current_price);
                for (class, probability) in &prediction.probabilities {
                    println!("  P({:<4})          {:.4}", class.as_str(), probability);
                }
                for (name, value) in prediction.indicators.iter() {
                    println!("  {:<16} {:.6}", name, value);
                }
            }
            Err(e) if e.is_skip() => warn!("Live inference skipped: {}", e),
            Err(e) => return Err(e.into()),
        },
        Commands::Check { start, end } => {
            let report = run_check(&mut pipeline, &config.artifacts, parse_date(&start)?, parse_date(&end)?).await;
            report.print_summary();
            if !report.passed() {
                std::process::exit(1);
            }
        }
        Commands::ImportModel { .. } | Commands::InitConfig { .. } => {}
    }

    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))
}
