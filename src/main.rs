//! cyclescan - dry-run cyclic swap route scanner
//!
//! Run with: cargo run -- --config config.toml
//!
//! Polls quote backends for closed token cycles (A→B→A, A→B→C→A), prices
//! the outcome net of gas and a slippage buffer, and appends every
//! evaluation to a daily JSONL file. Observation only: no keys, no
//! transactions, nothing is ever sent on-chain.

use clap::Parser;
use color_eyre::eyre::Result;
use console::style;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod amounts;
mod config;
mod gas_oracle;
mod orchestrator;
mod pipeline;
mod pricing;
mod quote;
mod routes;
mod sink;

use config::{Config, QuoteSource};
use orchestrator::Orchestrator;
use quote::{OneinchQuoteProvider, QuoteProvider, UniswapV3QuoteProvider};

#[derive(Parser, Debug)]
#[command(name = "cyclescan", about = "Dry-run cyclic swap route scanner")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🔄 CYCLESCAN - Cyclic Route Quote Scanner (dry-run)").cyan().bold()
    );
    println!(
        "{}",
        style("    loop2 / triangle3 | 1inch + Uniswap V3 | JSONL audit log").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cyclescan=info".parse()?),
        )
        .init();

    print_banner();

    let args = Args::parse();
    dotenvy::dotenv().ok();

    let mut config = Config::from_file(&args.config)?;
    config.apply_env_overrides();

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Fix {} (or run init-config for a starter file)", args.config);
        return Err(e);
    }

    config.print_summary();
    println!();

    let provider: Arc<dyn QuoteProvider> = match config.quote_source {
        QuoteSource::Oneinch => Arc::new(OneinchQuoteProvider::new(&config)?),
        QuoteSource::Uniswap => Arc::new(UniswapV3QuoteProvider::new(&config)?),
    };

    let mut orchestrator = Orchestrator::new(config, provider)?;
    orchestrator.run().await
}
