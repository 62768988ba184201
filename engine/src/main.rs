// Trader entry point: paper trading over CSV candle history
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::config::TraderSettings;
use engine::data::market_data::MarketDataStore;
use engine::ledger::CloseAllSummary;
use engine::services::{PaperExchange, TradingBot};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Parser)]
#[command(name = "trader")]
#[command(about = "Multi-timeframe signal scoring and paper trading bot", long_about = None)]
struct Cli {
    /// JSON settings file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding <SYMBOL>_<timeframe>.csv candle files
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a coin on every configured timeframe
    Analyze {
        /// Coin or pair symbol (e.g., btc, ETHUSDT)
        #[arg(long)]
        coin: String,
    },

    /// Run the decision loop until Ctrl-C, then close all positions and report
    Run {
        /// Coins to trade; configured symbols when omitted
        #[arg(long, num_args = 1..)]
        coins: Vec<String>,

        /// Number of most recent trades printed on exit
        #[arg(long, default_value = "50")]
        trades: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let settings = TraderSettings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let store = MarketDataStore::load_dir(&cli.data_dir)
        .with_context(|| format!("Failed to load candles from {}", cli.data_dir.display()))?;
    info!(symbols = ?store.symbols(), data_dir = %cli.data_dir.display(), "Market data loaded");

    let exchange = PaperExchange::new(Arc::new(RwLock::new(store)), settings.paper.initial_balance);
    let bot = TradingBot::new(settings, Arc::new(exchange));

    match cli.command {
        Commands::Analyze { coin } => {
            let scores = bot.analyze(&coin).await;
            println!(
                "{:<5} {:>7} {:>8} {:>8} {:>8} {:>8} {:>10} {:>9}",
                "TF", "SAMPLES", "PRICE", "VOLUME", "RSI", "RSI_N", "VOLATILITY", "COMBINED"
            );
            for (timeframe, score) in &scores {
                let c = &score.components;
                println!(
                    "{:<5} {:>7} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>10.2} {:>9.2}",
                    timeframe.label(),
                    score.samples,
                    c.price,
                    c.volume,
                    c.rsi,
                    c.rsi_normalized,
                    c.volatility,
                    score.combined
                );
            }
        }
        Commands::Run { coins, trades } => {
            let symbols = bot.start(&coins).await?;
            println!("Trading {} (Ctrl-C to stop)", symbols.join(", "));
            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;

            info!("Shutdown requested");
            let summary = bot.stop().await?;
            print_close_summary(&summary);

            let recent = bot.recent_trades(trades).await;
            if recent.is_empty() {
                println!("No trades recorded");
            }
            for trade in recent {
                println!("{}", serde_json::to_string(&trade)?);
            }
            println!("{}", serde_json::to_string_pretty(&bot.status().await)?);
        }
    }

    Ok(())
}

fn print_close_summary(summary: &CloseAllSummary) {
    if summary.results.is_empty() {
        println!("No open positions to close");
        return;
    }
    for (symbol, receipt) in summary.closed() {
        println!(
            "Closed {:<10} qty={:.6} entry={:.4} exit={:.4} pnl={:.4} ({:+.2}%)",
            symbol, receipt.quantity, receipt.entry_price, receipt.exit_price, receipt.realized_pnl, receipt.pnl_pct
        );
    }
    for (symbol, error) in summary.failed() {
        println!("FAILED {:<10} {}", symbol, error);
    }
    println!("Total realized P&L: {:.4}", summary.total_pnl());
}
