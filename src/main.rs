//! Solana Copy-Trading Bot
//!
//! Watches a fixed set of wallets, mirrors their qualifying swaps with a
//! small fixed investment, and manages each resulting position with tiered
//! take-profit and a trailing stop-loss.

mod api;
mod bot;
mod db;
mod models;
mod trading;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::bot::{Bot, BotConfig};
use crate::db::Database;
use crate::trading::StrategyConfig;

/// Solana copy-trading bot CLI.
#[derive(Parser)]
#[command(name = "solcopier")]
#[command(about = "Copy trades from monitored Solana wallets", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "sqlite:./solcopier.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a wallet to monitor
    Watch {
        /// Label used in logs
        tag: String,

        /// Wallet address (base58)
        address: String,
    },

    /// Stop monitoring a wallet
    Unwatch {
        /// Wallet address (base58)
        address: String,
    },

    /// List monitored wallets
    List,

    /// Start the copy-trading bot
    Run {
        /// Polling interval in seconds
        #[arg(short, long, default_value = "30")]
        interval: u64,

        /// Transactions requested per wallet per poll
        #[arg(short, long, default_value = "10")]
        feed_limit: u32,

        /// Dry run (don't execute swaps)
        #[arg(long)]
        dry_run: bool,
    },

    /// Show current configuration
    Config,

    /// Show bot status and statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Initialize database
    let db = Database::new(&cli.database).await?;

    match cli.command {
        Commands::Watch { tag, address } => {
            db.save_wallet(&tag, &address).await?;
            println!("Now monitoring: {} ({})", tag, address);
        }

        Commands::Unwatch { address } => {
            if db.remove_wallet(&address).await? {
                println!("Stopped monitoring: {}", address);
            } else {
                println!("Wallet was not monitored: {}", address);
            }
        }

        Commands::List => {
            let wallets = db.get_wallets().await?;

            if wallets.is_empty() {
                println!("No wallets monitored. Use 'solcopier watch <tag> <address>' to add one.");
                return Ok(());
            }

            println!("\n{:<16} {}", "TAG", "ADDRESS");
            println!("{}", "-".repeat(62));
            for wallet in wallets {
                println!("{:<16} {}", wallet.tag, wallet.address);
            }
        }

        Commands::Run {
            interval,
            feed_limit,
            dry_run,
        } => {
            info!(
                interval = interval,
                dry_run = dry_run,
                "Starting copy-trading bot"
            );

            // Check for monitored wallets first
            let wallets = db.get_wallets().await?;
            if wallets.is_empty() {
                println!("No wallets monitored. Use 'solcopier watch <tag> <address>' first.");
                return Ok(());
            }

            let bot_config = BotConfig {
                poll_interval_secs: interval,
                feed_limit,
                dry_run,
                strategy_config: StrategyConfig::default(),
                database_url: cli.database.clone(),
            };

            let mut bot = Bot::new(bot_config).await?;
            bot.initialize().await?;

            println!("\n=== Solana Copy-Trading Bot ===");
            println!("Polling interval: {}s", interval);
            println!(
                "Mode: {}",
                if dry_run {
                    "DRY RUN (no real swaps)"
                } else {
                    "LIVE TRADING"
                }
            );
            println!("Monitored wallets: {}", wallets.len());
            println!("\nPress Ctrl+C to stop.\n");

            if let Err(e) = bot.run().await {
                tracing::error!(error = %e, "Bot error");
            }

            // Show final stats
            let stats = bot.stats().await;
            println!("\n{}", stats);
        }

        Commands::Config => {
            let config = StrategyConfig::default();

            println!("\n=== Strategy Configuration ===\n");
            println!("Entry Rules:");
            println!("  Min Liquidity:        ${}", config.liquidity_min_usd);
            println!("  Min Daily Volume:     ${}", config.volume_min_usd);
            println!("  Max Trades Per Day:   {}", config.max_trades_per_day);
            println!("  Investment Per Trade: ${}", config.investment_per_trade_usd);
            println!("  Slippage:             {}%", config.slippage_percent);

            println!("\nExit Rules:");
            let levels: Vec<String> = config
                .take_profit_levels
                .iter()
                .map(|l| format!("{}x", l))
                .collect();
            println!("  Take-Profit Levels:   {}", levels.join(", "));
            println!(
                "  Stop-Loss:            {}% below peak",
                config.stop_loss_fraction * rust_decimal_macros::dec!(100)
            );
            println!(
                "  Mirror Partial Sell:  {}%",
                config.mirror_partial_fraction * rust_decimal_macros::dec!(100)
            );

            println!("\nBudget Policy:");
            println!("  Refund Failed Trades: {}", config.refund_failed_trades);
        }

        Commands::Status => {
            let wallets = db.get_wallets().await?;
            let positions = db.get_open_positions().await?;
            let (total, executed, failed) = db.copy_trade_stats().await?;
            let budget = db.load_budget().await?;

            println!("\n=== Bot Status ===");
            println!("Monitored Wallets: {}", wallets.len());
            println!("Open Positions:    {}", positions.len());
            println!(
                "Total Trades:      {} (Executed: {}, Failed: {})",
                total, executed, failed
            );

            match budget {
                Some((day, count)) => {
                    println!("Budget:            {} trades on {}", count, day);
                }
                None => println!("Budget:            no trades recorded yet"),
            }

            if !positions.is_empty() {
                println!("\n=== Open Positions ===");
                for pos in &positions {
                    println!(
                        "  {} | entry {:.6} peak {:.6} | size {:.4}",
                        truncate(&pos.token, 20),
                        pos.buy_price,
                        pos.highest_price_seen,
                        pos.size_remaining
                    );
                }
            }

            let recent = db.get_recent_copy_trades(5).await?;
            if !recent.is_empty() {
                println!("\n=== Recent Copy Trades ===");
                for trade in &recent {
                    println!(
                        "  {} {} -> {} | {} {}",
                        trade.created_at,
                        truncate(&trade.token_in, 12),
                        truncate(&trade.token_out, 12),
                        trade.status,
                        trade.tx_hash.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }

    Ok(())
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
