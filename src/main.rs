//! Apes.Win dice bot CLI
//!
//! Plays the dice contract with a single wallet from `PRIVATE_KEY`.

use anyhow::{Context, Result};
use apeswin_bot::services::{ContractGateway, RpcGateway};
use apeswin_bot::session::{SessionRegistry, SessionStats};
use apeswin_bot::units::{format_bananas, format_native, format_signed_units, TOKEN_DECIMALS, TOKEN_DISPLAY_DP};
use apeswin_bot::wallet::Wallet;
use apeswin_bot::Config;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Identity used for the single CLI session
const CLI_IDENTITY: &str = "cli";

#[derive(Parser)]
#[command(name = "apeswin-bot")]
#[command(about = "Adaptive wager bot for the Apes.Win dice game")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Play until Ctrl+C (the round in flight always finishes)
    Run,

    /// Show token and native balances for PRIVATE_KEY
    Balance,

    /// Print the effective configuration
    Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; --verbose overrides RUST_LOG
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::from_env()?;

    match cli.command {
        Commands::Run => run_bot(config).await?,
        Commands::Balance => show_balance(&config).await?,
        Commands::Settings => show_settings(&config),
    }

    Ok(())
}

fn private_key(config: &Config) -> Result<&str> {
    config
        .private_key
        .as_deref()
        .context("PRIVATE_KEY is not set (add it to .env or the environment)")
}

async fn run_bot(config: Config) -> Result<()> {
    let key = private_key(&config)?.to_string();
    let gateway = Arc::new(RpcGateway::new(config.chain.clone(), config.lifecycle.receipt_timeout)?);

    println!("\n{}", "=".repeat(70));
    println!("  APES.WIN DICE BOT");
    println!(
        "  Chain: {} | Contract: {:?}",
        config.chain.chain_id, config.chain.contract_address
    );
    println!(
        "  Bet range: {:.0}% - {:.0}% of balance | Safety threshold: {}",
        config.wager.min_bet_pct * 100.0,
        config.wager.max_bet_pct * 100.0,
        format_bananas(config.wager.safety_threshold)
    );
    println!("{}\n", "=".repeat(70));

    let registry = SessionRegistry::new(gateway, config);
    let address = registry.update_credential(CLI_IDENTITY, &key).await?;
    println!("Wallet: {}", address.to_checksum(None));

    registry.start(CLI_IDENTITY).await?;
    println!("Playing (Ctrl+C to stop)...\n");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Stop requested, waiting for the current round to finish...");
    registry.stop(CLI_IDENTITY).await?;
    registry.shutdown().await;

    let stats = registry.snapshot(CLI_IDENTITY).await?;
    print_summary(&stats);
    Ok(())
}

async fn show_balance(config: &Config) -> Result<()> {
    let wallet = Wallet::from_private_key(private_key(config)?)?;
    let gateway = RpcGateway::new(config.chain.clone(), config.lifecycle.receipt_timeout)?;

    let token = gateway.token_balance(wallet.address()).await?;
    let native = gateway.native_balance(wallet.address()).await?;

    println!("\nWallet:  {}", wallet.address_string());
    println!("BANANAS: {}", format_bananas(token));
    println!("S:       {}", format_native(native));

    let needed = config.chain.max_native_cost();
    if native < needed {
        println!(
            "{}",
            format!("Native balance below one bet's gas + fee ({})", format_native(needed)).yellow()
        );
    }
    Ok(())
}

fn show_settings(config: &Config) {
    let c = &config.chain;
    let w = &config.wager;
    let l = &config.lifecycle;

    println!("\n{}", "=".repeat(70));
    println!("  EFFECTIVE SETTINGS");
    println!("{}", "=".repeat(70));
    println!("  RPC URL:            {}", c.rpc_url);
    println!("  Contract:           {:?}", c.contract_address);
    println!("  Chain ID:           {}", c.chain_id);
    println!("  Gas price / limit:  {} wei / {}", c.gas_price, c.gas_limit);
    println!("  Bet value:          {} S", format_native(c.bet_value));
    println!("  Approval required:  {}", c.approval_required);
    println!("{}", "-".repeat(70));
    println!("  Min / max bet:      {:.1}% / {:.1}%", w.min_bet_pct * 100.0, w.max_bet_pct * 100.0);
    println!("  Safety threshold:   {}", format_bananas(w.safety_threshold));
    println!("  Win rate:           {}", w.win_rate);
    println!("  Recovery rate:      {}", w.recovery_rate);
    println!("  Chase:              x{} after {} rounds", w.chase_multiplier, w.chase_threshold);
    println!("  Sensitivity (w/l):  {} / {}", w.win_sensitivity, w.loss_sensitivity);
    println!("  Tracked rounds:     {}", w.max_tracked_rounds);
    println!("  Pattern win boost:  x{}", w.pattern_win_boost);
    println!("{}", "-".repeat(70));
    println!("  Ordering timeout:   {:?}", l.ordering_timeout);
    println!("  Settlement timeout: {:?} (poll {:?})", l.settlement_timeout, l.poll_interval);
    println!("  Receipt timeout:    {:?}", l.receipt_timeout);
    println!("  Round delay:        {:?}", config.session.round_delay);
    println!();
}

fn print_summary(stats: &SessionStats) {
    let profit = stats.session_profit();
    let profit_str = format_signed_units(profit, TOKEN_DECIMALS, TOKEN_DISPLAY_DP);

    println!("\n{}", "=".repeat(70));
    println!("  SESSION SUMMARY");
    println!("{}", "=".repeat(70));
    println!(
        "  Games: {} | Wins: {} | Losses: {} | Win rate: {:.1}%",
        stats.total_games,
        stats.total_wins,
        stats.total_losses,
        stats.win_rate()
    );
    println!(
        "  Timed out: {} | Failed: {}",
        stats.timed_out_rounds, stats.failed_rounds
    );
    println!(
        "  Balance: {} (start {}, high {})",
        format_bananas(stats.current_balance),
        format_bananas(stats.starting_balance),
        format_bananas(stats.all_time_high)
    );
    if profit >= 0 {
        println!("  Profit: {}", profit_str.green());
    } else {
        println!("  Profit: {}", profit_str.red());
    }

    if !stats.recent_games.is_empty() {
        println!("{}", "-".repeat(70));
        for game in &stats.recent_games {
            let line = game.to_string();
            if game.won {
                println!("  {}", line.green());
            } else {
                println!("  {}", line.red());
            }
        }
    }
    if let Some(err) = &stats.last_error {
        println!("  Last error: {}", err.yellow());
    }
    println!();
}
