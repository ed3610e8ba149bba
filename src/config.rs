//! Configuration management for the dice bot

use crate::services::retry::RetryConfig;
use alloy::primitives::Address;
use anyhow::{Context, Result};
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Bot configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Private key for the CLI session (optional, the server takes keys over the API)
    pub private_key: Option<String>,

    /// Ledger node and contract call surface
    pub chain: ChainConfig,

    /// Wager sizing tunables
    pub wager: WagerSettings,

    /// Submission and settlement bounds
    pub lifecycle: LifecycleConfig,

    /// Play loop pacing
    pub session: SessionConfig,

    /// Bind address for the JSON API
    pub server_addr: SocketAddr,
}

/// Chain endpoint and fixed transaction parameters
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Combined dice game + token contract
    pub contract_address: Address,
    pub chain_id: u64,
    /// Legacy gas price in wei
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Native value sent with every bet (the contract's randomness fee)
    pub bet_value: u128,
    /// Whether the contract must be approved as spender before betting
    pub approval_required: bool,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl ChainConfig {
    /// Worst-case native cost of one bet transaction
    pub fn max_native_cost(&self) -> u128 {
        self.gas_price
            .saturating_mul(self.gas_limit as u128)
            .saturating_add(self.bet_value)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://rpc.soniclabs.com".to_string(),
            contract_address: Address::from_str(DEFAULT_CONTRACT_ADDRESS).unwrap_or(Address::ZERO),
            chain_id: 146,
            gas_price: 55_000_000_000,
            gas_limit: 300_000,
            bet_value: 19_250_000_000_000_000,
            approval_required: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

const DEFAULT_CONTRACT_ADDRESS: &str = "0x40A94AB8Aac840Be65B22Ac857A78ac56447db5f";

/// Wager sizing settings (percentages are fractions of balance)
#[derive(Debug, Clone)]
pub struct WagerSettings {
    /// Smallest wager ever placed, in smallest units
    pub min_bet: u128,
    /// Below this balance no wager is placed
    pub safety_threshold: u128,
    pub min_bet_pct: f64,
    pub max_bet_pct: f64,
    /// Per-win increment of the win bonus
    pub win_rate: f64,
    /// Per-loss increment of the loss recovery
    pub recovery_rate: f64,
    /// Drought length at which chasing starts
    pub chase_threshold: u32,
    pub chase_multiplier: f64,
    pub win_sensitivity: f64,
    pub loss_sensitivity: f64,
    /// Window of the rolling win/loss ratio histories
    pub max_tracked_rounds: usize,
    /// Baseline scale after a bonus-pattern round (1.0 disables)
    pub pattern_win_boost: f64,
}

impl Default for WagerSettings {
    fn default() -> Self {
        Self {
            min_bet: 1,
            safety_threshold: 1000,
            min_bet_pct: 0.10,
            max_bet_pct: 0.25,
            win_rate: 0.2,
            recovery_rate: 0.15,
            chase_threshold: 15,
            chase_multiplier: 1.1,
            win_sensitivity: 0.5,
            loss_sensitivity: 0.5,
            max_tracked_rounds: 20,
            pattern_win_boost: 1.5,
        }
    }
}

impl WagerSettings {
    /// Range checks, run before anything touches the network
    pub fn validate(&self) -> Result<()> {
        let pct_ok = |v: f64| v.is_finite() && v > 0.0 && v <= 1.0;
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;

        if !pct_ok(self.min_bet_pct) || !pct_ok(self.max_bet_pct) {
            anyhow::bail!("MIN_BET_PCT and MAX_BET_PCT must be in (0, 1]");
        }
        if self.min_bet_pct > self.max_bet_pct {
            anyhow::bail!(
                "MIN_BET_PCT ({}) must not exceed MAX_BET_PCT ({})",
                self.min_bet_pct,
                self.max_bet_pct
            );
        }
        if self.min_bet == 0 {
            anyhow::bail!("MIN_BET_AMOUNT must be at least 1");
        }
        for (name, value) in [
            ("WIN_RATE", self.win_rate),
            ("RECOVERY_RATE", self.recovery_rate),
            ("WIN_SENSITIVITY", self.win_sensitivity),
            ("LOSS_SENSITIVITY", self.loss_sensitivity),
        ] {
            if !non_negative(value) {
                anyhow::bail!("{} must be a non-negative number", name);
            }
        }
        if !self.chase_multiplier.is_finite() || self.chase_multiplier < 1.0 {
            anyhow::bail!("CHASE_MULTIPLIER must be >= 1.0");
        }
        if !self.pattern_win_boost.is_finite() || self.pattern_win_boost < 1.0 {
            anyhow::bail!("PATTERN_WIN_BOOST must be >= 1.0");
        }
        if self.max_tracked_rounds < 3 {
            anyhow::bail!("MAX_TRACKED_ROUNDS must be at least 3");
        }
        Ok(())
    }
}

/// Bounds for one bet's submission and settlement
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How long to wait for an older game to be fulfilled before giving up
    pub ordering_timeout: Duration,
    /// Wall-clock budget for the submitted game to settle
    pub settlement_timeout: Duration,
    /// Interval between game-state polls
    pub poll_interval: Duration,
    /// How long to wait for a broadcast transaction's receipt
    pub receipt_timeout: Duration,
    /// Per-poll retry policy for transient RPC errors
    pub retry: RetryConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ordering_timeout: Duration::from_secs(60),
            settlement_timeout: Duration::from_secs(90),
            poll_interval: Duration::from_secs(2),
            receipt_timeout: Duration::from_secs(120),
            retry: RetryConfig::default(),
        }
    }
}

/// Play loop pacing
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause between rounds
    pub round_delay: Duration,
    /// Pause after a skipped cycle (balance below safety threshold)
    pub skip_delay: Duration,
    /// Pause after an unexpected cycle error
    pub error_cooldown: Duration,
    /// Number of rounds kept in the recent-rounds list
    pub recent_rounds: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            round_delay: Duration::from_secs(3),
            skip_delay: Duration::from_secs(10),
            error_cooldown: Duration::from_secs(5),
            recent_rounds: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            private_key: None,
            chain: ChainConfig::default(),
            wager: WagerSettings::default(),
            lifecycle: LifecycleConfig::default(),
            session: SessionConfig::default(),
            server_addr: SocketAddr::from(([0, 0, 0, 0], 5556)),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let private_key = env::var("PRIVATE_KEY").ok().filter(|s| !s.is_empty());

        let chain = ChainConfig {
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.chain.rpc_url),
            contract_address: env_or("CONTRACT_ADDRESS", defaults.chain.contract_address)?,
            chain_id: env_or("CHAIN_ID", defaults.chain.chain_id)?,
            gas_price: env_or("GAS_PRICE_WEI", defaults.chain.gas_price)?,
            gas_limit: env_or("GAS_LIMIT", defaults.chain.gas_limit)?,
            bet_value: env_or("BET_VALUE_WEI", defaults.chain.bet_value)?,
            approval_required: env_or("APPROVAL_REQUIRED", defaults.chain.approval_required)?,
            request_timeout: Duration::from_secs(env_or(
                "RPC_TIMEOUT_SECS",
                defaults.chain.request_timeout.as_secs(),
            )?),
        };

        let wager = WagerSettings {
            min_bet: env_or("MIN_BET_AMOUNT", defaults.wager.min_bet)?,
            safety_threshold: env_or("SAFETY_THRESHOLD", defaults.wager.safety_threshold)?,
            min_bet_pct: env_or("MIN_BET_PCT", defaults.wager.min_bet_pct)?,
            max_bet_pct: env_or("MAX_BET_PCT", defaults.wager.max_bet_pct)?,
            win_rate: env_or("WIN_RATE", defaults.wager.win_rate)?,
            recovery_rate: env_or("RECOVERY_RATE", defaults.wager.recovery_rate)?,
            chase_threshold: env_or("CHASE_THRESHOLD", defaults.wager.chase_threshold)?,
            chase_multiplier: env_or("CHASE_MULTIPLIER", defaults.wager.chase_multiplier)?,
            win_sensitivity: env_or("WIN_SENSITIVITY", defaults.wager.win_sensitivity)?,
            loss_sensitivity: env_or("LOSS_SENSITIVITY", defaults.wager.loss_sensitivity)?,
            max_tracked_rounds: env_or("MAX_TRACKED_ROUNDS", defaults.wager.max_tracked_rounds)?,
            pattern_win_boost: env_or("PATTERN_WIN_BOOST", defaults.wager.pattern_win_boost)?,
        };

        let retry = RetryConfig {
            max_retries: env_or("RPC_MAX_RETRIES", defaults.lifecycle.retry.max_retries)?,
            initial_delay: millis("RPC_RETRY_DELAY_MS", defaults.lifecycle.retry.initial_delay)?,
            ..defaults.lifecycle.retry
        };

        let lifecycle = LifecycleConfig {
            ordering_timeout: secs("ORDERING_TIMEOUT_SECS", defaults.lifecycle.ordering_timeout)?,
            settlement_timeout: secs("SETTLEMENT_TIMEOUT_SECS", defaults.lifecycle.settlement_timeout)?,
            poll_interval: millis("SETTLEMENT_POLL_MS", defaults.lifecycle.poll_interval)?,
            receipt_timeout: secs("RECEIPT_TIMEOUT_SECS", defaults.lifecycle.receipt_timeout)?,
            retry,
        };

        let session = SessionConfig {
            round_delay: millis("ROUND_DELAY_MS", defaults.session.round_delay)?,
            skip_delay: secs("SKIP_DELAY_SECS", defaults.session.skip_delay)?,
            error_cooldown: secs("ERROR_COOLDOWN_SECS", defaults.session.error_cooldown)?,
            recent_rounds: env_or("RECENT_ROUNDS", defaults.session.recent_rounds)?,
        };

        let server_addr = env_or("SERVER_ADDR", defaults.server_addr)?;

        let config = Self {
            private_key,
            chain,
            wager,
            lifecycle,
            session,
            server_addr,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.wager.validate().context("Invalid wager settings")?;

        if self.chain.gas_limit == 0 {
            anyhow::bail!("GAS_LIMIT must be positive");
        }
        if self.lifecycle.poll_interval.is_zero() {
            anyhow::bail!("SETTLEMENT_POLL_MS must be positive");
        }
        if self.lifecycle.settlement_timeout < self.lifecycle.poll_interval {
            anyhow::bail!("SETTLEMENT_TIMEOUT_SECS must cover at least one poll interval");
        }
        if self.session.recent_rounds == 0 {
            anyhow::bail!("RECENT_ROUNDS must be at least 1");
        }
        Ok(())
    }
}

/// Read `key` and parse it, falling back to `default` when unset or empty
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", key, raw, e)),
        _ => Ok(default),
    }
}

fn secs(key: &str, default: Duration) -> Result<Duration> {
    Ok(Duration::from_secs(env_or(key, default.as_secs())?))
}

fn millis(key: &str, default: Duration) -> Result<Duration> {
    Ok(Duration::from_millis(env_or(key, default.as_millis() as u64)?))
}
