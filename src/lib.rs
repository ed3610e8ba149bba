//! Apes.Win Dice Bot Library
//!
//! Automates repeated wagers against the Apes.Win dice contract on Sonic:
//!
//! 1. **Wager sizing**: a baseline bet scaled by win-streak, loss-recovery,
//!    drought-chase and profit-factor multipliers, always bounded by a
//!    fraction of the current balance.
//!
//! 2. **Transaction lifecycle**: the contract settles each identity's games
//!    strictly in order, so every bet waits for the previous one to be
//!    fulfilled, then polls for its own settlement within a fixed budget.

pub mod api;
pub mod config;
pub mod errors;
pub mod services;
pub mod session;
pub mod strategies;
pub mod types;
pub mod units;
pub mod wallet;

pub use config::Config;
pub use errors::{BotError, BotResult};
pub use services::{ContractGateway, RpcGateway, TransactionLifecycleManager};
pub use session::{SessionEngine, SessionRegistry, SessionStats, StopSignal};
pub use strategies::{is_bonus_pattern, StrategyState, WagerSizer};
pub use types::{GameRound, RoundOutcome};
pub use wallet::Wallet;
