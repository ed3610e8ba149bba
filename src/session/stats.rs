//! Session statistics snapshot

use crate::services::lifecycle::LifecycleState;
use crate::strategies::StrategyState;
use crate::types::{GameSummary, RoundOutcome};
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Session loop phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Point-in-time view of one session, cloned out for readers
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub identity: String,
    pub wallet_address: Option<Address>,
    pub phase: SessionPhase,
    pub current_balance: u128,
    pub starting_balance: u128,
    pub native_balance: u128,
    pub all_time_high: u128,
    pub win_streak: u32,
    pub loss_streak: u32,
    pub games_since_pattern: u32,
    pub total_games: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    /// Rounds recorded with the timeout placeholder (also counted as losses)
    pub timed_out_rounds: u64,
    /// Cycles that failed before or during submission
    pub failed_rounds: u64,
    /// Newest first
    pub recent_games: VecDeque<GameSummary>,
    /// Wager currently in flight
    pub current_bet: Option<u128>,
    pub base_bet: Option<u128>,
    pub lifecycle_state: LifecycleState,
    pub last_error: Option<String>,
    pub last_update: DateTime<Utc>,
    recent_capacity: usize,
}

impl SessionStats {
    pub fn new(identity: impl Into<String>, recent_capacity: usize) -> Self {
        Self {
            identity: identity.into(),
            wallet_address: None,
            phase: SessionPhase::Stopped,
            current_balance: 0,
            starting_balance: 0,
            native_balance: 0,
            all_time_high: 0,
            win_streak: 0,
            loss_streak: 0,
            games_since_pattern: 0,
            total_games: 0,
            total_wins: 0,
            total_losses: 0,
            timed_out_rounds: 0,
            failed_rounds: 0,
            recent_games: VecDeque::with_capacity(recent_capacity),
            current_bet: None,
            base_bet: None,
            lifecycle_state: LifecycleState::Idle,
            last_error: None,
            last_update: Utc::now(),
            recent_capacity,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, SessionPhase::Starting | SessionPhase::Running)
    }

    pub fn session_profit(&self) -> i128 {
        self.current_balance as i128 - self.starting_balance as i128
    }

    /// Share of finished rounds that were wins, in percent
    pub fn win_rate(&self) -> f64 {
        if self.total_games == 0 {
            return 0.0;
        }
        self.total_wins as f64 / self.total_games as f64 * 100.0
    }

    /// Start a fresh session baseline at `balance`
    pub fn rebaseline(&mut self, balance: u128, native_balance: u128) {
        let identity = std::mem::take(&mut self.identity);
        let wallet_address = self.wallet_address;
        let phase = self.phase;

        *self = Self::new(identity, self.recent_capacity);
        self.wallet_address = wallet_address;
        self.phase = phase;
        self.starting_balance = balance;
        self.current_balance = balance;
        self.native_balance = native_balance;
        self.all_time_high = balance;
    }

    pub fn set_balances(&mut self, token: u128, native: u128) {
        self.current_balance = token;
        self.native_balance = native;
        self.touch();
    }

    /// Copy the strategy fields shown to readers
    pub fn sync_strategy(&mut self, strategy: &StrategyState) {
        self.all_time_high = strategy.all_time_high;
        self.win_streak = strategy.win_streak;
        self.loss_streak = strategy.loss_streak;
        self.games_since_pattern = strategy.games_since_pattern;
        self.base_bet = strategy.base_bet_amount;
        self.touch();
    }

    pub fn record_round(&mut self, outcome: &RoundOutcome, bonus_pattern: bool) {
        self.total_games += 1;
        if outcome.won {
            self.total_wins += 1;
        } else {
            self.total_losses += 1;
        }
        if outcome.timed_out {
            self.timed_out_rounds += 1;
        }

        if self.recent_capacity > 0 {
            while self.recent_games.len() >= self.recent_capacity {
                self.recent_games.pop_back();
            }
            self.recent_games
                .push_front(GameSummary::from_outcome(outcome, bonus_pattern));
        }

        self.current_bet = None;
        self.last_error = None;
        self.touch();
    }

    pub fn record_failure(&mut self, error: impl ToString) {
        self.failed_rounds += 1;
        self.current_bet = None;
        self.last_error = Some(error.to_string());
        self.touch();
    }

    fn touch(&mut self) {
        self.last_update = Utc::now();
    }
}
