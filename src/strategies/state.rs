//! Per-identity strategy state

use crate::types::RoundOutcome;
use std::collections::VecDeque;

/// Minimum samples of each kind before the profit factor is trusted
pub const MIN_RATIO_SAMPLES: usize = 3;

/// Mutable strategy state, owned by one session
#[derive(Debug, Clone)]
pub struct StrategyState {
    pub win_streak: u32,
    pub loss_streak: u32,
    /// Rounds since the last bonus pattern
    pub games_since_pattern: u32,
    /// Highest balance seen, never decreases
    pub all_time_high: u128,
    /// Pre-multiplier wager; `None` until the first sizing
    pub base_bet_amount: Option<u128>,
    /// `win / stake` of recent winning rounds
    win_ratios: VecDeque<f64>,
    /// `|loss| / stake` of recent losing rounds
    loss_ratios: VecDeque<f64>,
    max_tracked_rounds: usize,
}

impl StrategyState {
    pub fn new(max_tracked_rounds: usize) -> Self {
        Self {
            win_streak: 0,
            loss_streak: 0,
            games_since_pattern: 0,
            all_time_high: 0,
            base_bet_amount: None,
            win_ratios: VecDeque::with_capacity(max_tracked_rounds),
            loss_ratios: VecDeque::with_capacity(max_tracked_rounds),
            max_tracked_rounds,
        }
    }

    /// Raise the all-time high if `balance` exceeds it. Returns true on a new high.
    pub fn observe_balance(&mut self, balance: u128) -> bool {
        if balance > self.all_time_high {
            self.all_time_high = balance;
            true
        } else {
            false
        }
    }

    /// Fold one finished round into the streak, drought and ratio trackers.
    ///
    /// Timed-out rounds count as losses for the streaks and drought but never
    /// feed the ratio history (their balance change is a placeholder).
    pub fn record_round(&mut self, outcome: &RoundOutcome, bonus_pattern: bool) {
        if outcome.won {
            self.win_streak += 1;
            self.loss_streak = 0;
        } else {
            self.loss_streak += 1;
            self.win_streak = 0;
        }

        if bonus_pattern {
            self.games_since_pattern = 0;
        } else {
            self.games_since_pattern += 1;
        }

        if outcome.timed_out || outcome.wagered == 0 {
            return;
        }

        let ratio = outcome.balance_change.unsigned_abs() as f64 / outcome.wagered as f64;
        if outcome.balance_change > 0 {
            push_bounded(&mut self.win_ratios, ratio, self.max_tracked_rounds);
        } else if outcome.balance_change < 0 {
            push_bounded(&mut self.loss_ratios, ratio, self.max_tracked_rounds);
        }
    }

    /// Average win ratio over average loss ratio, once both windows have enough samples
    pub fn profit_factor(&self) -> Option<f64> {
        if self.win_ratios.len() < MIN_RATIO_SAMPLES || self.loss_ratios.len() < MIN_RATIO_SAMPLES {
            return None;
        }

        let avg_win = mean(&self.win_ratios);
        let avg_loss = mean(&self.loss_ratios);
        if avg_loss <= 0.0 {
            return None;
        }

        Some(avg_win / avg_loss)
    }

    pub fn tracked_wins(&self) -> usize {
        self.win_ratios.len()
    }

    pub fn tracked_losses(&self) -> usize {
        self.loss_ratios.len()
    }

    /// Drop everything learned so far (credential rotation, explicit reset)
    pub fn reset(&mut self) {
        *self = Self::new(self.max_tracked_rounds);
    }
}

fn push_bounded(window: &mut VecDeque<f64>, value: f64, cap: usize) {
    if cap == 0 {
        return;
    }
    while window.len() >= cap {
        window.pop_front();
    }
    window.push_back(value);
}

fn mean(values: &VecDeque<f64>) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
