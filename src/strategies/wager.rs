//! Adaptive wager sizing
//!
//! The bet for a cycle is `base_bet_amount` scaled by up to four independent,
//! individually capped multipliers, then clamped to
//! `[min_bet, balance * max_bet_pct]`:
//!
//! | multiplier | formula | bound |
//! |---|---|---|
//! | win bonus | `1 + win_streak * win_rate` | <= 2.0 |
//! | loss recovery | `1 + loss_streak * recovery_rate` | <= 2.0 |
//! | drought chase | `chase_multiplier ^ (over + 1)` past the threshold | <= 3.0 |
//! | variable risk | profit factor around 1.0 | [0.5, 1.5] |
//!
//! The baseline itself drifts between rounds with the recovery and chase
//! state (see [`WagerSizer::rebase`]).

use super::state::StrategyState;
use crate::config::WagerSettings;
use serde::Serialize;

const MAX_WIN_BONUS: f64 = 2.0;
const MAX_RECOVERY: f64 = 2.0;
const MAX_CHASE: f64 = 3.0;
const MAX_RISK_UP: f64 = 1.5;
const MIN_RISK_DOWN: f64 = 0.5;

/// Multipliers applied to one cycle's bet. `None` means inactive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Multipliers {
    pub win_bonus: Option<f64>,
    pub recovery: Option<f64>,
    pub chase: f64,
    pub risk: Option<f64>,
}

impl Multipliers {
    pub fn product(&self) -> f64 {
        self.win_bonus.unwrap_or(1.0)
            * self.recovery.unwrap_or(1.0)
            * self.chase
            * self.risk.unwrap_or(1.0)
    }
}

/// A sized bet ready for submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetPlan {
    pub amount: u128,
    pub base_bet: u128,
    pub multipliers: Multipliers,
}

/// Result of sizing one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum WagerDecision {
    /// Balance below the safety threshold, nothing to do this cycle
    Skip { balance: u128, threshold: u128 },
    Bet(BetPlan),
}

/// Computes bets from balance and strategy state
#[derive(Debug, Clone)]
pub struct WagerSizer {
    settings: WagerSettings,
}

impl WagerSizer {
    pub fn new(settings: WagerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &WagerSettings {
        &self.settings
    }

    /// Size the next bet. May bootstrap or clamp `state.base_bet_amount`.
    pub fn compute_bet(&self, balance: u128, state: &mut StrategyState) -> WagerDecision {
        let s = &self.settings;

        let mut base = match state.base_bet_amount {
            Some(base) => base,
            None => s.min_bet.max(pct_of(balance, s.min_bet_pct)),
        };
        state.base_bet_amount = Some(base);

        if balance < s.safety_threshold {
            return WagerDecision::Skip {
                balance,
                threshold: s.safety_threshold,
            };
        }

        // Balance dropped below the stored baseline
        if balance < base {
            base = s.min_bet.max(pct_of(balance, s.max_bet_pct));
            state.base_bet_amount = Some(base);
        }

        let multipliers = Multipliers {
            win_bonus: self.win_bonus(state),
            recovery: self.recovery(state),
            chase: self.chase(state),
            risk: self.risk_adjustment(state),
        };

        let raw = (base as f64 * multipliers.product()) as u128;
        let cap = pct_of(balance, s.max_bet_pct);
        let amount = raw.min(cap).max(s.min_bet);

        WagerDecision::Bet(BetPlan {
            amount,
            base_bet: base,
            multipliers,
        })
    }

    /// Recompute the baseline for the next cycle after a resolved round.
    ///
    /// Expects `state` to already reflect the round (streaks and drought updated).
    pub fn rebase(&self, new_balance: u128, state: &mut StrategyState, bonus_pattern: bool) -> u128 {
        let s = &self.settings;

        let recovery = self.recovery(state).unwrap_or(1.0);
        let chase = self.chase(state);
        let bet_pct = (s.min_bet_pct * recovery * chase).min(s.max_bet_pct);

        let mut base = s.min_bet.max(pct_of(new_balance, bet_pct));
        if bonus_pattern {
            let boosted = (base as f64 * s.pattern_win_boost) as u128;
            base = boosted.min(pct_of(new_balance, s.max_bet_pct)).max(s.min_bet);
        }

        state.base_bet_amount = Some(base);
        base
    }

    fn win_bonus(&self, state: &StrategyState) -> Option<f64> {
        if state.win_streak == 0 {
            return None;
        }
        Some((1.0 + state.win_streak as f64 * self.settings.win_rate).min(MAX_WIN_BONUS))
    }

    fn recovery(&self, state: &StrategyState) -> Option<f64> {
        if state.loss_streak == 0 {
            return None;
        }
        Some((1.0 + state.loss_streak as f64 * self.settings.recovery_rate).min(MAX_RECOVERY))
    }

    fn chase(&self, state: &StrategyState) -> f64 {
        let threshold = self.settings.chase_threshold;
        if state.games_since_pattern < threshold {
            return 1.0;
        }
        let games_over = (state.games_since_pattern - threshold + 1) as i32;
        self.settings.chase_multiplier.powi(games_over).min(MAX_CHASE)
    }

    fn risk_adjustment(&self, state: &StrategyState) -> Option<f64> {
        let pf = state.profit_factor()?;
        let adjustment = if pf > 1.0 {
            (1.0 + (pf - 1.0) * self.settings.win_sensitivity).min(MAX_RISK_UP)
        } else {
            (1.0 - (1.0 - pf) * self.settings.loss_sensitivity).max(MIN_RISK_DOWN)
        };
        Some(adjustment)
    }
}

/// `balance * pct`, truncated toward zero
fn pct_of(balance: u128, pct: f64) -> u128 {
    (balance as f64 * pct) as u128
}
