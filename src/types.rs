//! Core types for the dice bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Three dice faces, each in 1..=6
pub type DiceRoll = [u8; 3];

/// One wager as recorded by the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRound {
    pub game_id: u64,
    pub fulfilled: bool,
    pub total_bet: u128,
    pub total_winnings: u128,
    /// Per-die wager amounts as submitted
    pub bet_amounts: Vec<u128>,
    /// Present once the round is fulfilled
    pub dice_results: Option<DiceRoll>,
}

impl GameRound {
    /// Net result for the player (winnings minus stake)
    pub fn balance_change(&self) -> i128 {
        self.total_winnings as i128 - self.total_bet as i128
    }

    pub fn is_win(&self) -> bool {
        self.total_winnings > self.total_bet
    }
}

/// Normalized result of one executed wager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Contract game id, unknown when settlement was never observed
    pub game_id: Option<u64>,
    /// Amount requested by the sizer
    pub bet_amount: u128,
    /// Amount actually staked (3 equal sub-bets)
    pub wagered: u128,
    pub won: bool,
    pub balance_change: i128,
    pub dice_results: Option<DiceRoll>,
    /// Placeholder outcome after the settlement budget ran out
    pub timed_out: bool,
}

impl RoundOutcome {
    pub fn resolved(round: &GameRound, bet_amount: u128, wagered: u128) -> Self {
        Self {
            game_id: Some(round.game_id),
            bet_amount,
            wagered,
            won: round.is_win(),
            balance_change: round.balance_change(),
            dice_results: round.dice_results,
            timed_out: false,
        }
    }

    /// Conservative stand-in: counted as a loss with no dice and no balance change
    pub fn timed_out(game_id: Option<u64>, bet_amount: u128, wagered: u128) -> Self {
        Self {
            game_id,
            bet_amount,
            wagered,
            won: false,
            balance_change: 0,
            dice_results: None,
            timed_out: true,
        }
    }
}

/// Receipt status of an included transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Summary of a finished round kept in the recent-rounds list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: Option<u64>,
    pub time: DateTime<Utc>,
    pub dice: Option<DiceRoll>,
    pub won: bool,
    pub amount: u128,
    pub balance_change: i128,
    pub bonus_pattern: bool,
    pub timed_out: bool,
}

impl GameSummary {
    pub fn from_outcome(outcome: &RoundOutcome, bonus_pattern: bool) -> Self {
        Self {
            game_id: outcome.game_id,
            time: Utc::now(),
            dice: outcome.dice_results,
            won: outcome.won,
            amount: outcome.wagered,
            balance_change: outcome.balance_change,
            bonus_pattern,
            timed_out: outcome.timed_out,
        }
    }
}

impl fmt::Display for GameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self
            .game_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string());
        let dice = match self.dice {
            Some([a, b, c]) => format!("[{}, {}, {}]", a, b, c),
            None => "[-, -, -]".to_string(),
        };
        let result = if self.timed_out {
            "TIMEOUT"
        } else if self.won {
            "WIN"
        } else {
            "LOSS"
        };
        write!(f, "#{} {} {} {:+}", id, dice, result, self.balance_change)
    }
}
