//! Wager strategy for the dice game
//!
//! Sizing is split into three pieces:
//!
//! 1. **Pattern detection**: mirrors the contract's "69" bonus classification
//!    so the bot can track how long it has been since the last bonus roll.
//! 2. **Strategy state**: streaks, drought counter, all-time high and the
//!    rolling win/loss ratios behind the profit factor.
//! 3. **Wager sizing**: turns balance + state into a bounded bet.

pub mod pattern;
pub mod state;
pub mod wager;

pub use pattern::is_bonus_pattern;
pub use state::StrategyState;
pub use wager::{BetPlan, Multipliers, WagerDecision, WagerSizer};
