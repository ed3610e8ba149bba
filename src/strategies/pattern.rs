//! Bonus ("69") pattern detection
//!
//! Reproduces the contract's own bitmask classification of a roll:
//! one bit per distinct face, plus a flag for a repeated three.
//!
//! * `72`  = bits {3, 6}: a six and a *single* three, e.g. `[6, 3, 1]` is not
//!   enough (bit 1 also set) but `[6, 6, 3]` is
//! * `112` = bits {4, 5, 6}: any permutation of `[6, 5, 4]`
//!
//! Payout is decided by the contract alone; this only drives the drought counter.

use crate::types::DiceRoll;

const MASK_THREE_SIX: u16 = 72;
const MASK_FOUR_FIVE_SIX: u16 = 112;

/// Whether a settled roll is one of the contract's bonus patterns
pub fn is_bonus_pattern(dice: DiceRoll) -> bool {
    let mut bit_dice: u16 = 0;
    let mut double_three = false;

    for face in dice {
        if !(1..=6).contains(&face) {
            return false;
        }
        if face == 3 && bit_dice & (1 << 3) != 0 {
            double_three = true;
        }
        bit_dice |= 1 << face;
    }

    (bit_dice == MASK_THREE_SIX && !double_three) || bit_dice == MASK_FOUR_FIVE_SIX
}
