//! Display formatting for on-chain amounts
//!
//! The core only ever handles integer smallest-unit amounts; these helpers
//! are for logs and the presentation boundary.

use rust_decimal::prelude::*;

/// Decimals of both the banana token and the native S token
pub const TOKEN_DECIMALS: u32 = 18;

/// Decimal places shown for token amounts
pub const TOKEN_DISPLAY_DP: u32 = 3;

/// Decimal places shown for native amounts
pub const NATIVE_DISPLAY_DP: u32 = 4;

/// Format a raw amount with `decimals` scale, truncated to `dp` places
pub fn format_units(raw: u128, decimals: u32, dp: u32) -> String {
    let dp = dp.min(decimals);
    match Decimal::try_from_i128_with_scale(raw as i128, decimals) {
        Ok(value) if raw <= i128::MAX as u128 => {
            let truncated = value.round_dp_with_strategy(dp, RoundingStrategy::ToZero);
            format!("{:.*}", dp as usize, truncated)
        }
        // Beyond Decimal's 96-bit mantissa: fall back to integer math
        _ => {
            let divisor = 10u128.pow(decimals);
            let whole = raw / divisor;
            let fraction = (raw % divisor) / 10u128.pow(decimals - dp);
            if dp == 0 {
                whole.to_string()
            } else {
                format!("{}.{:0width$}", whole, fraction, width = dp as usize)
            }
        }
    }
}

/// Format a signed raw amount, keeping the sign
pub fn format_signed_units(raw: i128, decimals: u32, dp: u32) -> String {
    let formatted = format_units(raw.unsigned_abs(), decimals, dp);
    if raw < 0 {
        format!("-{}", formatted)
    } else {
        format!("+{}", formatted)
    }
}

/// Token amount as shown to humans (3 dp)
pub fn format_bananas(raw: u128) -> String {
    format_units(raw, TOKEN_DECIMALS, TOKEN_DISPLAY_DP)
}

/// Native amount as shown to humans (4 dp)
pub fn format_native(raw: u128) -> String {
    format_units(raw, TOKEN_DECIMALS, NATIVE_DISPLAY_DP)
}

/// `part / whole` as a percentage, 0 when `whole` is 0
pub fn percent_of(part: u128, whole: u128) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_bananas_truncates() {
        // 1.23456 tokens
        assert_eq!(format_bananas(1_234_560_000_000_000_000), "1.234");
        assert_eq!(format_bananas(0), "0.000");
        assert_eq!(format_bananas(10u128.pow(18) * 42), "42.000");
    }

    #[test]
    fn test_format_native() {
        assert_eq!(format_native(19_250_000_000_000_000), "0.0192");
    }

    #[test]
    fn test_format_signed() {
        assert_eq!(format_signed_units(-500_000_000_000_000_000, 18, 3), "-0.500");
        assert_eq!(format_signed_units(500_000_000_000_000_000, 18, 3), "+0.500");
    }

    #[test]
    fn test_huge_amounts_fall_back() {
        let raw = u128::MAX;
        let formatted = format_units(raw, 18, 3);
        assert!(formatted.starts_with("340282366920938463463"));
        assert_eq!(formatted.split('.').nth(1).map(str::len), Some(3));
    }

    #[test]
    fn test_matches_decimal_math() {
        let raw = 2_500_000_000_000_000_000u128;
        let expected = dec!(2.5);
        assert_eq!(format_units(raw, 18, 1), expected.to_string());
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(1_000, 10_000), 10.0);
        assert_eq!(percent_of(1, 0), 0.0);
    }
}
