use crate::constants::{BPS_DENOMINATOR, TOKEN_DECIMALS, WAD};
use alloy_primitives::utils::{format_units, parse_units};
use alloy_primitives::{I256, U256};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Convert a whole-token decimal (settings, thresholds) into 18-decimal base units.
/// Negative values clamp to zero; digits past the 18th decimal are rounded.
pub fn decimal_to_wei(amount: Decimal) -> U256 {
    if amount.is_sign_negative() || amount.is_zero() {
        return U256::ZERO;
    }
    let rounded = amount.round_dp(TOKEN_DECIMALS as u32).normalize();
    parse_units(&rounded.to_string(), TOKEN_DECIMALS)
        .map(|units| units.get_absolute())
        .unwrap_or(U256::ZERO)
}

/// Convert 18-decimal base units into a whole-token decimal for display and
/// comparisons. Values beyond the decimal range saturate.
pub fn wei_to_decimal(wei: U256) -> Decimal {
    let formatted = format_wei(wei);
    Decimal::from_str(&formatted).unwrap_or(Decimal::MAX)
}

/// Human-readable whole-token string, e.g. `"1.500000000000000000"`
pub fn format_wei(wei: U256) -> String {
    format_units(wei, TOKEN_DECIMALS).unwrap_or_else(|_| wei.to_string())
}

/// `a * b / denominator`, saturating on the product; zero when the denominator is zero
pub fn mul_div(a: U256, b: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::ZERO;
    }
    a.saturating_mul(b) / denominator
}

/// Multiply two 1e18-scaled values
pub fn wad_mul(a: U256, b: U256) -> U256 {
    mul_div(a, b, WAD)
}

/// Divide two 1e18-scaled values
pub fn wad_div(a: U256, b: U256) -> U256 {
    mul_div(a, WAD, b)
}

/// Minimum accepted output for `amount` at `slippage_bps`
pub fn apply_slippage(amount: U256, slippage_bps: u32) -> U256 {
    let keep = BPS_DENOMINATOR.saturating_sub(slippage_bps as u64);
    mul_div(amount, U256::from(keep), U256::from(BPS_DENOMINATOR))
}

/// Signed view of an unsigned amount, saturating at `I256::MAX`
pub fn to_signed(amount: U256) -> I256 {
    I256::try_from(amount).unwrap_or(I256::MAX)
}

/// Current unix time in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
