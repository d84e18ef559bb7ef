//! Claim Distribution Policy Tests
//!
//! Tests the per-run distribution cap and the distributable amount.

use alloy_primitives::U256;
use lbf_operator::constants::{DUST_THRESHOLD, WAD};
use lbf_operator::strategy::{distributable_amount, distribution_cap, BoostingTopUp};
use lbf_operator::utils::decimal_to_wei;
use rust_decimal::Decimal;

fn tokens(n: u64) -> U256 {
    U256::from(n) * WAD
}

#[test]
fn test_cap_of_one_token_with_five_available() {
    let max = decimal_to_wei(Decimal::ONE);
    let cap = distribution_cap(tokens(50), max, false);
    let amount = distributable_amount(tokens(5), cap);

    assert_eq!(amount, WAD);
    assert!(amount <= max);
}

#[test]
fn test_cap_even_if_negative_ignores_computed() {
    let cap = distribution_cap(U256::ZERO, tokens(2), true);
    assert_eq!(cap, tokens(2));
    assert_eq!(distributable_amount(tokens(5), cap), tokens(2));
}

#[test]
fn test_negative_result_caps_at_zero() {
    let cap = distribution_cap(U256::ZERO, tokens(2), false);
    assert_eq!(distributable_amount(tokens(5), cap), U256::ZERO);
}

#[test]
fn test_available_balance_bounds_amount() {
    let cap = distribution_cap(tokens(10), tokens(10), false);
    assert_eq!(distributable_amount(tokens(3), cap), tokens(3));
}

#[test]
fn test_half_token_is_dust() {
    let amount = WAD / U256::from(2u64);
    assert!(amount <= DUST_THRESHOLD);
    assert!(WAD <= DUST_THRESHOLD);
    assert!(tokens(2) > DUST_THRESHOLD);
}

#[test]
fn test_boosting_top_up_spans_blocks_since_last_distribution() {
    let top_up = BoostingTopUp::compute(tokens(2), Some(100), 150).unwrap();
    assert_eq!(top_up.blocks, 50);
    assert_eq!(top_up.required, tokens(100));
}
