//! Splitting a USD liquidity target into pair token amounts

use crate::utils::{mul_div, wad_div};
use alloy_primitives::U256;

/// Token amounts for one liquidity add, and the part of each that must be borrowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairAmounts {
    pub token1_amount: U256,
    pub token2_amount: U256,
    pub token1_borrow: U256,
    pub token2_borrow: U256,
}

/// Split `liquidity_usd` 50/50 by value across a pair.
///
/// `token1_amount` is half the target at `price1`; `token2_amount` follows the
/// pool's reserve ratio, or half the target at `price2` for an empty pool.
/// Borrows are whatever the held balances do not cover. Prices are USD per whole
/// token scaled by 1e18; a zero price yields an all-zero result.
pub fn calc_pair_amounts(
    liquidity_usd: U256,
    price1: U256,
    price2: U256,
    reserve1: U256,
    reserve2: U256,
    held1: U256,
    held2: U256,
) -> PairAmounts {
    if price1.is_zero() || price2.is_zero() || liquidity_usd.is_zero() {
        return PairAmounts::default();
    }

    let half = liquidity_usd / U256::from(2u64);
    let token1_amount = wad_div(half, price1);
    let token2_amount = if reserve1.is_zero() || reserve2.is_zero() {
        wad_div(half, price2)
    } else {
        mul_div(token1_amount, reserve2, reserve1)
    };

    PairAmounts {
        token1_amount,
        token2_amount,
        token1_borrow: token1_amount.saturating_sub(held1),
        token2_borrow: token2_amount.saturating_sub(held2),
    }
}
