//! Shared numeric constants

use alloy_primitives::U256;

/// Decimals assumed for every strategy token and for oracle prices
pub const TOKEN_DECIMALS: u8 = 18;

/// 1e18 fixed-point unit
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Reward amounts at or below one whole token are not distributed
pub const DUST_THRESHOLD: U256 = WAD;

/// Basis-point denominator used for slippage
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Swap deadline offset from the current block timestamp
pub const SWAP_DEADLINE_SECS: u64 = 1_200;

/// Allowance granted when a spender is below the required amount
pub const MAX_APPROVAL: U256 = U256::MAX;
