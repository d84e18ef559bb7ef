//! Contract method names understood by the chain gateway

// Logic contract: lending
pub const GET_LENDING_POSITION: &str = "getLendingPosition";
pub const BORROW: &str = "borrow";
pub const REPAY_BORROW: &str = "repayBorrow";
pub const MINT: &str = "mint";
pub const CLAIM_LENDING_REWARDS: &str = "claimLendingRewards";
pub const REDEEM_INTEREST: &str = "redeemInterest";

// Logic contract: liquidity and farming
pub const APPROVE_TOKEN_FOR_SWAP: &str = "approveTokenForSwap";
pub const ADD_LIQUIDITY: &str = "addLiquidity";
pub const REMOVE_LIQUIDITY: &str = "removeLiquidity";
pub const DEPOSIT: &str = "deposit";
pub const WITHDRAW: &str = "withdraw";
pub const SWAP_EXACT_TOKENS_FOR_TOKENS: &str = "swapExactTokensForTokens";

// Logic contract: reserves and fund movement
pub const DELETE_LP_RESERVES: &str = "deleteLPReserves";
pub const ADD_LP_RESERVE: &str = "addLPReserve";
pub const RETURN_TOKEN: &str = "returnToken";
pub const DISTRIBUTE_REWARDS: &str = "distributeRewards";
pub const MULTICALL: &str = "multicall";

// Storage contract
pub const GET_TOTAL_DEPOSIT: &str = "getTotalDeposit";

// Market token
pub const BORROW_BALANCE_CURRENT: &str = "borrowBalanceCurrent";

// ERC-20
pub const BALANCE_OF: &str = "balanceOf";
pub const ALLOWANCE: &str = "allowance";
pub const TOTAL_SUPPLY: &str = "totalSupply";
pub const TRANSFER: &str = "transfer";

// Pair / staking
pub const GET_RESERVES: &str = "getReserves";
pub const TOKEN0: &str = "token0";
pub const USER_INFO: &str = "userInfo";

// Oracle
pub const GET_TOKEN_PRICE: &str = "getTokenPrice";
