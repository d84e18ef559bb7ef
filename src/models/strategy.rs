//! Strategy models - contract bindings, signer references and per-kind settings

use crate::chain::{SignerRef, SignerRole};
use crate::error::{AppError, AppResult};
use crate::models::OperationType;
use alloy_primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Strategy kind, used as part of every queue key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyKind {
    /// Land-borrow-farm
    Lbf,
    /// Land-borrow-lend
    Lbl,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Lbf => write!(f, "LBF"),
            StrategyKind::Lbl => write!(f, "LBL"),
        }
    }
}

/// A lending market: the underlying token and its interest-bearing market token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LendingMarket {
    pub token: Address,
    pub v_token: Address,
}

/// Contracts a strategy talks to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyContracts {
    /// Logic contract holding borrowed funds and LP positions
    pub logic: Address,
    /// Storage contract holding user deposits
    pub storage: Address,
    /// USD price oracle (1e18-scaled price per whole token)
    pub oracle: Address,
    /// Swap router used for reward conversion and loan repayment swaps
    pub router: Address,
    /// Token distributed to depositors
    pub reward_token: Address,
    /// Lending protocol reward token
    pub lending_reward_token: Address,
    /// Asset surplus tokens are swapped into before repaying loans
    pub base_asset: LendingMarket,
    /// Markets whose accrued interest is harvested on claim
    #[serde(default)]
    pub interest_markets: Vec<LendingMarket>,
}

/// Strategy record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: i64,
    pub name: String,
    pub blockchain_id: i64,
    pub contracts: StrategyContracts,
    /// Key reference for operational (logic contract) transactions
    pub operational_key_ref: String,
    /// Key reference for boosting transfers
    pub boosting_key_ref: String,
    pub operational_wallet: Address,
    pub boosting_wallet: Address,
    pub is_active: bool,
    pub settings: StrategySettings,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        self.settings.kind()
    }

    pub fn operational_signer(&self) -> SignerRef {
        SignerRef {
            role: SignerRole::Operational,
            key_ref: self.operational_key_ref.clone(),
            address: self.operational_wallet,
        }
    }

    pub fn boosting_signer(&self) -> SignerRef {
        SignerRef {
            role: SignerRole::Boosting,
            key_ref: self.boosting_key_ref.clone(),
            address: self.boosting_wallet,
        }
    }
}

/// Tier of funds kept unborrowed on the storage contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreserveTier {
    /// Storage TVL (USD) from which this tier applies
    pub min_storage_usd: Decimal,
    /// Share of the borrow limit left unused (0..1)
    pub preserve_percent: Decimal,
}

/// Settings shared by every strategy kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonSettings {
    pub strategy_timeout_ms: u64,
    pub claim_timeout_ms: u64,
    pub venus_claim_timeout_ms: u64,
    pub admin_balance_check_timeout_ms: u64,
    pub analytics_timeout_ms: u64,
    pub boosting_balance_check_timeout_ms: u64,

    #[serde(default)]
    pub is_strategy_autostart: bool,
    #[serde(default)]
    pub is_claim_autostart: bool,
    #[serde(default)]
    pub is_venus_claim_autostart: bool,
    #[serde(default)]
    pub is_admin_balance_check_enabled: bool,
    #[serde(default)]
    pub is_analytics_enabled: bool,
    #[serde(default)]
    pub is_boosting_balance_check_enabled: bool,

    /// Reward tokens distributed per claim at most
    pub max_rewards_per_run: Decimal,
    #[serde(default)]
    pub distribute_even_if_negative: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,

    #[serde(default)]
    pub boosting_enabled: bool,
    /// Reward tokens added per elapsed block by the boosting wallet
    #[serde(default)]
    pub boosting_tokens_per_block: Decimal,

    /// Native balance below which the admin wallet is reported
    pub min_admin_balance: Decimal,
    /// Reward token balance below which the boosting wallet is reported
    pub min_boosting_balance: Decimal,

    /// Slippage tolerance for liquidity and swap calls, in basis points
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
}

fn default_true() -> bool {
    true
}

fn default_slippage_bps() -> u32 {
    100
}

/// Land-borrow-farm settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbfSettings {
    #[serde(flatten)]
    pub common: CommonSettings,
    /// Below `limit * min` liquidity is added
    pub borrow_limit_percentage_min: Decimal,
    /// Rebalance target
    pub borrow_limit_percentage: Decimal,
    /// Above `limit * max` liquidity is removed
    pub borrow_limit_percentage_max: Decimal,
    #[serde(default)]
    pub preserve_tiers: Vec<PreserveTier>,
}

/// Land-borrow-lend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LblSettings {
    #[serde(flatten)]
    pub common: CommonSettings,
    /// Borrow usage above which the strategy run alerts
    pub borrow_limit_percentage_max: Decimal,
}

/// Per-kind settings, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum StrategySettings {
    Lbf(LbfSettings),
    Lbl(LblSettings),
}

/// Recurring health checks run on the cron queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CronCheck {
    AdminBalance,
    AnalyticsSnapshot,
    BoostingBalance,
}

impl CronCheck {
    pub const ALL: [CronCheck; 3] = [
        CronCheck::AdminBalance,
        CronCheck::AnalyticsSnapshot,
        CronCheck::BoostingBalance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CronCheck::AdminBalance => "ADMIN_BALANCE",
            CronCheck::AnalyticsSnapshot => "ANALYTICS_SNAPSHOT",
            CronCheck::BoostingBalance => "BOOSTING_BALANCE",
        }
    }
}

impl std::fmt::Display for CronCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CronCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN_BALANCE" => Ok(CronCheck::AdminBalance),
            "ANALYTICS_SNAPSHOT" => Ok(CronCheck::AnalyticsSnapshot),
            "BOOSTING_BALANCE" => Ok(CronCheck::BoostingBalance),
            _ => Err(format!("Unknown cron check: {}", s)),
        }
    }
}

impl StrategySettings {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategySettings::Lbf(_) => StrategyKind::Lbf,
            StrategySettings::Lbl(_) => StrategyKind::Lbl,
        }
    }

    pub fn common(&self) -> &CommonSettings {
        match self {
            StrategySettings::Lbf(s) => &s.common,
            StrategySettings::Lbl(s) => &s.common,
        }
    }

    /// Whether the recurring chain of `op_type` continues after a run
    pub fn autostart(&self, op_type: OperationType) -> bool {
        let common = self.common();
        match op_type {
            OperationType::StrategyRun => common.is_strategy_autostart,
            OperationType::ClaimRun => common.is_claim_autostart,
            OperationType::VenusClaimRun => common.is_venus_claim_autostart,
            OperationType::WithdrawAllToStorage | OperationType::RecreateReserves => false,
        }
    }

    /// Delay before the next occurrence of `op_type`
    pub fn timeout_ms(&self, op_type: OperationType) -> u64 {
        let common = self.common();
        match op_type {
            OperationType::StrategyRun => common.strategy_timeout_ms,
            OperationType::ClaimRun => common.claim_timeout_ms,
            OperationType::VenusClaimRun => common.venus_claim_timeout_ms,
            OperationType::WithdrawAllToStorage | OperationType::RecreateReserves => 0,
        }
    }

    pub fn cron_enabled(&self, check: CronCheck) -> bool {
        let common = self.common();
        match check {
            CronCheck::AdminBalance => common.is_admin_balance_check_enabled,
            CronCheck::AnalyticsSnapshot => common.is_analytics_enabled,
            CronCheck::BoostingBalance => common.is_boosting_balance_check_enabled,
        }
    }

    pub fn cron_timeout_ms(&self, check: CronCheck) -> u64 {
        let common = self.common();
        match check {
            CronCheck::AdminBalance => common.admin_balance_check_timeout_ms,
            CronCheck::AnalyticsSnapshot => common.analytics_timeout_ms,
            CronCheck::BoostingBalance => common.boosting_balance_check_timeout_ms,
        }
    }

    /// Validate settings against the strategy's farms
    pub fn validate(&self, farms: &[Farm]) -> AppResult<()> {
        let common = self.common();
        let timeouts = [
            common.strategy_timeout_ms,
            common.claim_timeout_ms,
            common.venus_claim_timeout_ms,
            common.admin_balance_check_timeout_ms,
            common.analytics_timeout_ms,
            common.boosting_balance_check_timeout_ms,
        ];
        if timeouts.iter().any(|t| *t == 0) {
            return Err(AppError::SettingsInvalid(
                "all timeouts must be greater than zero".to_string(),
            ));
        }
        if common.max_rewards_per_run.is_sign_negative() {
            return Err(AppError::SettingsInvalid(
                "max_rewards_per_run must not be negative".to_string(),
            ));
        }
        if common.boosting_tokens_per_block.is_sign_negative() {
            return Err(AppError::SettingsInvalid(
                "boosting_tokens_per_block must not be negative".to_string(),
            ));
        }
        if common.slippage_bps >= 10_000 {
            return Err(AppError::SettingsInvalid(
                "slippage_bps must be below 10000".to_string(),
            ));
        }

        match self {
            StrategySettings::Lbf(s) => {
                let (min, target, max) = (
                    s.borrow_limit_percentage_min,
                    s.borrow_limit_percentage,
                    s.borrow_limit_percentage_max,
                );
                if !(Decimal::ZERO < min && min < target && target < max && max < Decimal::ONE) {
                    return Err(AppError::SettingsInvalid(format!(
                        "borrow limit percentages must satisfy 0 < min < target < max < 1 (got {} / {} / {})",
                        min, target, max
                    )));
                }

                let total: Decimal = farms
                    .iter()
                    .filter(|f| f.is_active)
                    .map(|f| f.percentage)
                    .sum();
                if farms.iter().any(|f| f.percentage.is_sign_negative()) || total > Decimal::ONE {
                    return Err(AppError::SettingsInvalid(format!(
                        "farm percentages must be non-negative and sum to at most 1 (got {})",
                        total
                    )));
                }

                let mut previous: Option<&PreserveTier> = None;
                for tier in &s.preserve_tiers {
                    if tier.preserve_percent.is_sign_negative()
                        || tier.preserve_percent >= Decimal::ONE
                    {
                        return Err(AppError::SettingsInvalid(
                            "preserve_percent must be in [0, 1)".to_string(),
                        ));
                    }
                    if let Some(prev) = previous {
                        if tier.min_storage_usd <= prev.min_storage_usd {
                            return Err(AppError::SettingsInvalid(
                                "preserve tiers must be sorted by ascending min_storage_usd"
                                    .to_string(),
                            ));
                        }
                    }
                    previous = Some(tier);
                }
            }
            StrategySettings::Lbl(s) => {
                if !(Decimal::ZERO < s.borrow_limit_percentage_max
                    && s.borrow_limit_percentage_max < Decimal::ONE)
                {
                    return Err(AppError::SettingsInvalid(
                        "borrow_limit_percentage_max must be in (0, 1)".to_string(),
                    ));
                }
                if farms.iter().any(|f| f.is_active) {
                    return Err(AppError::SettingsInvalid(
                        "land-borrow-lend strategies cannot have active farms".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

impl LbfSettings {
    /// Preserve share applying to the given storage TVL (USD, whole units)
    pub fn preserve_percent(&self, storage_usd: Decimal) -> Decimal {
        self.preserve_tiers
            .iter()
            .filter(|tier| tier.min_storage_usd <= storage_usd)
            .last()
            .map(|tier| tier.preserve_percent)
            .unwrap_or(Decimal::ZERO)
    }
}

/// One side of a liquidity pair, with the lending market it is borrowed from
pub type FarmToken = LendingMarket;

/// Liquidity-pool position with a target allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Farm {
    pub id: i64,
    pub strategy_id: i64,
    /// DEX platform name (informational)
    pub platform: String,
    /// LP token / pair contract
    pub pair: Address,
    pub token1: FarmToken,
    pub token2: FarmToken,
    /// Router used to add/remove liquidity
    pub router: Address,
    /// Staking contract for LP tokens
    pub master_chef: Address,
    /// Pool id in the staking contract
    pub pid: u64,
    /// Farm reward token harvested on claim
    pub reward_token: Address,
    /// Target share of total liquidity (0..1)
    pub percentage: Decimal,
    pub is_active: bool,
}
