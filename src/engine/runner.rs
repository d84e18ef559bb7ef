//! Domain handlers invoked by the scheduler

use crate::chain::ChainClient;
use crate::error::{AppError, AppResult};
use crate::models::{CronCheck, Farm, LblSettings, OperationType, Strategy, StrategySettings};
use crate::notifications::{NotificationEvent, NotificationSink};
use crate::store::{AnalyticsStore, OperationStore};
use crate::strategy::{
    reader, AnalyticsReport, ClaimDistributor, MulticallSubmitter, RebalancingEngine, TxLog,
};
use crate::utils::{decimal_to_wei, wad_div};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Work executed for a job once its operation is IN_PROGRESS
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Wallet balances recorded before and after every operation
    async fn wallet_balances(&self, strategy: &Strategy) -> AppResult<Value>;

    /// Run one operation. Receipts go to `log` as they are produced.
    async fn run_operation(
        &self,
        op_type: OperationType,
        strategy: &Strategy,
        farms: &[Farm],
        log: &mut TxLog,
    ) -> AppResult<Value>;

    async fn run_check(
        &self,
        check: CronCheck,
        strategy: &Strategy,
        farms: &[Farm],
    ) -> AppResult<Value>;
}

pub struct StrategyRunner {
    chain: Arc<dyn ChainClient>,
    operations: Arc<dyn OperationStore>,
    analytics: Arc<dyn AnalyticsStore>,
    notifier: Arc<dyn NotificationSink>,
    rebalancer: RebalancingEngine,
    claims: ClaimDistributor,
}

impl StrategyRunner {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        operations: Arc<dyn OperationStore>,
        analytics: Arc<dyn AnalyticsStore>,
        notifier: Arc<dyn NotificationSink>,
        batching_enabled: bool,
    ) -> Self {
        let submitter = Arc::new(MulticallSubmitter::new(chain.clone(), batching_enabled));
        Self {
            rebalancer: RebalancingEngine::new(chain.clone(), submitter.clone(), notifier.clone()),
            claims: ClaimDistributor::new(chain.clone(), submitter, notifier.clone()),
            chain,
            operations,
            analytics,
            notifier,
        }
    }

    /// STRATEGY_RUN for land-borrow-lend: record the position and flag usage
    /// above the maximum; no liquidity moves
    async fn lending_check(&self, strategy: &Strategy, settings: &LblSettings) -> AppResult<Value> {
        let position = reader::lending_position(self.chain.as_ref(), strategy.contracts.logic).await?;
        let usage = wad_div(position.borrowed_usd, position.borrow_limit_usd);
        let over_max = usage > decimal_to_wei(settings.borrow_limit_percentage_max);

        if over_max {
            warn!(
                strategy_id = strategy.id,
                borrowed_usd = %position.borrowed_usd,
                limit_usd = %position.borrow_limit_usd,
                "Borrow usage above maximum"
            );
        }

        Ok(json!({
            "suppliedUsd": position.supplied_usd.to_string(),
            "borrowedUsd": position.borrowed_usd.to_string(),
            "borrowLimitUsd": position.borrow_limit_usd.to_string(),
            "usage": usage.to_string(),
            "overMax": over_max,
        }))
    }
}

#[async_trait]
impl OperationHandler for StrategyRunner {
    async fn wallet_balances(&self, strategy: &Strategy) -> AppResult<Value> {
        let chain = self.chain.as_ref();
        let reward_token = strategy.contracts.reward_token;

        let operational = chain.native_balance(strategy.operational_wallet).await?;
        let boosting = chain.native_balance(strategy.boosting_wallet).await?;
        let boosting_rewards =
            reader::token_balance(chain, reward_token, strategy.boosting_wallet).await?;
        let logic_rewards =
            reader::token_balance(chain, reward_token, strategy.contracts.logic).await?;

        Ok(json!({
            "operationalWallet": {
                "address": strategy.operational_wallet.to_string(),
                "native": operational.to_string(),
            },
            "boostingWallet": {
                "address": strategy.boosting_wallet.to_string(),
                "native": boosting.to_string(),
                "rewardToken": boosting_rewards.to_string(),
            },
            "logic": {
                "rewardToken": logic_rewards.to_string(),
            },
        }))
    }

    async fn run_operation(
        &self,
        op_type: OperationType,
        strategy: &Strategy,
        farms: &[Farm],
        log: &mut TxLog,
    ) -> AppResult<Value> {
        match op_type {
            OperationType::StrategyRun => match &strategy.settings {
                StrategySettings::Lbf(settings) => {
                    self.rebalancer
                        .strategy_run(strategy, settings, farms, log)
                        .await
                }
                StrategySettings::Lbl(settings) => self.lending_check(strategy, settings).await,
            },
            OperationType::ClaimRun => {
                let last_block = self.operations.last_distribution_block(strategy.id).await?;
                self.claims.run_claim(strategy, farms, last_block, log).await
            }
            OperationType::VenusClaimRun => {
                self.claims.compound_lending_rewards(strategy, log).await
            }
            OperationType::WithdrawAllToStorage => {
                self.rebalancer.withdraw_all(strategy, farms, log).await
            }
            OperationType::RecreateReserves => match &strategy.settings {
                StrategySettings::Lbf(_) => {
                    self.rebalancer.recreate_reserves(strategy, farms, log).await
                }
                StrategySettings::Lbl(_) => Err(AppError::Validation(format!(
                    "strategy {} has no LP reserves",
                    strategy.id
                ))),
            },
        }
    }

    async fn run_check(
        &self,
        check: CronCheck,
        strategy: &Strategy,
        farms: &[Farm],
    ) -> AppResult<Value> {
        let chain = self.chain.as_ref();
        let common = strategy.settings.common();

        match check {
            CronCheck::AdminBalance => {
                let wallet = strategy.operational_wallet;
                let balance = chain.native_balance(wallet).await?;
                let minimum = decimal_to_wei(common.min_admin_balance);
                if balance < minimum {
                    self.notifier
                        .notify(NotificationEvent::LowAdminBalance {
                            strategy_id: strategy.id,
                            wallet,
                            balance,
                            minimum,
                        })
                        .await;
                }
                Ok(json!({ "balance": balance.to_string(), "low": balance < minimum }))
            }
            CronCheck::AnalyticsSnapshot => {
                let report = AnalyticsReport::compute(chain, strategy, farms).await?;
                let details = report.to_json();
                self.analytics
                    .save_snapshot(strategy.id, report.net_usd, &details)
                    .await?;
                info!(
                    strategy_id = strategy.id,
                    net_usd = %report.net_usd,
                    "Analytics snapshot saved"
                );
                Ok(details)
            }
            CronCheck::BoostingBalance => {
                let wallet = strategy.boosting_wallet;
                let balance =
                    reader::token_balance(chain, strategy.contracts.reward_token, wallet).await?;
                let minimum = decimal_to_wei(common.min_boosting_balance);
                if balance < minimum {
                    self.notifier
                        .notify(NotificationEvent::LowBoostingBalance {
                            strategy_id: strategy.id,
                            wallet,
                            balance,
                            minimum,
                        })
                        .await;
                }
                Ok(json!({ "balance": balance.to_string(), "low": balance < minimum }))
            }
        }
    }
}
