//! Claim distributor
//!
//! Harvests every yield source into the reward token, prices the strategy's
//! net result in reward tokens and distributes up to the per-run cap.

use super::analytics::AnalyticsReport;
use super::boosting;
use super::multicall::{CallItem, MulticallSubmitter};
use super::reader;
use super::{ensure_approvals, logic_intent, swap_intent, TxLog};
use crate::chain::{methods, ChainClient};
use crate::constants::DUST_THRESHOLD;
use crate::error::AppResult;
use crate::models::{Farm, Strategy, StrategyKind};
use crate::notifications::{NotificationEvent, NotificationSink};
use crate::utils::{apply_slippage, decimal_to_wei, mul_div, wad_div, wad_mul};
use alloy_primitives::{Address, U256};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

/// Upper bound for one run. Without `even_if_negative` the computed amount
/// (zero for a non-positive result) also bounds it.
pub fn distribution_cap(computed: U256, max_per_run: U256, even_if_negative: bool) -> U256 {
    if even_if_negative {
        max_per_run
    } else {
        computed.min(max_per_run)
    }
}

pub fn distributable_amount(available: U256, cap: U256) -> U256 {
    available.min(cap)
}

pub struct ClaimDistributor {
    chain: Arc<dyn ChainClient>,
    submitter: Arc<MulticallSubmitter>,
    notifier: Arc<dyn NotificationSink>,
}

impl ClaimDistributor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        submitter: Arc<MulticallSubmitter>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            chain,
            submitter,
            notifier,
        }
    }

    /// CLAIM_RUN. `last_distribution_block` is the block of the previous run
    /// that distributed something, used to size the boosting top-up.
    pub async fn run_claim(
        &self,
        strategy: &Strategy,
        farms: &[Farm],
        last_distribution_block: Option<u64>,
        log: &mut TxLog,
    ) -> AppResult<Value> {
        let chain = self.chain.as_ref();
        let contracts = &strategy.contracts;
        let common = strategy.settings.common();
        let logic = contracts.logic;
        let reward_token = contracts.reward_token;

        let current_block = chain.block_number().await?;
        let reward_before = reader::token_balance(chain, reward_token, logic).await?;

        self.harvest(strategy, farms, log).await?;

        let reward_after = reader::token_balance(chain, reward_token, logic).await?;
        let earned = reward_after.saturating_sub(reward_before);
        let price = reader::token_price(chain, contracts.oracle, reward_token).await?;

        let report = AnalyticsReport::compute(chain, strategy, farms).await?;
        let net_usd = report.net_usd;
        let computed = if net_usd.is_positive() && !price.is_zero() {
            wad_div(net_usd.into_raw(), price)
        } else {
            U256::ZERO
        };

        if net_usd.is_negative() && common.notifications_enabled {
            self.notifier
                .notify(NotificationEvent::NegativeResult {
                    strategy_id: strategy.id,
                    usd: net_usd,
                })
                .await;
        }

        let cap = distribution_cap(
            computed,
            decimal_to_wei(common.max_rewards_per_run),
            common.distribute_even_if_negative,
        );
        let amount = distributable_amount(reward_after, cap);

        let distributed = if amount <= DUST_THRESHOLD {
            info!(
                strategy_id = strategy.id,
                amount = %amount,
                "Distributable amount below one token, skipping"
            );
            if common.notifications_enabled {
                self.notifier
                    .notify(NotificationEvent::RewardsNotDistributed {
                        strategy_id: strategy.id,
                        amount,
                        reason: "distributable amount does not exceed one token".to_string(),
                    })
                    .await;
            }
            U256::ZERO
        } else {
            let receipt = log
                .send(
                    chain,
                    &logic_intent(strategy, methods::DISTRIBUTE_REWARDS, vec![amount.into()]),
                )
                .await?;
            info!(
                strategy_id = strategy.id,
                amount = %amount,
                tx_hash = %receipt.tx_hash,
                "Rewards distributed"
            );
            if common.notifications_enabled {
                self.notifier
                    .notify(NotificationEvent::RewardsDistributed {
                        strategy_id: strategy.id,
                        amount,
                        usd: wad_mul(amount, price),
                    })
                    .await;
            }
            amount
        };

        let boosting = if common.boosting_enabled && !distributed.is_zero() {
            boosting::top_up(
                &self.chain,
                &self.notifier,
                strategy,
                last_distribution_block,
                current_block,
                log,
            )
            .await?
        } else {
            Value::Null
        };

        Ok(json!({
            "earned": earned.to_string(),
            "price": price.to_string(),
            "usdValue": wad_mul(earned, price).to_string(),
            "netResultUsd": net_usd.to_string(),
            "distributedAmount": distributed.to_string(),
            "lastProcessedBlock": current_block,
            "walletAddress": strategy.operational_wallet.to_string(),
            "boosting": boosting,
        }))
    }

    /// Claim lending rewards, harvest farms (land-borrow-farm only) and redeem
    /// interest, then swap everything harvested into the reward token
    async fn harvest(&self, strategy: &Strategy, farms: &[Farm], log: &mut TxLog) -> AppResult<()> {
        let chain = self.chain.as_ref();
        let contracts = &strategy.contracts;
        let logic = contracts.logic;
        let harvest_farms = strategy.kind() == StrategyKind::Lbf;

        let mut sources: BTreeSet<Address> = BTreeSet::new();
        sources.insert(contracts.lending_reward_token);
        if harvest_farms {
            sources.extend(farms.iter().filter(|farm| farm.is_active).map(|farm| farm.reward_token));
        }
        sources.extend(contracts.interest_markets.iter().map(|market| market.token));
        sources.remove(&contracts.reward_token);
        let sources: Vec<Address> = sources.into_iter().collect();

        let before = reader::token_balances(chain, &sources, logic).await?;

        log.send(
            chain,
            &logic_intent(strategy, methods::CLAIM_LENDING_REWARDS, vec![]),
        )
        .await?;

        if harvest_farms {
            // A zero deposit harvests pending farm rewards
            let items: Vec<CallItem> = farms
                .iter()
                .filter(|farm| farm.is_active)
                .map(|farm| {
                    CallItem::new(
                        logic_intent(
                            strategy,
                            methods::DEPOSIT,
                            vec![farm.master_chef.into(), farm.pid.into(), U256::ZERO.into()],
                        ),
                        json!({ "farmId": farm.id, "harvest": true }),
                    )
                })
                .collect();
            self.submitter.submit(items, log).await?;
        }

        let redeem: Vec<CallItem> = contracts
            .interest_markets
            .iter()
            .map(|market| {
                CallItem::new(
                    logic_intent(strategy, methods::REDEEM_INTEREST, vec![market.v_token.into()]),
                    json!({ "token": market.token.to_string() }),
                )
            })
            .collect();
        self.submitter.submit(redeem, log).await?;

        let after = reader::token_balances(chain, &sources, logic).await?;
        let harvested: BTreeMap<Address, U256> = sources
            .iter()
            .map(|token| {
                let gained = after
                    .get(token)
                    .copied()
                    .unwrap_or(U256::ZERO)
                    .saturating_sub(before.get(token).copied().unwrap_or(U256::ZERO));
                (*token, gained)
            })
            .filter(|(_, gained)| !gained.is_zero())
            .collect();

        self.swap_into(strategy, &harvested, contracts.reward_token, log)
            .await
    }

    /// Swap each amount into `target` with a price-derived minimum output
    async fn swap_into(
        &self,
        strategy: &Strategy,
        amounts: &BTreeMap<Address, U256>,
        target: Address,
        log: &mut TxLog,
    ) -> AppResult<()> {
        if amounts.is_empty() {
            return Ok(());
        }
        let chain = self.chain.as_ref();
        let contracts = &strategy.contracts;
        let slippage = strategy.settings.common().slippage_bps;

        let mut tokens: Vec<Address> = amounts.keys().copied().collect();
        tokens.push(target);
        let prices = reader::token_prices(chain, contracts.oracle, &tokens).await?;
        let price_of = |token: &Address| prices.get(token).copied().unwrap_or(U256::ZERO);

        let approvals = amounts
            .iter()
            .map(|(token, amount)| ((*token, contracts.router), *amount))
            .collect();
        ensure_approvals(chain, &self.submitter, strategy, approvals, log).await?;

        let target_price = price_of(&target);
        let swaps: Vec<CallItem> = amounts
            .iter()
            .map(|(token, amount)| {
                let expected = mul_div(*amount, price_of(token), target_price);
                CallItem::new(
                    swap_intent(
                        strategy,
                        *token,
                        target,
                        *amount,
                        apply_slippage(expected, slippage),
                    ),
                    json!({ "from": token.to_string(), "to": target.to_string() }),
                )
            })
            .collect();
        self.submitter.submit(swaps, log).await?;
        Ok(())
    }

    /// VENUS_CLAIM_RUN: claim lending rewards, swap them into the base asset
    /// and supply it back to its market. Nothing is distributed.
    pub async fn compound_lending_rewards(
        &self,
        strategy: &Strategy,
        log: &mut TxLog,
    ) -> AppResult<Value> {
        let chain = self.chain.as_ref();
        let contracts = &strategy.contracts;
        let logic = contracts.logic;
        let base = contracts.base_asset;
        let reward = contracts.lending_reward_token;

        let reward_before = reader::token_balance(chain, reward, logic).await?;
        let base_before = reader::token_balance(chain, base.token, logic).await?;

        log.send(
            chain,
            &logic_intent(strategy, methods::CLAIM_LENDING_REWARDS, vec![]),
        )
        .await?;

        let claimed = reader::token_balance(chain, reward, logic)
            .await?
            .saturating_sub(reward_before);

        if reward != base.token && !claimed.is_zero() {
            let amounts = BTreeMap::from([(reward, claimed)]);
            self.swap_into(strategy, &amounts, base.token, log).await?;
        }

        let supplied = reader::token_balance(chain, base.token, logic)
            .await?
            .saturating_sub(base_before);
        if !supplied.is_zero() {
            log.send(
                chain,
                &logic_intent(
                    strategy,
                    methods::MINT,
                    vec![base.v_token.into(), supplied.into()],
                ),
            )
            .await?;
        }

        info!(
            strategy_id = strategy.id,
            claimed = %claimed,
            supplied = %supplied,
            "Lending rewards compounded"
        );

        Ok(json!({
            "claimed": claimed.to_string(),
            "supplied": supplied.to_string(),
            "walletAddress": strategy.operational_wallet.to_string(),
        }))
    }
}
