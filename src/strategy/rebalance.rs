//! Rebalancing engine
//!
//! Keeps the borrowed amount of a land-borrow-farm strategy inside the band
//! `[limit * min, limit * max]`: liquidity is added below the band and removed
//! proportionally above it. Also hosts the teardown flows used by the
//! withdraw-all and recreate-reserves operations.

use super::multicall::{CallItem, MulticallSubmitter};
use super::pair_math::{calc_pair_amounts, PairAmounts};
use super::reader::{self, LendingPosition};
use super::{ensure_approvals, logic_intent, swap_intent, TxLog};
use crate::chain::{methods, ChainClient};
use crate::constants::{BPS_DENOMINATOR, WAD};
use crate::error::AppResult;
use crate::models::{Farm, LbfSettings, LendingMarket, Strategy};
use crate::notifications::{NotificationEvent, NotificationSink};
use crate::utils::{apply_slippage, decimal_to_wei, mul_div, wad_div, wad_mul, wei_to_decimal};
use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Borrow-limit band, each bound a 1e18-scaled share of the limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowThresholds {
    pub min: U256,
    pub target: U256,
    pub max: U256,
}

impl BorrowThresholds {
    pub fn from_settings(settings: &LbfSettings) -> Self {
        Self {
            min: decimal_to_wei(settings.borrow_limit_percentage_min),
            target: decimal_to_wei(settings.borrow_limit_percentage),
            max: decimal_to_wei(settings.borrow_limit_percentage_max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceDecision {
    /// Add liquidity worth this much USD (1e18)
    Add { liquidity_usd: U256 },
    /// Remove this share (1e18 = everything) of every farm position
    Remove { destruct_percentage: U256 },
    Hold,
}

/// Decide the movement for `position`. `preserve` is the 1e18-scaled share of
/// the borrow limit kept unused; strictly inside the band nothing happens.
pub fn decide(
    position: &LendingPosition,
    thresholds: &BorrowThresholds,
    preserve: U256,
) -> RebalanceDecision {
    let limit = wad_mul(position.borrow_limit_usd, WAD.saturating_sub(preserve));
    let borrowed = position.borrowed_usd;
    let target = wad_mul(limit, thresholds.target);

    if borrowed < wad_mul(limit, thresholds.min) {
        let liquidity_usd = target.saturating_sub(borrowed);
        if liquidity_usd.is_zero() {
            return RebalanceDecision::Hold;
        }
        RebalanceDecision::Add { liquidity_usd }
    } else if borrowed > wad_mul(limit, thresholds.max) {
        let destruct_percentage = wad_div(borrowed - target.min(borrowed), borrowed).min(WAD);
        RebalanceDecision::Remove {
            destruct_percentage,
        }
    } else {
        RebalanceDecision::Hold
    }
}

/// Result of unstaking and removing liquidity
#[derive(Debug, Clone, Default)]
pub struct TeardownOutcome {
    /// Token amounts returned to the logic contract, per lending market
    pub freed: BTreeMap<LendingMarket, U256>,
    pub payload: Value,
}

pub struct RebalancingEngine {
    chain: Arc<dyn ChainClient>,
    submitter: Arc<MulticallSubmitter>,
    notifier: Arc<dyn NotificationSink>,
}

fn distinct_markets<'a>(farms: impl IntoIterator<Item = &'a Farm>) -> Vec<LendingMarket> {
    farms
        .into_iter()
        .flat_map(|farm| [farm.token1, farm.token2])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn amount_of(map: &BTreeMap<Address, U256>, token: &Address) -> U256 {
    map.get(token).copied().unwrap_or(U256::ZERO)
}

impl RebalancingEngine {
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

    /// STRATEGY_RUN for a land-borrow-farm strategy
    pub async fn strategy_run(
        &self,
        strategy: &Strategy,
        settings: &LbfSettings,
        farms: &[Farm],
        log: &mut TxLog,
    ) -> AppResult<Value> {
        let chain = self.chain.as_ref();
        let position = reader::lending_position(chain, strategy.contracts.logic).await?;
        let storage_usd =
            reader::storage_total_deposit(chain, strategy.contracts.storage).await?;
        let preserve = decimal_to_wei(settings.preserve_percent(wei_to_decimal(storage_usd)));
        let decision = decide(&position, &BorrowThresholds::from_settings(settings), preserve);

        info!(
            strategy_id = strategy.id,
            borrowed_usd = %position.borrowed_usd,
            limit_usd = %position.borrow_limit_usd,
            decision = ?decision,
            "Rebalance decision"
        );

        let details = match decision {
            RebalanceDecision::Add { liquidity_usd } => {
                self.add_liquidity(strategy, farms, liquidity_usd, true, log)
                    .await?
            }
            RebalanceDecision::Remove {
                destruct_percentage,
            } => {
                let outcome = self
                    .teardown(strategy, farms, destruct_percentage, false, log)
                    .await?;
                let repaid = self.repay_borrows(strategy, &outcome.freed, log).await?;
                json!({ "teardown": outcome.payload, "repaid": repaid })
            }
            RebalanceDecision::Hold => json!({}),
        };

        Ok(json!({
            "suppliedUsd": position.supplied_usd.to_string(),
            "borrowedUsd": position.borrowed_usd.to_string(),
            "borrowLimitUsd": position.borrow_limit_usd.to_string(),
            "storageUsd": storage_usd.to_string(),
            "preservePercentage": preserve.to_string(),
            "decision": decision_label(&decision),
            "details": details,
        }))
    }

    /// Borrow what the held balances do not cover, add liquidity to every
    /// active farm by its percentage and stake the LP tokens.
    ///
    /// With `allow_borrow` off, amounts are clipped to held balances.
    pub async fn add_liquidity(
        &self,
        strategy: &Strategy,
        farms: &[Farm],
        liquidity_usd: U256,
        allow_borrow: bool,
        log: &mut TxLog,
    ) -> AppResult<Value> {
        let chain = self.chain.as_ref();
        let logic = strategy.contracts.logic;
        let farms: Vec<&Farm> = farms
            .iter()
            .filter(|farm| farm.is_active && farm.percentage > Decimal::ZERO)
            .collect();

        if farms.is_empty() || liquidity_usd.is_zero() {
            return Ok(json!({ "liquidityUsd": liquidity_usd.to_string(), "farms": [] }));
        }

        let tokens: Vec<Address> = distinct_markets(farms.iter().copied())
            .iter()
            .map(|market| market.token)
            .collect();
        let mut held = reader::token_balances(chain, &tokens, logic).await?;
        let prices = reader::token_prices(chain, strategy.contracts.oracle, &tokens).await?;

        // Shared tokens are consumed farm by farm so a balance is never counted twice
        let mut plans: Vec<(&Farm, PairAmounts)> = Vec::with_capacity(farms.len());
        let mut borrows: BTreeMap<LendingMarket, U256> = BTreeMap::new();
        for farm in farms.iter().copied() {
            let farm_liquidity = wad_mul(liquidity_usd, decimal_to_wei(farm.percentage));
            let (reserve1, reserve2) =
                reader::pair_reserves(chain, farm.pair, farm.token1.token).await?;
            let held1 = amount_of(&held, &farm.token1.token);
            let held2 = amount_of(&held, &farm.token2.token);

            let mut amounts = calc_pair_amounts(
                farm_liquidity,
                amount_of(&prices, &farm.token1.token),
                amount_of(&prices, &farm.token2.token),
                reserve1,
                reserve2,
                held1,
                held2,
            );
            if !allow_borrow {
                amounts.token1_amount = amounts.token1_amount.min(held1);
                amounts.token2_amount = amounts.token2_amount.min(held2);
                amounts.token1_borrow = U256::ZERO;
                amounts.token2_borrow = U256::ZERO;
            }

            held.insert(farm.token1.token, held1.saturating_sub(amounts.token1_amount));
            held.insert(farm.token2.token, held2.saturating_sub(amounts.token2_amount));
            *borrows.entry(farm.token1).or_default() += amounts.token1_borrow;
            *borrows.entry(farm.token2).or_default() += amounts.token2_borrow;
            plans.push((farm, amounts));
        }

        // One borrow per market
        let borrow_items: Vec<CallItem> = borrows
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(market, amount)| {
                CallItem::new(
                    logic_intent(
                        strategy,
                        methods::BORROW,
                        vec![market.v_token.into(), (*amount).into()],
                    ),
                    json!({ "token": market.token.to_string() }),
                )
            })
            .collect();
        self.submitter.submit(borrow_items, log).await?;

        let mut spend: BTreeMap<(Address, Address), U256> = BTreeMap::new();
        for (farm, amounts) in &plans {
            *spend.entry((farm.token1.token, farm.router)).or_default() += amounts.token1_amount;
            *spend.entry((farm.token2.token, farm.router)).or_default() += amounts.token2_amount;
        }
        ensure_approvals(self.chain.as_ref(), &self.submitter, strategy, spend, log).await?;

        let slippage = strategy.settings.common().slippage_bps;
        let add_items: Vec<CallItem> = plans
            .iter()
            .filter(|(_, amounts)| !amounts.token1_amount.is_zero() && !amounts.token2_amount.is_zero())
            .map(|(farm, amounts)| {
                CallItem::new(
                    logic_intent(
                        strategy,
                        methods::ADD_LIQUIDITY,
                        vec![
                            farm.router.into(),
                            farm.token1.token.into(),
                            farm.token2.token.into(),
                            amounts.token1_amount.into(),
                            amounts.token2_amount.into(),
                            apply_slippage(amounts.token1_amount, slippage).into(),
                            apply_slippage(amounts.token2_amount, slippage).into(),
                        ],
                    ),
                    json!({ "farmId": farm.id }),
                )
            })
            .collect();
        self.submitter.submit(add_items, log).await?;

        let staked = self.stake_all(strategy, &farms, log).await?;

        let farm_payload: Vec<Value> = plans
            .iter()
            .map(|(farm, amounts)| {
                json!({
                    "farmId": farm.id,
                    "token1Amount": amounts.token1_amount.to_string(),
                    "token2Amount": amounts.token2_amount.to_string(),
                    "token1Borrow": amounts.token1_borrow.to_string(),
                    "token2Borrow": amounts.token2_borrow.to_string(),
                    "lpStaked": amount_of(&staked, &farm.pair).to_string(),
                })
            })
            .collect();

        Ok(json!({
            "liquidityUsd": liquidity_usd.to_string(),
            "farms": farm_payload,
        }))
    }

    /// Stake every LP token the logic contract holds; returns staked amounts per pair
    async fn stake_all(
        &self,
        strategy: &Strategy,
        farms: &[&Farm],
        log: &mut TxLog,
    ) -> AppResult<BTreeMap<Address, U256>> {
        let chain = self.chain.as_ref();
        let pairs: Vec<Address> = farms.iter().map(|farm| farm.pair).collect();
        let lp_balances = reader::token_balances(chain, &pairs, strategy.contracts.logic).await?;

        let mut approvals = BTreeMap::new();
        for farm in farms {
            approvals.insert((farm.pair, farm.master_chef), amount_of(&lp_balances, &farm.pair));
        }
        ensure_approvals(self.chain.as_ref(), &self.submitter, strategy, approvals, log).await?;

        let deposits: Vec<CallItem> = farms
            .iter()
            .filter(|farm| !amount_of(&lp_balances, &farm.pair).is_zero())
            .map(|farm| {
                CallItem::new(
                    logic_intent(
                        strategy,
                        methods::DEPOSIT,
                        vec![
                            farm.master_chef.into(),
                            farm.pid.into(),
                            amount_of(&lp_balances, &farm.pair).into(),
                        ],
                    ),
                    json!({ "farmId": farm.id }),
                )
            })
            .collect();
        self.submitter.submit(deposits, log).await?;

        Ok(lp_balances)
    }

    /// Unstake and remove `percentage` (1e18 = all) of every farm position.
    ///
    /// Only a full teardown (`percentage == 1e18` with `repay_all`) repays every
    /// loan and deletes the reserve list; a partial teardown just frees tokens.
    pub async fn teardown(
        &self,
        strategy: &Strategy,
        farms: &[Farm],
        percentage: U256,
        repay_all: bool,
        log: &mut TxLog,
    ) -> AppResult<TeardownOutcome> {
        let chain = self.chain.as_ref();
        let logic = strategy.contracts.logic;
        let percentage = percentage.min(WAD);
        let is_full = percentage == WAD;

        let markets = distinct_markets(farms);
        let tokens: Vec<Address> = markets.iter().map(|market| market.token).collect();
        let before = reader::token_balances(chain, &tokens, logic).await?;

        let mut unstaked: BTreeMap<Address, U256> = BTreeMap::new();
        let mut withdraw_items = Vec::new();
        for farm in farms {
            let staked = reader::staked_lp(chain, farm.master_chef, farm.pid, logic).await?;
            let amount = if is_full {
                staked
            } else {
                wad_mul(staked, percentage)
            };
            if amount.is_zero() {
                continue;
            }
            *unstaked.entry(farm.pair).or_default() += amount;
            withdraw_items.push(CallItem::new(
                logic_intent(
                    strategy,
                    methods::WITHDRAW,
                    vec![farm.master_chef.into(), farm.pid.into(), amount.into()],
                ),
                json!({ "farmId": farm.id }),
            ));
        }
        self.submitter.submit(withdraw_items, log).await?;

        let pairs: Vec<Address> = farms.iter().map(|farm| farm.pair).collect();
        let lp_balances = reader::token_balances(chain, &pairs, logic).await?;

        let mut removals: Vec<(&Farm, U256)> = Vec::new();
        for farm in farms {
            let held = amount_of(&lp_balances, &farm.pair);
            let amount = if is_full {
                held
            } else {
                held.min(amount_of(&unstaked, &farm.pair))
            };
            if !amount.is_zero() {
                removals.push((farm, amount));
            }
        }

        let mut approvals = BTreeMap::new();
        for (farm, amount) in &removals {
            approvals.insert((farm.pair, farm.router), *amount);
        }
        ensure_approvals(self.chain.as_ref(), &self.submitter, strategy, approvals, log).await?;

        let slippage = strategy.settings.common().slippage_bps;
        let mut remove_items = Vec::with_capacity(removals.len());
        for (farm, amount) in &removals {
            let (reserve1, reserve2) =
                reader::pair_reserves(chain, farm.pair, farm.token1.token).await?;
            let supply = reader::total_supply(chain, farm.pair).await?;
            let min1 = apply_slippage(mul_div(*amount, reserve1, supply), slippage);
            let min2 = apply_slippage(mul_div(*amount, reserve2, supply), slippage);
            remove_items.push(CallItem::new(
                logic_intent(
                    strategy,
                    methods::REMOVE_LIQUIDITY,
                    vec![
                        farm.router.into(),
                        farm.token1.token.into(),
                        farm.token2.token.into(),
                        (*amount).into(),
                        min1.into(),
                        min2.into(),
                    ],
                ),
                json!({ "farmId": farm.id }),
            ));
        }
        self.submitter.submit(remove_items, log).await?;

        let after = reader::token_balances(chain, &tokens, logic).await?;
        let freed: BTreeMap<LendingMarket, U256> = markets
            .iter()
            .map(|market| {
                let freed =
                    amount_of(&after, &market.token).saturating_sub(amount_of(&before, &market.token));
                (*market, freed)
            })
            .collect();

        let mut payload = json!({
            "percentage": percentage.to_string(),
            "freed": freed
                .iter()
                .map(|(market, amount)| (market.token.to_string(), Value::String(amount.to_string())))
                .collect::<serde_json::Map<_, _>>(),
        });

        if is_full && repay_all {
            let repaid = self.repay_all_loans(strategy, farms, log).await?;
            log.send(
                chain,
                &logic_intent(strategy, methods::DELETE_LP_RESERVES, vec![]),
            )
            .await?;
            payload["repayAll"] = repaid;
            payload["reservesDeleted"] = json!(true);
        }

        info!(
            strategy_id = strategy.id,
            percentage = %percentage,
            full = is_full && repay_all,
            "Teardown finished"
        );

        Ok(TeardownOutcome { freed, payload })
    }

    /// Repay each market's borrow with the tokens freed for it, up to the debt
    pub async fn repay_borrows(
        &self,
        strategy: &Strategy,
        freed: &BTreeMap<LendingMarket, U256>,
        log: &mut TxLog,
    ) -> AppResult<Value> {
        let chain = self.chain.as_ref();
        let logic = strategy.contracts.logic;
        let mut items = Vec::new();
        let mut repaid = serde_json::Map::new();

        for (market, amount) in freed {
            if amount.is_zero() {
                continue;
            }
            let debt = reader::borrow_balance(chain, market.v_token, logic).await?;
            let repay = (*amount).min(debt);
            if repay.is_zero() {
                continue;
            }
            repaid.insert(market.token.to_string(), Value::String(repay.to_string()));
            items.push(CallItem::new(
                logic_intent(
                    strategy,
                    methods::REPAY_BORROW,
                    vec![market.v_token.into(), repay.into()],
                ),
                json!({ "token": market.token.to_string() }),
            ));
        }

        self.submitter.submit(items, log).await?;
        Ok(Value::Object(repaid))
    }

    /// Repay every loan: direct repayment from held balances, surplus swapped
    /// into the base asset, base asset spent on the remaining debts. Debt left
    /// once the base asset is exhausted raises a warning, not an error.
    pub async fn repay_all_loans(
        &self,
        strategy: &Strategy,
        farms: &[Farm],
        log: &mut TxLog,
    ) -> AppResult<Value> {
        let chain = self.chain.as_ref();
        let logic = strategy.contracts.logic;
        let contracts = &strategy.contracts;
        let base = contracts.base_asset;
        let slippage = strategy.settings.common().slippage_bps;

        let markets: Vec<LendingMarket> = distinct_markets(farms)
            .into_iter()
            .filter(|market| *market != base)
            .collect();
        let mut tokens: Vec<Address> = markets.iter().map(|market| market.token).collect();
        tokens.push(base.token);
        let prices = reader::token_prices(chain, contracts.oracle, &tokens).await?;
        let balances = reader::token_balances(chain, &tokens, logic).await?;
        let base_price = amount_of(&prices, &base.token);

        let mut direct = Vec::new();
        let mut remaining: Vec<(LendingMarket, U256)> = Vec::new();
        let mut surplus: Vec<(LendingMarket, U256)> = Vec::new();
        for market in &markets {
            let debt = reader::borrow_balance(chain, market.v_token, logic).await?;
            let balance = amount_of(&balances, &market.token);
            let repay = debt.min(balance);
            if !repay.is_zero() {
                direct.push(CallItem::new(
                    logic_intent(
                        strategy,
                        methods::REPAY_BORROW,
                        vec![market.v_token.into(), repay.into()],
                    ),
                    json!({ "token": market.token.to_string() }),
                ));
            }
            if debt > repay {
                remaining.push((*market, debt - repay));
            }
            if balance > repay {
                surplus.push((*market, balance - repay));
            }
        }
        self.submitter.submit(direct, log).await?;

        let approvals: BTreeMap<(Address, Address), U256> = surplus
            .iter()
            .map(|(market, amount)| ((market.token, contracts.router), *amount))
            .collect();
        ensure_approvals(chain, &self.submitter, strategy, approvals, log).await?;

        let swaps: Vec<CallItem> = surplus
            .iter()
            .map(|(market, amount)| {
                let expected = mul_div(*amount, amount_of(&prices, &market.token), base_price);
                CallItem::new(
                    swap_intent(
                        strategy,
                        market.token,
                        base.token,
                        *amount,
                        apply_slippage(expected, slippage),
                    ),
                    json!({ "from": market.token.to_string(), "to": base.token.to_string() }),
                )
            })
            .collect();
        self.submitter.submit(swaps, log).await?;

        let mut base_balance = reader::token_balance(chain, base.token, logic).await?;
        let base_debt = reader::borrow_balance(chain, base.v_token, logic).await?;
        let base_repay = base_debt.min(base_balance);
        if !base_repay.is_zero() {
            log.send(
                chain,
                &logic_intent(
                    strategy,
                    methods::REPAY_BORROW,
                    vec![base.v_token.into(), base_repay.into()],
                ),
            )
            .await?;
            base_balance -= base_repay;
        }

        if !remaining.is_empty() && !base_balance.is_zero() {
            let approval = BTreeMap::from([((base.token, contracts.router), base_balance)]);
            ensure_approvals(chain, &self.submitter, strategy, approval, log).await?;
        }

        let mut shortfalls = serde_json::Map::new();
        if base_debt > base_repay {
            remaining.push((base, base_debt - base_repay));
        }

        for (market, debt) in remaining {
            let mut repaid = U256::ZERO;
            if market != base {
                let token_price = amount_of(&prices, &market.token);
                let needed = mul_div(debt, token_price, base_price);
                let buffered = mul_div(
                    needed,
                    U256::from(BPS_DENOMINATOR),
                    U256::from(BPS_DENOMINATOR.saturating_sub(slippage as u64).max(1)),
                );
                let spend = buffered.min(base_balance);
                if !spend.is_zero() {
                    let expected = mul_div(spend, base_price, token_price);
                    log.send(
                        chain,
                        &swap_intent(
                            strategy,
                            base.token,
                            market.token,
                            spend,
                            apply_slippage(expected, slippage),
                        ),
                    )
                    .await?;
                    base_balance -= spend;

                    let balance = reader::token_balance(chain, market.token, logic).await?;
                    repaid = balance.min(debt);
                    if !repaid.is_zero() {
                        log.send(
                            chain,
                            &logic_intent(
                                strategy,
                                methods::REPAY_BORROW,
                                vec![market.v_token.into(), repaid.into()],
                            ),
                        )
                        .await?;
                    }
                }
            }

            let shortfall = debt - repaid;
            if !shortfall.is_zero() {
                warn!(
                    strategy_id = strategy.id,
                    token = %market.token,
                    shortfall = %shortfall,
                    "Base asset exhausted before loan was repaid"
                );
                shortfalls.insert(market.token.to_string(), Value::String(shortfall.to_string()));
                self.notifier
                    .notify(NotificationEvent::DebtWarning {
                        strategy_id: strategy.id,
                        token: market.token,
                        shortfall,
                    })
                    .await;
            }
        }

        Ok(json!({
            "baseRemaining": base_balance.to_string(),
            "shortfalls": shortfalls,
        }))
    }

    /// WITHDRAW_ALL_TO_STORAGE: full teardown, then every token balance of the
    /// logic contract goes back to storage
    pub async fn withdraw_all(
        &self,
        strategy: &Strategy,
        farms: &[Farm],
        log: &mut TxLog,
    ) -> AppResult<Value> {
        let chain = self.chain.as_ref();
        let outcome = self.teardown(strategy, farms, WAD, true, log).await?;

        let contracts = &strategy.contracts;
        let mut tokens: BTreeSet<Address> = distinct_markets(farms)
            .iter()
            .map(|market| market.token)
            .collect();
        tokens.insert(contracts.base_asset.token);
        tokens.insert(contracts.reward_token);
        tokens.insert(contracts.lending_reward_token);
        let tokens: Vec<Address> = tokens.into_iter().collect();

        let balances = reader::token_balances(chain, &tokens, contracts.logic).await?;
        let items: Vec<CallItem> = balances
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(token, amount)| {
                CallItem::new(
                    logic_intent(
                        strategy,
                        methods::RETURN_TOKEN,
                        vec![(*token).into(), (*amount).into()],
                    ),
                    json!({ "token": token.to_string() }),
                )
            })
            .collect();
        self.submitter.submit(items, log).await?;

        let returned: serde_json::Map<String, Value> = balances
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(token, amount)| (token.to_string(), Value::String(amount.to_string())))
            .collect();

        Ok(json!({ "teardown": outcome.payload, "returned": returned }))
    }

    /// RECREATE_RESERVES: remove all liquidity without repaying, rebuild the
    /// reserve list and put the freed tokens back without new borrows
    pub async fn recreate_reserves(
        &self,
        strategy: &Strategy,
        farms: &[Farm],
        log: &mut TxLog,
    ) -> AppResult<Value> {
        let chain = self.chain.as_ref();
        let outcome = self.teardown(strategy, farms, WAD, false, log).await?;

        log.send(
            chain,
            &logic_intent(strategy, methods::DELETE_LP_RESERVES, vec![]),
        )
        .await?;

        let reserve_items: Vec<CallItem> = farms
            .iter()
            .filter(|farm| farm.is_active)
            .map(|farm| {
                CallItem::new(
                    logic_intent(
                        strategy,
                        methods::ADD_LP_RESERVE,
                        vec![
                            farm.pair.into(),
                            farm.router.into(),
                            farm.master_chef.into(),
                            farm.pid.into(),
                        ],
                    ),
                    json!({ "farmId": farm.id }),
                )
            })
            .collect();
        let reserves = reserve_items.len();
        self.submitter.submit(reserve_items, log).await?;

        let tokens: Vec<Address> = outcome.freed.keys().map(|market| market.token).collect();
        let prices = reader::token_prices(chain, strategy.contracts.oracle, &tokens).await?;
        let freed_usd = outcome
            .freed
            .iter()
            .fold(U256::ZERO, |acc, (market, amount)| {
                acc.saturating_add(wad_mul(*amount, amount_of(&prices, &market.token)))
            });

        let readded = self
            .add_liquidity(strategy, farms, freed_usd, false, log)
            .await?;

        Ok(json!({
            "teardown": outcome.payload,
            "reservesAdded": reserves,
            "readded": readded,
        }))
    }
}

fn decision_label(decision: &RebalanceDecision) -> String {
    match decision {
        RebalanceDecision::Add { liquidity_usd } => format!("ADD {}", liquidity_usd),
        RebalanceDecision::Remove {
            destruct_percentage,
        } => format!("REMOVE {}", destruct_percentage),
        RebalanceDecision::Hold => "HOLD".to_string(),
    }
}
