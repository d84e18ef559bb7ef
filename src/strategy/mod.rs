//! Strategy domain: rebalancing, claims, boosting and analytics
//!
//! Every component reads through [`ChainClient`] and writes through
//! [`MulticallSubmitter`]; receipts are collected in a [`TxLog`] owned by the
//! caller so they can be recorded even when a later step fails.

pub mod analytics;
pub mod boosting;
pub mod claim;
pub mod multicall;
pub mod pair_math;
pub mod reader;
pub mod rebalance;

pub use analytics::{AnalyticsReport, NetResultInputs};
pub use boosting::BoostingTopUp;
pub use claim::{distributable_amount, distribution_cap, ClaimDistributor};
pub use multicall::{CallItem, MulticallSubmitter};
pub use pair_math::{calc_pair_amounts, PairAmounts};
pub use rebalance::{decide, BorrowThresholds, RebalanceDecision, RebalancingEngine};

use crate::chain::{methods, ChainClient, ChainValue, Receipt, TransactionIntent};
use crate::error::AppResult;
use crate::models::Strategy;
use alloy_primitives::{Address, U256};
use serde_json::json;
use std::collections::BTreeMap;

/// Receipts produced while running one operation
#[derive(Debug, Default)]
pub struct TxLog {
    pub receipts: Vec<Receipt>,
}

impl TxLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit one transaction and keep its receipt
    pub async fn send(
        &mut self,
        chain: &dyn ChainClient,
        intent: &TransactionIntent,
    ) -> AppResult<Receipt> {
        let receipt = chain.send_transaction(intent).await?;
        self.receipts.push(receipt.clone());
        Ok(receipt)
    }
}

/// Write on the strategy's logic contract, signed by the operational key
pub(crate) fn logic_intent(
    strategy: &Strategy,
    method: &str,
    args: Vec<ChainValue>,
) -> TransactionIntent {
    TransactionIntent::new(
        strategy.operational_signer(),
        strategy.contracts.logic,
        method,
        args,
    )
}

/// Exact-input swap through the strategy router
pub(crate) fn swap_intent(
    strategy: &Strategy,
    from: Address,
    to: Address,
    amount: U256,
    min_out: U256,
) -> TransactionIntent {
    logic_intent(
        strategy,
        methods::SWAP_EXACT_TOKENS_FOR_TOKENS,
        vec![
            strategy.contracts.router.into(),
            amount.into(),
            min_out.into(),
            ChainValue::Array(vec![from.into(), to.into()]),
        ],
    )
}

/// Approve every `(token, spender)` whose current allowance from the logic
/// contract is below the amount about to be spent
pub(crate) async fn ensure_approvals(
    chain: &dyn ChainClient,
    submitter: &MulticallSubmitter,
    strategy: &Strategy,
    spend: BTreeMap<(Address, Address), U256>,
    log: &mut TxLog,
) -> AppResult<()> {
    let logic = strategy.contracts.logic;
    let mut items = Vec::new();

    for ((token, spender), needed) in spend {
        if needed.is_zero() {
            continue;
        }
        let current = reader::allowance(chain, token, logic, spender).await?;
        if current < needed {
            items.push(CallItem::new(
                logic_intent(
                    strategy,
                    methods::APPROVE_TOKEN_FOR_SWAP,
                    vec![token.into(), spender.into()],
                ),
                json!({ "token": token.to_string(), "spender": spender.to_string() }),
            ));
        }
    }

    submitter.submit(items, log).await?;
    Ok(())
}
