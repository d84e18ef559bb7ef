//! Boosting top-up: reward tokens sent from the boosting wallet to storage
//! for every block elapsed since the last distribution

use super::reader;
use super::TxLog;
use crate::chain::{methods, ChainClient, TransactionIntent};
use crate::error::AppResult;
use crate::models::Strategy;
use crate::notifications::{NotificationEvent, NotificationSink};
use crate::utils::decimal_to_wei;
use alloy_primitives::U256;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Amount of one top-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoostingTopUp {
    pub blocks: u64,
    pub required: U256,
}

impl BoostingTopUp {
    /// `None` without a previous distribution block or when no block elapsed
    pub fn compute(tokens_per_block: U256, last_block: Option<u64>, current_block: u64) -> Option<Self> {
        let blocks = current_block.checked_sub(last_block?)?;
        if blocks == 0 || tokens_per_block.is_zero() {
            return None;
        }
        Some(Self {
            blocks,
            required: tokens_per_block.saturating_mul(U256::from(blocks)),
        })
    }
}

/// Transfer the top-up, all-or-nothing. An underfunded wallet is reported and
/// nothing is sent.
pub async fn top_up(
    chain: &Arc<dyn ChainClient>,
    notifier: &Arc<dyn NotificationSink>,
    strategy: &Strategy,
    last_block: Option<u64>,
    current_block: u64,
    log: &mut TxLog,
) -> AppResult<Value> {
    let common = strategy.settings.common();
    let tokens_per_block = decimal_to_wei(common.boosting_tokens_per_block);

    let Some(top_up) = BoostingTopUp::compute(tokens_per_block, last_block, current_block) else {
        return Ok(json!({ "skipped": "no elapsed blocks" }));
    };

    let reward_token = strategy.contracts.reward_token;
    let available =
        reader::token_balance(chain.as_ref(), reward_token, strategy.boosting_wallet).await?;

    if available < top_up.required {
        warn!(
            strategy_id = strategy.id,
            required = %top_up.required,
            available = %available,
            "Boosting wallet underfunded"
        );
        notifier
            .notify(NotificationEvent::BoostingUnderfunded {
                strategy_id: strategy.id,
                required: top_up.required,
                available,
            })
            .await;
        return Ok(json!({
            "required": top_up.required.to_string(),
            "available": available.to_string(),
            "sent": false,
        }));
    }

    let intent = TransactionIntent::new(
        strategy.boosting_signer(),
        reward_token,
        methods::TRANSFER,
        vec![strategy.contracts.storage.into(), top_up.required.into()],
    );
    let receipt = log.send(chain.as_ref(), &intent).await?;

    info!(
        strategy_id = strategy.id,
        amount = %top_up.required,
        blocks = top_up.blocks,
        tx_hash = %receipt.tx_hash,
        "Boosting topped up"
    );
    notifier
        .notify(NotificationEvent::BoostingToppedUp {
            strategy_id: strategy.id,
            amount: top_up.required,
            blocks: top_up.blocks,
        })
        .await;

    Ok(json!({
        "required": top_up.required.to_string(),
        "blocks": top_up.blocks,
        "sent": true,
    }))
}
