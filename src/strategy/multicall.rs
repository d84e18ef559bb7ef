//! Grouped submission of same-target, same-method writes

use super::TxLog;
use crate::chain::{methods, ChainClient, ChainValue, TransactionIntent};
use crate::error::{AppError, AppResult};
use alloy_primitives::U256;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// One write plus free-form context used for logging
#[derive(Debug, Clone)]
pub struct CallItem {
    pub intent: TransactionIntent,
    pub meta: Value,
}

impl CallItem {
    pub fn new(intent: TransactionIntent, meta: Value) -> Self {
        Self { intent, meta }
    }
}

pub struct MulticallSubmitter {
    chain: Arc<dyn ChainClient>,
    batching_enabled: bool,
}

impl MulticallSubmitter {
    pub fn new(chain: Arc<dyn ChainClient>, batching_enabled: bool) -> Self {
        Self {
            chain,
            batching_enabled,
        }
    }

    pub fn batching_enabled(&self) -> bool {
        self.batching_enabled
    }

    /// Submit `items` in order. All items must share target, method and signer.
    ///
    /// With batching enabled and more than one item, a single `multicall`
    /// transaction is sent and its failure fails the whole group. Otherwise
    /// items are sent one by one and the first failure stops the group.
    /// Receipts land in `log` as soon as they are mined, so a failing group
    /// still leaves the earlier ones recorded.
    pub async fn submit(&self, items: Vec<CallItem>, log: &mut TxLog) -> AppResult<()> {
        let Some(first) = items.first() else {
            return Ok(());
        };

        let (to, method, signer) = (
            first.intent.to,
            first.intent.method.clone(),
            first.intent.signer.clone(),
        );
        if let Some(stray) = items.iter().find(|item| {
            item.intent.to != to || item.intent.method != method || item.intent.signer != signer
        }) {
            return Err(AppError::Validation(format!(
                "multicall group for {}.{} contains {}.{}",
                to, method, stray.intent.to, stray.intent.method
            )));
        }

        if self.batching_enabled && items.len() > 1 {
            let value = items
                .iter()
                .fold(U256::ZERO, |acc, item| acc.saturating_add(item.intent.value));
            let calls = items
                .iter()
                .map(|item| ChainValue::Call {
                    method: item.intent.method.clone(),
                    args: item.intent.args.clone(),
                })
                .collect();

            let batch = TransactionIntent {
                signer,
                to,
                method: methods::MULTICALL.to_string(),
                args: vec![ChainValue::Array(calls)],
                value,
            };

            let receipt = log.send(self.chain.as_ref(), &batch).await?;
            info!(
                target_contract = %to,
                method = %method,
                calls = items.len(),
                tx_hash = %receipt.tx_hash,
                "Multicall submitted"
            );
            return Ok(());
        }

        for item in &items {
            let receipt = log.send(self.chain.as_ref(), &item.intent).await?;
            debug!(
                target_contract = %to,
                method = %method,
                meta = %item.meta,
                tx_hash = %receipt.tx_hash,
                "Call submitted"
            );
        }
        Ok(())
    }
}
