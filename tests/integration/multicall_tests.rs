//! Multicall Submitter Tests
//!
//! Tests grouped submission against the scripted chain:
//! - Batched groups become one MULTICALL transaction
//! - Unbatched groups are sent in order and stop at the first failure
//! - Receipts mined before a failure stay in the log
//! - Mixed groups are rejected before anything is sent

use alloy_primitives::U256;
use lbf_operator::chain::{methods, ChainValue, TransactionIntent};
use lbf_operator::error::AppError;
use lbf_operator::strategy::{CallItem, MulticallSubmitter, TxLog};
use lbf_operator::testing::fixtures::{self, address};
use lbf_operator::testing::FakeChain;
use serde_json::json;
use std::sync::Arc;

fn borrow_item(amount: u64) -> CallItem {
    let strategy = fixtures::lbf_strategy(1);
    CallItem::new(
        TransactionIntent::new(
            strategy.operational_signer(),
            strategy.contracts.logic,
            methods::BORROW,
            vec![address(fixtures::V_TOKEN1).into(), U256::from(amount).into()],
        ),
        json!({ "amount": amount }),
    )
}

#[tokio::test]
async fn test_batched_group_is_one_transaction() {
    let chain = Arc::new(FakeChain::new());
    let submitter = MulticallSubmitter::new(chain.clone(), true);
    let mut log = TxLog::new();

    submitter
        .submit(vec![borrow_item(1), borrow_item(2), borrow_item(3)], &mut log)
        .await
        .unwrap();

    assert_eq!(log.receipts.len(), 1);
    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, methods::MULTICALL);
    assert_eq!(sent[0].to, address(fixtures::LOGIC));

    let ChainValue::Array(calls) = &sent[0].args[0] else {
        panic!("multicall payload must be an array");
    };
    assert_eq!(calls.len(), 3);
    assert!(calls
        .iter()
        .all(|call| matches!(call, ChainValue::Call { method, .. } if method == methods::BORROW)));
}

#[tokio::test]
async fn test_single_item_is_sent_directly() {
    let chain = Arc::new(FakeChain::new());
    let submitter = MulticallSubmitter::new(chain.clone(), true);
    let mut log = TxLog::new();

    submitter.submit(vec![borrow_item(1)], &mut log).await.unwrap();

    assert_eq!(chain.sent_methods(), vec![methods::BORROW.to_string()]);
    assert_eq!(log.receipts.len(), 1);
}

#[tokio::test]
async fn test_unbatched_group_is_sent_in_order() {
    let chain = Arc::new(FakeChain::new());
    let submitter = MulticallSubmitter::new(chain.clone(), false);
    let mut log = TxLog::new();

    submitter
        .submit(vec![borrow_item(1), borrow_item(2)], &mut log)
        .await
        .unwrap();

    assert_eq!(log.receipts.len(), 2);
    let amounts: Vec<ChainValue> = chain.sent().iter().map(|intent| intent.args[1].clone()).collect();
    assert_eq!(
        amounts,
        vec![ChainValue::Uint(U256::from(1u64)), ChainValue::Uint(U256::from(2u64))]
    );
}

#[tokio::test]
async fn test_mixed_group_rejected() {
    let chain = Arc::new(FakeChain::new());
    let submitter = MulticallSubmitter::new(chain.clone(), true);
    let mut log = TxLog::new();

    let mut stray = borrow_item(2);
    stray.intent.method = methods::REPAY_BORROW.to_string();

    let err = submitter
        .submit(vec![borrow_item(1), stray], &mut log)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(chain.sent().is_empty());
    assert!(log.receipts.is_empty());
}

#[tokio::test]
async fn test_empty_group_sends_nothing() {
    let chain = Arc::new(FakeChain::new());
    let submitter = MulticallSubmitter::new(chain.clone(), true);
    let mut log = TxLog::new();

    submitter.submit(Vec::new(), &mut log).await.unwrap();

    assert!(log.receipts.is_empty());
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_failure_stops_group() {
    let chain = Arc::new(FakeChain::new());
    chain.fail_method(methods::BORROW);
    let submitter = MulticallSubmitter::new(chain.clone(), false);
    let mut log = TxLog::new();

    let err = submitter
        .submit(vec![borrow_item(1), borrow_item(2)], &mut log)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Chain(_)));
    assert!(chain.sent().is_empty());
    assert!(log.receipts.is_empty());
}

#[tokio::test]
async fn test_mined_receipts_kept_when_later_send_fails() {
    let chain = Arc::new(FakeChain::new());
    chain.fail_after_sends(1);
    let submitter = MulticallSubmitter::new(chain.clone(), false);
    let mut log = TxLog::new();

    let result = submitter
        .submit(vec![borrow_item(1), borrow_item(2), borrow_item(3)], &mut log)
        .await;

    assert!(result.is_err());
    assert_eq!(chain.sent().len(), 1);
    assert_eq!(log.receipts.len(), 1);
}

#[tokio::test]
async fn test_failed_multicall_fails_whole_group() {
    let chain = Arc::new(FakeChain::new());
    chain.fail_method(methods::MULTICALL);
    let submitter = MulticallSubmitter::new(chain.clone(), true);
    let mut log = TxLog::new();

    assert!(submitter
        .submit(vec![borrow_item(1), borrow_item(2)], &mut log)
        .await
        .is_err());
    assert_eq!(chain.count_sent(methods::BORROW), 0);
    assert!(log.receipts.is_empty());
}
