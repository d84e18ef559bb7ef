//! Rebalancing Engine Tests
//!
//! Drives STRATEGY_RUN against the scripted chain:
//! - Inside the band nothing is sent
//! - Below the band liquidity is borrowed, added and staked
//! - Above the band a share of every position is removed and repaid
//! - Preserve tiers shrink the usable limit
//! - Teardowns, full withdrawal and reserve recreation

use alloy_primitives::{Address, U256};
use lbf_operator::chain::{methods, ChainValue};
use lbf_operator::constants::WAD;
use lbf_operator::models::{LbfSettings, PreserveTier, Strategy, StrategySettings};
use lbf_operator::strategy::{MulticallSubmitter, RebalancingEngine, TxLog};
use lbf_operator::testing::fixtures::{self, address, dec};
use lbf_operator::testing::{FakeChain, RecordingNotifier};
use rust_decimal::Decimal;
use std::sync::Arc;

fn tokens(n: u64) -> U256 {
    U256::from(n) * WAD
}

fn engine(chain: &Arc<FakeChain>, batching: bool) -> RebalancingEngine {
    engine_with_notifier(chain, batching).0
}

fn engine_with_notifier(
    chain: &Arc<FakeChain>,
    batching: bool,
) -> (RebalancingEngine, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let submitter = Arc::new(MulticallSubmitter::new(chain.clone(), batching));
    let engine = RebalancingEngine::new(chain.clone(), submitter, notifier.clone());
    (engine, notifier)
}

fn logic() -> Address {
    address(fixtures::LOGIC)
}

fn script_position(chain: &FakeChain, borrowed: u64, limit: u64) {
    chain.script(
        logic(),
        methods::GET_LENDING_POSITION,
        vec![],
        ChainValue::Array(vec![
            tokens(200).into(),
            tokens(borrowed).into(),
            tokens(limit).into(),
        ]),
    );
}

/// One-dollar tokens in a balanced pool
fn script_market(chain: &FakeChain) {
    let oracle = address(fixtures::ORACLE);
    for token in [fixtures::TOKEN1, fixtures::TOKEN2] {
        chain.script(
            oracle,
            methods::GET_TOKEN_PRICE,
            vec![address(token).into()],
            WAD.into(),
        );
    }
    let pair = address(fixtures::PAIR);
    chain.script(
        pair,
        methods::GET_RESERVES,
        vec![],
        ChainValue::Array(vec![tokens(1000).into(), tokens(1000).into()]),
    );
    chain.script(pair, methods::TOKEN0, vec![], address(fixtures::TOKEN1).into());
    chain.script(pair, methods::TOTAL_SUPPLY, vec![], tokens(1000).into());
}

/// `staked` LP in the farm, `held` LP in the logic contract
fn script_lp(chain: &FakeChain, staked: u64, held: Vec<u64>) {
    chain.script(
        address(fixtures::MASTER_CHEF),
        methods::USER_INFO,
        vec![ChainValue::from(1u64), logic().into()],
        ChainValue::Array(vec![tokens(staked).into(), U256::ZERO.into()]),
    );
    chain.script_sequence(
        address(fixtures::PAIR),
        methods::BALANCE_OF,
        vec![logic().into()],
        held.into_iter().map(|n| tokens(n).into()).collect(),
    );
}

fn script_debt(chain: &FakeChain, v_token: u8, debt: u64) {
    chain.script(
        address(v_token),
        methods::BORROW_BALANCE_CURRENT,
        vec![logic().into()],
        tokens(debt).into(),
    );
}

async fn run(engine: &RebalancingEngine, strategy: &Strategy, settings: &LbfSettings) -> (serde_json::Value, TxLog) {
    let mut log = TxLog::new();
    let payload = engine
        .strategy_run(strategy, settings, &[fixtures::farm(strategy.id)], &mut log)
        .await
        .unwrap();
    (payload, log)
}

#[tokio::test]
async fn test_inside_band_holds() {
    let chain = Arc::new(FakeChain::new());
    script_position(&chain, 90, 100);
    let strategy = fixtures::lbf_strategy(1);

    let (payload, log) = run(&engine(&chain, false), &strategy, &fixtures::lbf_settings()).await;

    assert_eq!(payload["decision"], "HOLD");
    assert!(chain.sent().is_empty());
    assert!(log.receipts.is_empty());
}

#[tokio::test]
async fn test_below_band_adds_liquidity() {
    let chain = Arc::new(FakeChain::new());
    script_position(&chain, 50, 100);
    script_market(&chain);
    chain.script(
        address(fixtures::PAIR),
        methods::BALANCE_OF,
        vec![logic().into()],
        tokens(42).into(),
    );
    let strategy = fixtures::lbf_strategy(1);

    let (payload, log) = run(&engine(&chain, false), &strategy, &fixtures::lbf_settings()).await;

    // target 92 of a 100 limit with 50 borrowed
    assert_eq!(payload["decision"], format!("ADD {}", tokens(42)));
    assert_eq!(
        chain.sent_methods(),
        vec![
            methods::BORROW,
            methods::BORROW,
            methods::APPROVE_TOKEN_FOR_SWAP,
            methods::APPROVE_TOKEN_FOR_SWAP,
            methods::ADD_LIQUIDITY,
            methods::APPROVE_TOKEN_FOR_SWAP,
            methods::DEPOSIT,
        ]
    );
    assert_eq!(log.receipts.len(), 7);

    let farm = &payload["details"]["farms"][0];
    assert_eq!(farm["token1Amount"], tokens(21).to_string());
    assert_eq!(farm["token2Borrow"], tokens(21).to_string());
    assert_eq!(farm["lpStaked"], tokens(42).to_string());
}

#[tokio::test]
async fn test_held_balance_is_not_borrowed() {
    let chain = Arc::new(FakeChain::new());
    script_position(&chain, 50, 100);
    script_market(&chain);
    for token in [fixtures::TOKEN1, fixtures::TOKEN2] {
        chain.script(
            address(token),
            methods::BALANCE_OF,
            vec![logic().into()],
            tokens(100).into(),
        );
    }
    let strategy = fixtures::lbf_strategy(1);

    run(&engine(&chain, false), &strategy, &fixtures::lbf_settings()).await;

    assert_eq!(chain.count_sent(methods::BORROW), 0);
    assert_eq!(chain.count_sent(methods::ADD_LIQUIDITY), 1);
}

#[tokio::test]
async fn test_batching_groups_borrows_and_approvals() {
    let chain = Arc::new(FakeChain::new());
    script_position(&chain, 50, 100);
    script_market(&chain);
    let strategy = fixtures::lbf_strategy(1);

    run(&engine(&chain, true), &strategy, &fixtures::lbf_settings()).await;

    assert_eq!(
        chain.sent_methods(),
        vec![methods::MULTICALL, methods::MULTICALL, methods::ADD_LIQUIDITY]
    );
}

#[tokio::test]
async fn test_above_band_removes_and_repays() {
    let chain = Arc::new(FakeChain::new());
    script_position(&chain, 100, 100);
    script_market(&chain);
    chain.script(
        address(fixtures::MASTER_CHEF),
        methods::USER_INFO,
        vec![ChainValue::from(1u64), logic().into()],
        ChainValue::Array(vec![tokens(1000).into(), U256::ZERO.into()]),
    );
    chain.script(
        address(fixtures::PAIR),
        methods::BALANCE_OF,
        vec![logic().into()],
        tokens(80).into(),
    );
    chain.script_sequence(
        address(fixtures::TOKEN1),
        methods::BALANCE_OF,
        vec![logic().into()],
        vec![U256::ZERO.into(), tokens(40).into()],
    );
    chain.script(
        address(fixtures::V_TOKEN1),
        methods::BORROW_BALANCE_CURRENT,
        vec![logic().into()],
        tokens(30).into(),
    );
    let strategy = fixtures::lbf_strategy(1);

    let (payload, _) = run(&engine(&chain, false), &strategy, &fixtures::lbf_settings()).await;

    // (100 - 92) / 100 of every position
    let share = WAD * U256::from(8u64) / U256::from(100u64);
    assert_eq!(payload["decision"], format!("REMOVE {}", share));
    assert_eq!(
        chain.sent_methods(),
        vec![
            methods::WITHDRAW,
            methods::APPROVE_TOKEN_FOR_SWAP,
            methods::REMOVE_LIQUIDITY,
            methods::REPAY_BORROW,
        ]
    );

    let sent = chain.sent();
    assert_eq!(sent[0].args[2], ChainValue::Uint(tokens(80)));
    let repay = &sent[3];
    assert_eq!(
        repay.args,
        vec![
            ChainValue::from(address(fixtures::V_TOKEN1)),
            ChainValue::from(tokens(30)),
        ]
    );
    assert_eq!(
        payload["details"]["repaid"][address(fixtures::TOKEN1).to_string()],
        tokens(30).to_string()
    );
}

#[tokio::test]
async fn test_preserve_tier_shrinks_limit() {
    let chain = Arc::new(FakeChain::new());
    // Inside the band without preservation
    script_position(&chain, 90, 100);
    script_market(&chain);
    chain.script(
        address(fixtures::STORAGE),
        methods::GET_TOTAL_DEPOSIT,
        vec![],
        tokens(2000).into(),
    );
    chain.script(
        address(fixtures::MASTER_CHEF),
        methods::USER_INFO,
        vec![ChainValue::from(1u64), logic().into()],
        ChainValue::Array(vec![U256::ZERO.into(), U256::ZERO.into()]),
    );

    let mut settings = fixtures::lbf_settings();
    settings.preserve_tiers = vec![
        PreserveTier {
            min_storage_usd: Decimal::ZERO,
            preserve_percent: Decimal::ZERO,
        },
        PreserveTier {
            min_storage_usd: dec("1000"),
            preserve_percent: dec("0.5"),
        },
    ];
    let strategy = fixtures::strategy_with(1, StrategySettings::Lbf(settings.clone()));

    let (payload, _) = run(&engine(&chain, false), &strategy, &settings).await;

    assert_eq!(payload["preservePercentage"], (WAD / U256::from(2u64)).to_string());
    assert!(payload["decision"]
        .as_str()
        .is_some_and(|decision| decision.starts_with("REMOVE")));
}

#[tokio::test]
async fn test_partial_teardown_keeps_reserves() {
    let chain = Arc::new(FakeChain::new());
    script_market(&chain);
    script_lp(&chain, 100, vec![50]);
    script_debt(&chain, fixtures::V_TOKEN1, 30);
    let strategy = fixtures::lbf_strategy(1);
    let farms = [fixtures::farm(strategy.id)];
    let mut log = TxLog::new();

    let outcome = engine(&chain, false)
        .teardown(&strategy, &farms, WAD / U256::from(2u64), true, &mut log)
        .await
        .unwrap();

    assert_eq!(
        chain.sent_methods(),
        vec![
            methods::WITHDRAW,
            methods::APPROVE_TOKEN_FOR_SWAP,
            methods::REMOVE_LIQUIDITY,
        ]
    );
    assert_eq!(chain.sent()[0].args[2], ChainValue::Uint(tokens(50)));
    assert_eq!(chain.count_sent(methods::SWAP_EXACT_TOKENS_FOR_TOKENS), 0);
    assert_eq!(chain.count_sent(methods::DELETE_LP_RESERVES), 0);
    assert!(outcome.payload.get("reservesDeleted").is_none());
}

#[tokio::test]
async fn test_full_teardown_repays_swaps_and_deletes_reserves() {
    let chain = Arc::new(FakeChain::new());
    script_market(&chain);
    script_lp(&chain, 100, vec![100]);
    script_debt(&chain, fixtures::V_TOKEN1, 40);
    chain.script_sequence(
        address(fixtures::TOKEN1),
        methods::BALANCE_OF,
        vec![logic().into()],
        vec![U256::ZERO.into(), tokens(60).into()],
    );
    let strategy = fixtures::lbf_strategy(1);
    let farms = [fixtures::farm(strategy.id)];
    let (engine, notifier) = engine_with_notifier(&chain, false);
    let mut log = TxLog::new();

    let outcome = engine
        .teardown(&strategy, &farms, WAD, true, &mut log)
        .await
        .unwrap();

    assert_eq!(
        chain.sent_methods(),
        vec![
            methods::WITHDRAW,
            methods::APPROVE_TOKEN_FOR_SWAP,
            methods::REMOVE_LIQUIDITY,
            methods::REPAY_BORROW,
            methods::APPROVE_TOKEN_FOR_SWAP,
            methods::SWAP_EXACT_TOKENS_FOR_TOKENS,
            methods::DELETE_LP_RESERVES,
        ]
    );
    let sent = chain.sent();
    assert_eq!(
        sent[3].args,
        vec![
            ChainValue::from(address(fixtures::V_TOKEN1)),
            ChainValue::from(tokens(40)),
        ]
    );
    // surplus of 20 goes to the base asset
    assert_eq!(sent[5].args[1], ChainValue::from(tokens(20)));
    assert_eq!(
        sent[5].args[3],
        ChainValue::Array(vec![
            address(fixtures::TOKEN1).into(),
            address(fixtures::BASE_TOKEN).into(),
        ])
    );
    assert_eq!(outcome.payload["reservesDeleted"], true);
    assert_eq!(log.receipts.len(), 7);
    assert_eq!(notifier.count("debt_warning"), 0);
}

#[tokio::test]
async fn test_withdraw_all_warns_once_when_base_exhausted() {
    let chain = Arc::new(FakeChain::new());
    script_debt(&chain, fixtures::V_TOKEN1, 10);
    let strategy = fixtures::lbf_strategy(1);
    let farms = [fixtures::farm(strategy.id)];
    let (engine, notifier) = engine_with_notifier(&chain, false);
    let mut log = TxLog::new();

    let payload = engine.withdraw_all(&strategy, &farms, &mut log).await.unwrap();

    assert_eq!(notifier.count("debt_warning"), 1);
    // nothing to swap with, so no base approval either
    assert_eq!(chain.sent_methods(), vec![methods::DELETE_LP_RESERVES]);
    assert_eq!(
        payload["teardown"]["repayAll"]["shortfalls"][address(fixtures::TOKEN1).to_string()],
        tokens(10).to_string()
    );
    assert_eq!(payload["returned"], serde_json::json!({}));
}

#[tokio::test]
async fn test_withdraw_all_returns_balances_to_storage() {
    let chain = Arc::new(FakeChain::new());
    chain.script(
        address(fixtures::REWARD_TOKEN),
        methods::BALANCE_OF,
        vec![logic().into()],
        tokens(5).into(),
    );
    let strategy = fixtures::lbf_strategy(1);
    let farms = [fixtures::farm(strategy.id)];
    let mut log = TxLog::new();

    engine(&chain, false)
        .withdraw_all(&strategy, &farms, &mut log)
        .await
        .unwrap();

    assert_eq!(
        chain.sent_methods(),
        vec![methods::DELETE_LP_RESERVES, methods::RETURN_TOKEN]
    );
    assert_eq!(
        chain.sent()[1].args,
        vec![
            ChainValue::from(address(fixtures::REWARD_TOKEN)),
            ChainValue::from(tokens(5)),
        ]
    );
}

#[tokio::test]
async fn test_recreate_reserves_readds_without_borrowing() {
    let chain = Arc::new(FakeChain::new());
    script_market(&chain);
    script_lp(&chain, 100, vec![100, 40]);
    script_debt(&chain, fixtures::V_TOKEN1, 30);
    for token in [fixtures::TOKEN1, fixtures::TOKEN2] {
        chain.script_sequence(
            address(token),
            methods::BALANCE_OF,
            vec![logic().into()],
            vec![U256::ZERO.into(), tokens(50).into()],
        );
    }
    let strategy = fixtures::lbf_strategy(1);
    let farms = [fixtures::farm(strategy.id)];
    let mut log = TxLog::new();

    let payload = engine(&chain, false)
        .recreate_reserves(&strategy, &farms, &mut log)
        .await
        .unwrap();

    let methods_sent = chain.sent_methods();
    assert_eq!(chain.count_sent(methods::BORROW), 0);
    assert_eq!(chain.count_sent(methods::REPAY_BORROW), 0);
    assert_eq!(chain.count_sent(methods::DELETE_LP_RESERVES), 1);
    assert_eq!(chain.count_sent(methods::ADD_LP_RESERVE), 1);
    assert_eq!(chain.count_sent(methods::ADD_LIQUIDITY), 1);
    let position = |method: &str| methods_sent.iter().position(|sent| sent == method);
    assert!(position(methods::REMOVE_LIQUIDITY) < position(methods::DELETE_LP_RESERVES));
    assert!(position(methods::DELETE_LP_RESERVES) < position(methods::ADD_LP_RESERVE));
    assert!(position(methods::ADD_LP_RESERVE) < position(methods::ADD_LIQUIDITY));
    assert_eq!(payload["reservesAdded"], 1);
    assert_eq!(payload["readded"]["farms"][0]["token1Borrow"], "0");
    assert_eq!(payload["readded"]["farms"][0]["lpStaked"], tokens(40).to_string());
}
