//! Claim Distributor Tests
//!
//! Drives CLAIM_RUN against the scripted chain:
//! - Distribution is capped by the per-run maximum and the available balance
//! - Amounts of at most one token are not distributed
//! - Negative results are reported and distribute only when allowed
//! - Boosting tops up after a distribution

use alloy_primitives::{Address, U256};
use lbf_operator::chain::{methods, ChainValue};
use lbf_operator::constants::WAD;
use lbf_operator::models::{CommonSettings, Strategy, StrategySettings};
use lbf_operator::strategy::{ClaimDistributor, MulticallSubmitter, TxLog};
use lbf_operator::testing::fixtures::{self, address, dec};
use lbf_operator::testing::{FakeChain, RecordingNotifier};
use std::sync::Arc;

fn tokens(n: u64) -> U256 {
    U256::from(n) * WAD
}

fn logic() -> Address {
    address(fixtures::LOGIC)
}

struct Setup {
    chain: Arc<FakeChain>,
    notifier: Arc<RecordingNotifier>,
    distributor: ClaimDistributor,
}

fn setup() -> Setup {
    let chain = Arc::new(FakeChain::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let submitter = Arc::new(MulticallSubmitter::new(chain.clone(), false));
    let distributor = ClaimDistributor::new(chain.clone(), submitter, notifier.clone());
    Setup {
        chain,
        notifier,
        distributor,
    }
}

fn lbl_strategy(configure: impl FnOnce(&mut CommonSettings)) -> Strategy {
    let mut settings = fixtures::lbl_settings();
    configure(&mut settings.common);
    fixtures::strategy_with(1, StrategySettings::Lbl(settings))
}

/// Reward token worth one dollar, `reward` of it held by the logic contract,
/// and a lending position worth `supplied` against `storage` of deposits
fn script_accounts(chain: &FakeChain, reward: U256, supplied: u64, storage: u64) {
    let reward_token = address(fixtures::REWARD_TOKEN);
    chain.script(reward_token, methods::BALANCE_OF, vec![logic().into()], reward.into());
    chain.script(
        address(fixtures::ORACLE),
        methods::GET_TOKEN_PRICE,
        vec![reward_token.into()],
        WAD.into(),
    );
    chain.script(
        logic(),
        methods::GET_LENDING_POSITION,
        vec![],
        ChainValue::Array(vec![
            tokens(supplied).into(),
            U256::ZERO.into(),
            tokens(supplied).into(),
        ]),
    );
    chain.script(
        address(fixtures::STORAGE),
        methods::GET_TOTAL_DEPOSIT,
        vec![],
        tokens(storage).into(),
    );
}

async fn claim(setup: &Setup, strategy: &Strategy, last_block: Option<u64>) -> serde_json::Value {
    let mut log = TxLog::new();
    setup
        .distributor
        .run_claim(strategy, &[], last_block, &mut log)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_distribution_capped_by_max_per_run() {
    let setup = setup();
    script_accounts(&setup.chain, tokens(5), 100, 0);
    let strategy = lbl_strategy(|common| common.max_rewards_per_run = dec("2"));

    let payload = claim(&setup, &strategy, None).await;

    assert_eq!(payload["distributedAmount"], tokens(2).to_string());
    assert_eq!(
        setup.chain.sent_methods(),
        vec![methods::CLAIM_LENDING_REWARDS, methods::DISTRIBUTE_REWARDS]
    );
    let distribute = &setup.chain.sent()[1];
    assert_eq!(distribute.to, logic());
    assert_eq!(distribute.args, vec![ChainValue::Uint(tokens(2))]);
    assert_eq!(setup.notifier.count("rewards_distributed"), 1);
}

#[tokio::test]
async fn test_distribution_bounded_by_available() {
    let setup = setup();
    script_accounts(&setup.chain, tokens(3), 100, 0);
    let strategy = lbl_strategy(|common| common.max_rewards_per_run = dec("50"));

    let payload = claim(&setup, &strategy, None).await;

    assert_eq!(payload["distributedAmount"], tokens(3).to_string());
}

#[tokio::test]
async fn test_one_token_is_dust() {
    let setup = setup();
    script_accounts(&setup.chain, tokens(5), 100, 0);
    let strategy = lbl_strategy(|common| common.max_rewards_per_run = dec("1"));

    let payload = claim(&setup, &strategy, None).await;

    assert_eq!(payload["distributedAmount"], "0");
    assert_eq!(setup.chain.count_sent(methods::DISTRIBUTE_REWARDS), 0);
    assert_eq!(setup.notifier.count("rewards_not_distributed"), 1);
}

#[tokio::test]
async fn test_fractional_balance_is_dust() {
    let setup = setup();
    script_accounts(&setup.chain, WAD / U256::from(2u64), 100, 0);
    let strategy = lbl_strategy(|common| common.max_rewards_per_run = dec("10"));

    claim(&setup, &strategy, None).await;

    assert_eq!(setup.chain.count_sent(methods::DISTRIBUTE_REWARDS), 0);
}

#[tokio::test]
async fn test_negative_result_reported_and_skipped() {
    let setup = setup();
    script_accounts(&setup.chain, tokens(5), 0, 50);
    let strategy = lbl_strategy(|common| common.max_rewards_per_run = dec("2"));

    let payload = claim(&setup, &strategy, None).await;

    assert!(payload["netResultUsd"]
        .as_str()
        .is_some_and(|net| net.starts_with('-')));
    assert_eq!(setup.chain.count_sent(methods::DISTRIBUTE_REWARDS), 0);
    assert_eq!(setup.notifier.count("negative_result"), 1);
}

#[tokio::test]
async fn test_negative_result_distributes_when_allowed() {
    let setup = setup();
    script_accounts(&setup.chain, tokens(5), 0, 50);
    let strategy = lbl_strategy(|common| {
        common.max_rewards_per_run = dec("2");
        common.distribute_even_if_negative = true;
    });

    let payload = claim(&setup, &strategy, None).await;

    assert_eq!(payload["distributedAmount"], tokens(2).to_string());
    assert_eq!(setup.notifier.count("negative_result"), 1);
}

#[tokio::test]
async fn test_notifications_disabled() {
    let setup = setup();
    script_accounts(&setup.chain, tokens(5), 0, 50);
    let strategy = lbl_strategy(|common| common.notifications_enabled = false);

    claim(&setup, &strategy, None).await;

    assert!(setup.notifier.events().is_empty());
}

fn boosting_strategy() -> Strategy {
    lbl_strategy(|common| {
        common.max_rewards_per_run = dec("2");
        common.boosting_enabled = true;
        common.boosting_tokens_per_block = dec("1");
    })
}

#[tokio::test]
async fn test_boosting_tops_up_after_distribution() {
    let setup = setup();
    script_accounts(&setup.chain, tokens(5), 100, 0);
    setup.chain.set_block(130);
    setup.chain.script(
        address(fixtures::REWARD_TOKEN),
        methods::BALANCE_OF,
        vec![address(fixtures::BOOSTING_WALLET).into()],
        tokens(50).into(),
    );

    let payload = claim(&setup, &boosting_strategy(), Some(100)).await;

    assert_eq!(payload["boosting"]["sent"], true);
    assert_eq!(payload["lastProcessedBlock"], 130);
    let transfer = setup
        .chain
        .sent()
        .into_iter()
        .find(|intent| intent.method == methods::TRANSFER)
        .unwrap();
    assert_eq!(transfer.to, address(fixtures::REWARD_TOKEN));
    assert_eq!(transfer.signer.address, address(fixtures::BOOSTING_WALLET));
    assert_eq!(
        transfer.args,
        vec![
            ChainValue::from(address(fixtures::STORAGE)),
            ChainValue::from(tokens(30)),
        ]
    );
}

#[tokio::test]
async fn test_boosting_underfunded_sends_nothing() {
    let setup = setup();
    script_accounts(&setup.chain, tokens(5), 100, 0);
    setup.chain.set_block(130);
    setup.chain.script(
        address(fixtures::REWARD_TOKEN),
        methods::BALANCE_OF,
        vec![address(fixtures::BOOSTING_WALLET).into()],
        tokens(10).into(),
    );

    let payload = claim(&setup, &boosting_strategy(), Some(100)).await;

    assert_eq!(payload["boosting"]["sent"], false);
    assert_eq!(setup.chain.count_sent(methods::TRANSFER), 0);
    assert_eq!(setup.notifier.count("boosting_underfunded"), 1);
}

#[tokio::test]
async fn test_no_boosting_without_distribution() {
    let setup = setup();
    script_accounts(&setup.chain, WAD, 100, 0);
    setup.chain.set_block(130);

    let payload = claim(&setup, &boosting_strategy(), Some(100)).await;

    assert!(payload["boosting"].is_null());
    assert_eq!(setup.chain.count_sent(methods::TRANSFER), 0);
}

#[tokio::test]
async fn test_farm_rewards_harvested_and_swapped() {
    let setup = setup();
    script_accounts(&setup.chain, U256::ZERO, 100, 0);
    let farm = fixtures::farm(1);
    setup.chain.script_sequence(
        farm.reward_token,
        methods::BALANCE_OF,
        vec![logic().into()],
        vec![U256::ZERO.into(), tokens(10).into()],
    );
    setup.chain.script(
        farm.master_chef,
        methods::USER_INFO,
        vec![ChainValue::from(farm.pid), logic().into()],
        ChainValue::Array(vec![U256::ZERO.into(), U256::ZERO.into()]),
    );
    let strategy = fixtures::lbf_strategy(1);

    let mut log = TxLog::new();
    setup
        .distributor
        .run_claim(&strategy, &[farm], None, &mut log)
        .await
        .unwrap();

    assert_eq!(
        setup.chain.sent_methods(),
        vec![
            methods::CLAIM_LENDING_REWARDS,
            methods::DEPOSIT,
            methods::APPROVE_TOKEN_FOR_SWAP,
            methods::SWAP_EXACT_TOKENS_FOR_TOKENS,
        ]
    );
    assert_eq!(log.receipts.len(), 4);
}

#[tokio::test]
async fn test_compound_lending_rewards() {
    let setup = setup();
    let reward = address(fixtures::LENDING_REWARD_TOKEN);
    let base = address(fixtures::BASE_TOKEN);
    setup.chain.script_sequence(
        reward,
        methods::BALANCE_OF,
        vec![logic().into()],
        vec![U256::ZERO.into(), tokens(4).into()],
    );
    setup.chain.script_sequence(
        base,
        methods::BALANCE_OF,
        vec![logic().into()],
        vec![tokens(1).into(), tokens(9).into()],
    );
    let strategy = fixtures::lbf_strategy(1);

    let mut log = TxLog::new();
    let payload = setup
        .distributor
        .compound_lending_rewards(&strategy, &mut log)
        .await
        .unwrap();

    assert_eq!(payload["claimed"], tokens(4).to_string());
    assert_eq!(payload["supplied"], tokens(8).to_string());
    let mint = setup
        .chain
        .sent()
        .into_iter()
        .find(|intent| intent.method == methods::MINT)
        .unwrap();
    assert_eq!(
        mint.args,
        vec![
            ChainValue::from(address(fixtures::BASE_V_TOKEN)),
            ChainValue::from(tokens(8)),
        ]
    );
    assert_eq!(setup.chain.count_sent(methods::DISTRIBUTE_REWARDS), 0);
}
