//! Operator Surface Integration Tests
//!
//! Tests the operator-facing service:
//! - Start validates settings, activates and starts chains
//! - Stop and settings updates cancel pending work
//! - History, gas cost, analytics and balances read models

use crate::common::{eventually, harness, register, wait_for_status, Harness};
use alloy_primitives::U256;
use lbf_operator::engine::TriggerOutcome;
use lbf_operator::error::AppError;
use lbf_operator::models::{Actor, OperationStatus, OperationType, RunType, StrategySettings};
use lbf_operator::operator::OperatorService;
use lbf_operator::store::StrategyConfigSource;
use lbf_operator::testing::fixtures::{self, dec};
use std::time::Duration;

fn service(h: &Harness) -> OperatorService {
    OperatorService::new(h.store.clone(), h.scheduler.clone(), h.handler.clone())
}

#[tokio::test]
async fn test_start_strategy_activates_and_runs_chains() {
    let h = harness().await;
    let mut settings = fixtures::lbf_settings();
    settings.common.is_strategy_autostart = true;
    let strategy = register(
        &h.store,
        fixtures::strategy_with(0, StrategySettings::Lbf(settings)),
        vec![fixtures::farm(0)],
    )
    .await;
    h.store.set_active(strategy.id, false).await.unwrap();

    service(&h)
        .start_strategy(&Actor::new("admin"), strategy.id)
        .await
        .unwrap();

    assert!(h.store.strategy(strategy.id).await.unwrap().is_active);
    let handler = &h.handler;
    assert!(eventually(|| async move { handler.run_count(OperationType::StrategyRun) >= 1 }).await);
}

#[tokio::test]
async fn test_start_rejects_invalid_settings() {
    let h = harness().await;
    let mut settings = fixtures::lbf_settings();
    settings.borrow_limit_percentage_max = dec("1.2");
    let strategy = register(
        &h.store,
        fixtures::strategy_with(0, StrategySettings::Lbf(settings)),
        vec![],
    )
    .await;
    h.store.set_active(strategy.id, false).await.unwrap();

    let err = service(&h)
        .start_strategy(&Actor::new("admin"), strategy.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SettingsInvalid(_)));
    assert!(!h.store.strategy(strategy.id).await.unwrap().is_active);
    assert_eq!(h.scheduler.job_count(), 0);
}

#[tokio::test]
async fn test_stop_strategy_cancels_pending() {
    let h = harness().await;
    let strategy = register(&h.store, fixtures::lbf_strategy(0), vec![]).await;
    let pending = h
        .scheduler
        .schedule_operation(
            &strategy,
            OperationType::VenusClaimRun,
            RunType::Job,
            Actor::system(),
            Duration::from_secs(60),
        )
        .await
        .unwrap()
        .unwrap();

    let cancelled = service(&h)
        .stop_strategy(&Actor::new("admin"), strategy.id)
        .await
        .unwrap();

    assert_eq!(cancelled, 1);
    assert!(!h.store.strategy(strategy.id).await.unwrap().is_active);
    assert!(wait_for_status(&h.store, pending, OperationStatus::Failed).await);
}

#[tokio::test]
async fn test_update_settings_rejects_kind_change() {
    let h = harness().await;
    let strategy = register(&h.store, fixtures::lbf_strategy(0), vec![]).await;

    let err = service(&h)
        .update_settings(
            &Actor::new("admin"),
            strategy.id,
            StrategySettings::Lbl(fixtures::lbl_settings()),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SettingsInvalid(_)));
    assert!(h.store.strategy(strategy.id).await.unwrap().is_active);
}

#[tokio::test]
async fn test_update_settings_deactivates_strategy() {
    let h = harness().await;
    let strategy = register(&h.store, fixtures::lbf_strategy(0), vec![]).await;
    let pending = h
        .scheduler
        .schedule_operation(
            &strategy,
            OperationType::ClaimRun,
            RunType::Job,
            Actor::system(),
            Duration::from_secs(60),
        )
        .await
        .unwrap()
        .unwrap();

    let mut settings = fixtures::lbf_settings();
    settings.common.max_rewards_per_run = dec("25");
    service(&h)
        .update_settings(&Actor::new("admin"), strategy.id, StrategySettings::Lbf(settings))
        .await
        .unwrap();

    let stored = h.store.strategy(strategy.id).await.unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.settings.common().max_rewards_per_run, dec("25"));
    assert!(wait_for_status(&h.store, pending, OperationStatus::Failed).await);
}

#[tokio::test]
async fn test_history_and_gas_cost() {
    let h = harness().await;
    let strategy = register(&h.store, fixtures::lbf_strategy(0), vec![]).await;
    h.handler.set_receipts_per_run(3);
    let operator = service(&h);
    let actor = Actor::new("alice");

    let mut ids = Vec::new();
    for op_type in [OperationType::ClaimRun, OperationType::VenusClaimRun] {
        let TriggerOutcome::Created { operation_id } =
            operator.trigger(&actor, strategy.id, op_type).await.unwrap()
        else {
            panic!("expected a new operation");
        };
        assert!(wait_for_status(&h.store, operation_id, OperationStatus::Success).await);
        ids.push(operation_id);
    }

    let history = operator.operation_history(strategy.id, 10).await.unwrap();
    let history_ids: Vec<i64> = history.iter().map(|op| op.id).collect();
    assert_eq!(history_ids, vec![ids[1], ids[0]]);

    assert_eq!(
        operator.operation_gas_cost(ids[0]).await.unwrap(),
        U256::from(3u64 * 50_000 * 2)
    );
    assert!(matches!(
        operator.operation_gas_cost(9_999).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_manual_status_change() {
    let h = harness().await;
    let strategy = register(&h.store, fixtures::lbf_strategy(0), vec![]).await;
    let pending = h
        .scheduler
        .schedule_operation(
            &strategy,
            OperationType::ClaimRun,
            RunType::Job,
            Actor::system(),
            Duration::from_secs(60),
        )
        .await
        .unwrap()
        .unwrap();

    let updated = service(&h)
        .set_operation_status(&Actor::new("admin"), pending, OperationStatus::Failed)
        .await
        .unwrap();
    assert_eq!(updated.status, OperationStatus::Failed);
    assert_eq!(updated.meta["statusSetBy"], "admin");
}

#[tokio::test]
async fn test_read_models() {
    let h = harness().await;
    let strategy = register(&h.store, fixtures::lbf_strategy(0), vec![]).await;
    let operator = service(&h);

    assert!(operator.latest_analytics(strategy.id).await.unwrap().is_none());

    let balances = operator.wallet_balances(strategy.id).await.unwrap();
    assert_eq!(
        balances["wallet"],
        fixtures::address(fixtures::OPERATIONAL_WALLET).to_string()
    );
}
