//! Shared setup for integration tests

#![allow(dead_code)]

use lbf_operator::config::{DatabaseConfig, SchedulerConfig};
use lbf_operator::db::{init_pool, run_migrations};
use lbf_operator::engine::{JobScheduler, OperationStateMachine};
use lbf_operator::models::{Farm, OperationStatus, Strategy};
use lbf_operator::store::{OperationStore, SqliteStore};
use lbf_operator::testing::{RecordingHandler, RecordingNotifier};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Create a migrated store in a temporary directory
pub async fn create_test_store() -> (SqliteStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        path: temp_dir.path().join("test.db"),
        max_connections: 5,
    };

    let pool = init_pool(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();

    (SqliteStore::new(pool), temp_dir)
}

/// Persist `strategy` (and `farms`), returning it with the assigned ids
pub async fn register(store: &SqliteStore, mut strategy: Strategy, farms: Vec<Farm>) -> Strategy {
    strategy.id = store.insert_strategy(&strategy).await.unwrap();
    for mut farm in farms {
        farm.strategy_id = strategy.id;
        store.insert_farm(&farm).await.unwrap();
    }
    strategy
}

pub fn state_machine(store: &SqliteStore, pid: u32) -> Arc<OperationStateMachine> {
    Arc::new(OperationStateMachine::new(Arc::new(store.clone()), pid))
}

pub struct Harness {
    pub store: SqliteStore,
    pub scheduler: JobScheduler,
    pub handler: Arc<RecordingHandler>,
    pub notifier: Arc<RecordingNotifier>,
    _dir: TempDir,
}

pub async fn harness() -> Harness {
    harness_with(SchedulerConfig::default()).await
}

pub async fn harness_with(config: SchedulerConfig) -> Harness {
    let (store, dir) = create_test_store().await;
    let handler = Arc::new(RecordingHandler::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let scheduler = JobScheduler::new(
        state_machine(&store, std::process::id()),
        Arc::new(store.clone()),
        handler.clone(),
        notifier.clone(),
        &config,
        None,
    );

    Harness {
        store,
        scheduler,
        handler,
        notifier,
        _dir: dir,
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Poll the record until it reaches `status` or two seconds pass
pub async fn wait_for_status(store: &SqliteStore, id: i64, status: OperationStatus) -> bool {
    for _ in 0..200 {
        if let Ok(Some(op)) = store.get(id).await {
            if op.status == status {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
