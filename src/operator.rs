//! Operator surface
//!
//! Strategy lifecycle, manual triggers and read models. Every call takes the
//! acting identity explicitly; it is recorded in the meta of records it touches.

use crate::engine::{JobScheduler, OperationHandler, TriggerOutcome};
use crate::error::{AppError, AppResult};
use crate::models::{Actor, Operation, OperationStatus, OperationType, StrategySettings};
use crate::store::{AnalyticsSnapshot, AnalyticsStore, OperationStore, SqliteStore, StrategyConfigSource};
use alloy_primitives::U256;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub struct OperatorService {
    store: SqliteStore,
    scheduler: JobScheduler,
    handler: Arc<dyn OperationHandler>,
}

impl OperatorService {
    pub fn new(store: SqliteStore, scheduler: JobScheduler, handler: Arc<dyn OperationHandler>) -> Self {
        Self {
            store,
            scheduler,
            handler,
        }
    }

    /// Validate settings, activate and kick off the strategy's chains
    pub async fn start_strategy(&self, actor: &Actor, strategy_id: i64) -> AppResult<()> {
        let strategy = self.store.strategy(strategy_id).await?;
        let farms = self.store.farms(strategy_id).await?;
        strategy.settings.validate(&farms)?;

        self.store.set_active(strategy_id, true).await?;
        self.scheduler.start_chains(strategy_id).await?;

        info!(strategy_id, actor = %actor, "Strategy started");
        Ok(())
    }

    /// Deactivate; pending work is cancelled, running work completes.
    /// Returns the number of cancelled operations.
    pub async fn stop_strategy(&self, actor: &Actor, strategy_id: i64) -> AppResult<usize> {
        self.store.set_active(strategy_id, false).await?;
        let cancelled = self
            .scheduler
            .cancel_strategy_jobs(strategy_id, actor)
            .await?;

        info!(strategy_id, cancelled, actor = %actor, "Strategy stopped");
        Ok(cancelled)
    }

    pub async fn trigger(
        &self,
        actor: &Actor,
        strategy_id: i64,
        op_type: OperationType,
    ) -> AppResult<TriggerOutcome> {
        self.scheduler
            .run_operation_by_rest_api_call(actor, strategy_id, op_type)
            .await
    }

    /// Replace settings. The strategy becomes inactive and its pending work is
    /// cancelled until it is started again.
    pub async fn update_settings(
        &self,
        actor: &Actor,
        strategy_id: i64,
        settings: StrategySettings,
    ) -> AppResult<()> {
        let current = self.store.strategy(strategy_id).await?;
        if current.kind() != settings.kind() {
            return Err(AppError::SettingsInvalid(format!(
                "strategy {} is {}, settings are {}",
                strategy_id,
                current.kind(),
                settings.kind()
            )));
        }
        let farms = self.store.farms(strategy_id).await?;
        settings.validate(&farms)?;

        self.store.update_settings(strategy_id, &settings).await?;
        self.scheduler
            .cancel_strategy_jobs(strategy_id, actor)
            .await?;

        info!(strategy_id, actor = %actor, "Strategy settings updated");
        Ok(())
    }

    pub async fn set_operation_status(
        &self,
        actor: &Actor,
        operation_id: i64,
        status: OperationStatus,
    ) -> AppResult<Operation> {
        self.scheduler
            .state_machine()
            .set_status(operation_id, status, actor)
            .await
    }

    /// Most recent operations first
    pub async fn operation_history(&self, strategy_id: i64, limit: i64) -> AppResult<Vec<Operation>> {
        self.store.list(strategy_id, limit).await
    }

    /// Sum of gas used × effective gas price over the operation's transactions
    pub async fn operation_gas_cost(&self, operation_id: i64) -> AppResult<U256> {
        if self.store.get(operation_id).await?.is_none() {
            return Err(AppError::NotFound(format!("operation {}", operation_id)));
        }
        self.store.gas_cost(operation_id).await
    }

    pub async fn latest_analytics(&self, strategy_id: i64) -> AppResult<Option<AnalyticsSnapshot>> {
        self.store.latest_snapshot(strategy_id).await
    }

    pub async fn wallet_balances(&self, strategy_id: i64) -> AppResult<Value> {
        let strategy = self.store.strategy(strategy_id).await?;
        self.handler.wallet_balances(&strategy).await
    }
}
