//! Operation lifecycle state machine
//!
//! Creates and transitions operation records. Every transition deep-merges
//! its meta patch into the stored meta:
//!
//! ```text
//! { "triggeredBy": "...", "before": {...}, "after": {...}, "payload": {...}, "error": "..." }
//! ```

use crate::error::{AppError, AppResult};
use crate::models::{Actor, NewOperation, Operation, OperationStatus, OperationType, RunType};
use crate::store::OperationStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub struct OperationStateMachine {
    store: Arc<dyn OperationStore>,
    pid: u32,
}

impl OperationStateMachine {
    pub fn new(store: Arc<dyn OperationStore>, pid: u32) -> Self {
        Self { store, pid }
    }

    /// Process id stamped on every record this instance creates
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn store(&self) -> &Arc<dyn OperationStore> {
        &self.store
    }

    /// Create a record in PENDING or IN_PROGRESS.
    ///
    /// Fails with `OperationInProgressExists` when creating IN_PROGRESS while
    /// the strategy already runs something, and with `OperationPendingExists`
    /// when a PENDING record of the same type exists.
    pub async fn create(
        &self,
        op_type: OperationType,
        run_type: RunType,
        strategy_id: i64,
        blockchain_id: i64,
        status: OperationStatus,
        actor: &Actor,
    ) -> AppResult<Operation> {
        if !matches!(status, OperationStatus::Pending | OperationStatus::InProgress) {
            return Err(AppError::Validation(format!(
                "operations cannot be created in {}",
                status
            )));
        }

        if status == OperationStatus::InProgress {
            if let Some(existing) = self.store.find_in_progress(strategy_id).await? {
                return Err(AppError::OperationInProgressExists {
                    strategy_id,
                    operation_id: existing.id,
                });
            }
        }

        if self.store.find_pending(strategy_id, op_type).await?.is_some() {
            return Err(AppError::OperationPendingExists {
                strategy_id,
                op_type,
            });
        }

        let operation = self
            .store
            .insert(NewOperation {
                strategy_id,
                blockchain_id,
                op_type,
                run_type,
                status,
                meta: json!({ "triggeredBy": actor.account_id }),
                pid: self.pid,
            })
            .await?;

        info!(
            operation_id = operation.id,
            strategy_id,
            op_type = %op_type,
            run_type = %run_type,
            status = %status,
            actor = %actor,
            "Operation created"
        );

        Ok(operation)
    }

    /// PENDING -> IN_PROGRESS, recording balances before execution.
    /// An IN_PROGRESS record is rejected; the caller fails it first.
    pub async fn transition_to_in_progress(&self, id: i64, before: Value) -> AppResult<Operation> {
        self.transition(id, OperationStatus::InProgress, json!({ "before": before }))
            .await
    }

    /// IN_PROGRESS -> SUCCESS, recording balances after execution and the handler payload
    pub async fn transition_to_success(
        &self,
        id: i64,
        after: Value,
        payload: Value,
    ) -> AppResult<Operation> {
        self.transition(
            id,
            OperationStatus::Success,
            json!({ "after": after, "payload": payload }),
        )
        .await
    }

    /// PENDING/IN_PROGRESS -> FAILED, or IN_PROGRESS -> FAILED_SHUTDOWN when `is_shutdown`
    pub async fn transition_to_failed(
        &self,
        id: i64,
        is_shutdown: bool,
        error: Option<&str>,
    ) -> AppResult<Operation> {
        let target = if is_shutdown {
            OperationStatus::FailedShutdown
        } else {
            OperationStatus::Failed
        };
        self.transition(id, target, json!({ "error": error })).await
    }

    /// Operator-requested status change, validated against the lifecycle
    pub async fn set_status(
        &self,
        id: i64,
        status: OperationStatus,
        actor: &Actor,
    ) -> AppResult<Operation> {
        self.transition(id, status, json!({ "statusSetBy": actor.account_id }))
            .await
    }

    async fn transition(&self, id: i64, to: OperationStatus, patch: Value) -> AppResult<Operation> {
        let current = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("operation {}", id)))?;

        if !current.status.can_transition_to(to) {
            return Err(AppError::InvalidTransition {
                id,
                from: current.status,
                to,
            });
        }

        let updated = self
            .store
            .update_status(id, current.status, to, &patch)
            .await?;

        info!(
            operation_id = id,
            strategy_id = updated.strategy_id,
            op_type = %updated.op_type,
            from = %current.status,
            to = %to,
            "Operation transitioned"
        );

        Ok(updated)
    }

    /// Shutdown hook: every IN_PROGRESS record created by this process becomes FAILED_SHUTDOWN
    pub async fn fail_owned_in_progress(&self) -> AppResult<Vec<Operation>> {
        let running = self.store.find_all_in_progress().await?;
        let mut failed = Vec::new();

        for op in running.into_iter().filter(|op| op.pid == self.pid) {
            match self
                .transition_to_failed(op.id, true, Some("process shutdown"))
                .await
            {
                Ok(updated) => failed.push(updated),
                Err(e) => warn!(operation_id = op.id, error = %e, "Failed to mark operation as shut down"),
            }
        }

        Ok(failed)
    }

    /// Startup hook: nothing can be running yet, so every IN_PROGRESS record
    /// was interrupted by a previous process and becomes FAILED_SHUTDOWN.
    pub async fn recover_interrupted(&self) -> AppResult<Vec<Operation>> {
        let running = self.store.find_all_in_progress().await?;
        let mut failed = Vec::new();

        for op in running {
            let reason = format!("interrupted (owner pid {})", op.pid);
            match self.transition_to_failed(op.id, true, Some(&reason)).await {
                Ok(updated) => failed.push(updated),
                Err(e) => warn!(operation_id = op.id, error = %e, "Failed to recover operation"),
            }
        }

        Ok(failed)
    }
}
