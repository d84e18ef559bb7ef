//! Job descriptors for the scheduler queues

use crate::models::{Actor, CronCheck, OperationType, Strategy, StrategyKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool a job runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// Operations (rebalance, claims, teardown)
    Core,
    /// Recurring health checks
    Cron,
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueKind::Core => write!(f, "core"),
            QueueKind::Cron => write!(f, "cron"),
        }
    }
}

/// Queue identity: one core and one cron queue per strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueKey {
    pub strategy_kind: StrategyKind,
    pub strategy_id: i64,
    pub queue: QueueKind,
}

impl QueueKey {
    pub fn new(strategy: &Strategy, queue: QueueKind) -> Self {
        Self {
            strategy_kind: strategy.kind(),
            strategy_id: strategy.id,
            queue,
        }
    }
}

impl std::fmt::Display for QueueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.strategy_kind, self.strategy_id, self.queue)
    }
}

/// Dispatch tag plus the identity the work runs for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Operation type or cron check name
    pub kind: String,
    pub actor: Actor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "camelCase")]
pub enum JobTarget {
    #[serde(rename_all = "camelCase")]
    Operation { operation_id: i64 },
    #[serde(rename_all = "camelCase")]
    Strategy { strategy_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub key: QueueKey,
    pub target: JobTarget,
    pub payload: JobPayload,
    pub delay: Duration,
}

impl Job {
    /// Core job bound to an existing operation record
    pub fn operation(
        strategy: &Strategy,
        operation_id: i64,
        op_type: OperationType,
        actor: Actor,
        delay: Duration,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key: QueueKey::new(strategy, QueueKind::Core),
            target: JobTarget::Operation { operation_id },
            payload: JobPayload {
                kind: op_type.as_str().to_string(),
                actor,
            },
            delay,
        }
    }

    /// Cron job. The id is derived from the queue and check so a check is
    /// never queued twice for one strategy.
    pub fn check(strategy: &Strategy, check: CronCheck, delay: Duration) -> Self {
        let key = QueueKey::new(strategy, QueueKind::Cron);
        Self {
            id: Self::check_id(&key, check),
            key,
            target: JobTarget::Strategy {
                strategy_id: strategy.id,
            },
            payload: JobPayload {
                kind: check.as_str().to_string(),
                actor: Actor::system(),
            },
            delay,
        }
    }

    pub fn check_id(key: &QueueKey, check: CronCheck) -> String {
        format!("{}:{}", key, check)
    }
}
