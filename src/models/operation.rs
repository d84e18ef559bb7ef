//! Operation models - durable record of one strategy action and its lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Strategy action performed by an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// Rebalance borrowed liquidity against the borrow limit
    StrategyRun,
    /// Harvest rewards and distribute the reward token
    ClaimRun,
    /// Harvest lending rewards and compound them into the lending market
    VenusClaimRun,
    /// Full teardown and return of all funds to the storage contract
    WithdrawAllToStorage,
    /// Rebuild the LP reserve list of the logic contract
    RecreateReserves,
}

impl OperationType {
    /// All operation types, in declaration order
    pub const ALL: [OperationType; 5] = [
        OperationType::StrategyRun,
        OperationType::ClaimRun,
        OperationType::VenusClaimRun,
        OperationType::WithdrawAllToStorage,
        OperationType::RecreateReserves,
    ];

    /// Types that re-enqueue themselves after every run when autostart is on
    pub fn is_recurring(&self) -> bool {
        matches!(
            self,
            OperationType::StrategyRun | OperationType::ClaimRun | OperationType::VenusClaimRun
        )
    }

    /// Types an operator may still trigger while the strategy is inactive
    pub fn allowed_when_inactive(&self) -> bool {
        matches!(
            self,
            OperationType::WithdrawAllToStorage | OperationType::RecreateReserves
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::StrategyRun => "STRATEGY_RUN",
            OperationType::ClaimRun => "CLAIM_RUN",
            OperationType::VenusClaimRun => "VENUS_CLAIM_RUN",
            OperationType::WithdrawAllToStorage => "WITHDRAW_ALL_TO_STORAGE",
            OperationType::RecreateReserves => "RECREATE_RESERVES",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STRATEGY_RUN" => Ok(OperationType::StrategyRun),
            "CLAIM_RUN" => Ok(OperationType::ClaimRun),
            "VENUS_CLAIM_RUN" => Ok(OperationType::VenusClaimRun),
            "WITHDRAW_ALL_TO_STORAGE" => Ok(OperationType::WithdrawAllToStorage),
            "RECREATE_RESERVES" => Ok(OperationType::RecreateReserves),
            _ => Err(format!("Unknown operation type: {}", s)),
        }
    }
}

/// Who triggered the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunType {
    /// Operator call
    Api,
    /// Scheduler occurrence
    Job,
}

impl std::fmt::Display for RunType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunType::Api => write!(f, "API"),
            RunType::Job => write!(f, "JOB"),
        }
    }
}

impl std::str::FromStr for RunType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "API" => Ok(RunType::Api),
            "JOB" => Ok(RunType::Job),
            _ => Err(format!("Unknown run type: {}", s)),
        }
    }
}

/// Operation status representing the lifecycle
///
/// State transitions:
/// ```text
/// PENDING -> IN_PROGRESS -> SUCCESS
///    |            |
///    |            +-------> FAILED
///    |            |
///    v            +-------> FAILED_SHUTDOWN
///  FAILED (cancelled before start)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Scheduled, waiting for its job to fire
    Pending,
    /// Handler is executing
    InProgress,
    /// Handler completed
    Success,
    /// Handler raised, or the record was cancelled/stale
    Failed,
    /// Process stopped while the handler was executing
    FailedShutdown,
}

impl OperationStatus {
    /// Check if transition to new status is valid
    pub fn can_transition_to(&self, new_status: OperationStatus) -> bool {
        use OperationStatus::*;

        matches!(
            (self, new_status),
            (Pending, InProgress)
                | (Pending, Failed)
                | (InProgress, Success)
                | (InProgress, Failed)
                | (InProgress, FailedShutdown)
        )
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Success | OperationStatus::Failed | OperationStatus::FailedShutdown
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "PENDING",
            OperationStatus::InProgress => "IN_PROGRESS",
            OperationStatus::Success => "SUCCESS",
            OperationStatus::Failed => "FAILED",
            OperationStatus::FailedShutdown => "FAILED_SHUTDOWN",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(OperationStatus::Pending),
            "IN_PROGRESS" => Ok(OperationStatus::InProgress),
            "SUCCESS" => Ok(OperationStatus::Success),
            "FAILED" => Ok(OperationStatus::Failed),
            "FAILED_SHUTDOWN" => Ok(OperationStatus::FailedShutdown),
            _ => Err(format!("Unknown operation status: {}", s)),
        }
    }
}

/// Operation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: i64,
    pub strategy_id: i64,
    pub blockchain_id: i64,
    pub op_type: OperationType,
    pub run_type: RunType,
    pub status: OperationStatus,
    /// Balances, payload and error details, deep-merged on every transition
    pub meta: Value,
    /// Scheduled job correlated with this record
    pub job_id: Option<String>,
    /// Process that created the record
    pub pid: u32,
    /// When the correlated job is due to fire
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert request for a new operation
#[derive(Debug, Clone)]
pub struct NewOperation {
    pub strategy_id: i64,
    pub blockchain_id: i64,
    pub op_type: OperationType,
    pub run_type: RunType,
    pub status: OperationStatus,
    pub meta: Value,
    pub pid: u32,
}

/// Acting identity passed explicitly through operator-triggered calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub account_id: String,
}

impl Actor {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }

    /// Identity used for scheduler-driven work
    pub fn system() -> Self {
        Self::new("system")
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.account_id)
    }
}

/// Merge `patch` into `target`, recursing into objects; non-object values in
/// `patch` replace those in `target`. Null values are never written.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None if value.is_null() => {}
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => {
            if !patch.is_null() {
                *target = patch.clone();
            }
        }
    }
}
