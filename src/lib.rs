//! LBF Operator Library
//!
//! Orchestrates land-borrow-farm strategies: operation records, job queues,
//! rebalancing, reward claims and batched submission.
//! This library exposes core modules for testing.

pub mod chain;
pub mod config;
pub mod constants;
pub mod db;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod operator;
pub mod store;
pub mod strategy;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utils;

// Re-export commonly used types for tests
pub use chain::{ChainClient, ChainError, ChainValue, GatewayClient, TransactionIntent};
pub use config::AppConfig;
pub use db::DbPool;
pub use engine::{
    JobScheduler, OperationHandler, OperationStateMachine, RecoveryManager, StrategyRunner,
    TriggerOutcome,
};
pub use error::{AppError, AppResult};
pub use models::{Actor, Farm, Operation, OperationStatus, OperationType, RunType, Strategy};
pub use notifications::{CompositeNotifier, NotificationEvent, NotificationSink};
pub use operator::OperatorService;
pub use store::SqliteStore;
