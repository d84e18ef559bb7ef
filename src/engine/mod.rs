//! Orchestration engine for the LBF Operator
//!
//! Owns the operation lifecycle, the job queues and startup recovery. Domain
//! work is delegated to an [`OperationHandler`].

pub mod jobs;
pub mod recovery;
pub mod runner;
pub mod scheduler;
pub mod state_machine;

pub use jobs::{Job, JobPayload, JobTarget, QueueKey, QueueKind};
pub use recovery::{RecoveryManager, RecoveryReport};
pub use runner::{OperationHandler, StrategyRunner};
pub use scheduler::{CancelResult, JobScheduler, TriggerOutcome};
pub use state_machine::OperationStateMachine;
