//! Domain models

mod operation;
mod strategy;

pub use operation::{deep_merge, Actor, NewOperation, Operation, OperationStatus, OperationType, RunType};
pub use strategy::{
    CommonSettings, CronCheck, Farm, FarmToken, LblSettings, LbfSettings, LendingMarket,
    PreserveTier, Strategy, StrategyContracts, StrategyKind, StrategySettings,
};
