//! Startup recovery and orphan sweep
//!
//! Recovery process at startup:
//! 1. Every IN_PROGRESS operation was interrupted and becomes FAILED_SHUTDOWN
//! 2. Operators are notified of how many were interrupted
//! 3. PENDING operations are re-enqueued and strategy chains restarted
//!
//! The sweep periodically deletes finished operations older than the
//! configured age that never produced a transaction.

use super::scheduler::JobScheduler;
use crate::config::SchedulerConfig;
use crate::error::AppResult;
use crate::notifications::{NotificationEvent, NotificationSink};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Outcome of startup recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryReport {
    /// IN_PROGRESS records marked FAILED_SHUTDOWN
    pub interrupted: usize,
    /// PENDING records re-enqueued
    pub restored: usize,
}

pub struct RecoveryManager {
    scheduler: JobScheduler,
    notifier: Arc<dyn NotificationSink>,
    orphan_max_age_secs: i64,
    sweep_interval_secs: u64,
}

impl RecoveryManager {
    pub fn new(
        scheduler: JobScheduler,
        notifier: Arc<dyn NotificationSink>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            scheduler,
            notifier,
            orphan_max_age_secs: i64::try_from(config.orphan_max_age_secs).unwrap_or(i64::MAX),
            sweep_interval_secs: config.orphan_sweep_interval_secs,
        }
    }

    pub async fn recover_on_startup(&self) -> AppResult<RecoveryReport> {
        let interrupted = self
            .scheduler
            .state_machine()
            .recover_interrupted()
            .await?;

        if !interrupted.is_empty() {
            tracing::warn!(
                count = interrupted.len(),
                "Operations interrupted by previous shutdown"
            );
            self.notifier
                .notify(NotificationEvent::OperationsShutdown {
                    count: interrupted.len(),
                })
                .await;
        }

        let restored = self.scheduler.restore().await?;

        Ok(RecoveryReport {
            interrupted: interrupted.len(),
            restored,
        })
    }

    /// Delete finished operations older than the configured age with no transactions
    pub async fn sweep_orphans(&self) -> AppResult<usize> {
        let cutoff = Utc::now()
            - Duration::try_seconds(self.orphan_max_age_secs).unwrap_or_else(Duration::zero);
        let store = self.scheduler.state_machine().store();
        let orphans = store.find_orphans_older_than(cutoff).await?;

        let mut deleted = 0;
        for operation in &orphans {
            match store.delete(operation.id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::error!(operation_id = operation.id, error = %e, "Failed to delete orphan")
                }
            }
        }

        if deleted > 0 {
            tracing::info!(deleted, "Orphan operations swept");
        }
        Ok(deleted)
    }

    /// Run the sweep every interval until `shutdown` fires
    pub async fn start_background_task(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(
            max_age_secs = self.orphan_max_age_secs,
            interval_secs = self.sweep_interval_secs,
            "Starting orphan sweep background task"
        );

        let mut sweep_interval = interval(std::time::Duration::from_secs(self.sweep_interval_secs));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sweep_interval.tick() => {
                    if let Err(e) = self.sweep_orphans().await {
                        tracing::error!(error = %e, "Orphan sweep failed");
                    }
                }
            }
        }
    }
}
