//! Job scheduler
//!
//! Delayed jobs are spawned tasks sleeping until due; each queue kind draws
//! workers from its own semaphore. Core jobs drive one operation record
//! through its lifecycle, cron jobs run a health check. Both kinds re-enqueue
//! their next occurrence only after the current handler returned, and only
//! while the (re-read) strategy is active and the kind is enabled.

use super::jobs::{Job, JobTarget, QueueKey, QueueKind};
use super::runner::OperationHandler;
use super::state_machine::OperationStateMachine;
use crate::config::SchedulerConfig;
use crate::error::{AppError, AppResult};
use crate::metrics::MetricsState;
use crate::models::{
    Actor, CronCheck, Operation, OperationStatus, OperationType, RunType, Strategy,
};
use crate::notifications::{NotificationEvent, NotificationSink};
use crate::store::StrategyConfigSource;
use crate::strategy::TxLog;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of an operator trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Another operation of the strategy is running
    TryAgainLater { operation_id: i64 },
    /// The existing pending operation now runs immediately
    Rescheduled { operation_id: i64 },
    Created { operation_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResult {
    Cancelled,
    /// Already picked up by a worker
    Active,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Delayed,
    Active,
}

struct JobEntry {
    seq: u64,
    key: QueueKey,
    cancel: CancellationToken,
    state: JobState,
}

enum FollowUp {
    Done,
    Operation {
        strategy_id: i64,
        op_type: OperationType,
    },
    Check {
        strategy_id: i64,
        check: CronCheck,
    },
}

struct Inner {
    state_machine: Arc<OperationStateMachine>,
    config: Arc<dyn StrategyConfigSource>,
    handler: Arc<dyn OperationHandler>,
    notifier: Arc<dyn NotificationSink>,
    metrics: Option<Arc<MetricsState>>,
    jobs: Mutex<HashMap<String, JobEntry>>,
    next_seq: AtomicU64,
    core_permits: Arc<Semaphore>,
    cron_permits: Arc<Semaphore>,
    shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    pub fn new(
        state_machine: Arc<OperationStateMachine>,
        config: Arc<dyn StrategyConfigSource>,
        handler: Arc<dyn OperationHandler>,
        notifier: Arc<dyn NotificationSink>,
        limits: &SchedulerConfig,
        metrics: Option<Arc<MetricsState>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state_machine,
                config,
                handler,
                notifier,
                metrics,
                jobs: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                core_permits: Arc::new(Semaphore::new(limits.core_concurrency)),
                cron_permits: Arc::new(Semaphore::new(limits.cron_concurrency)),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn state_machine(&self) -> &Arc<OperationStateMachine> {
        &self.inner.state_machine
    }

    /// Jobs currently delayed or running
    pub fn job_count(&self) -> usize {
        self.inner.jobs.lock().len()
    }

    pub fn has_job(&self, job_id: &str) -> bool {
        self.inner.jobs.lock().contains_key(job_id)
    }

    /// Queue `job`. Returns false when a job with the same id is already queued.
    pub fn enqueue(&self, job: Job) -> bool {
        let cancel = self.inner.shutdown.child_token();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        {
            let mut jobs = self.inner.jobs.lock();
            if jobs.contains_key(&job.id) {
                debug!(job_id = %job.id, queue = %job.key, "Job already queued");
                return false;
            }
            jobs.insert(
                job.id.clone(),
                JobEntry {
                    seq,
                    key: job.key,
                    cancel: cancel.clone(),
                    state: JobState::Delayed,
                },
            );
        }
        if let Some(metrics) = &self.inner.metrics {
            metrics.scheduled_jobs.inc();
        }

        debug!(
            job_id = %job.id,
            queue = %job.key,
            kind = %job.payload.kind,
            delay_ms = job.delay.as_millis() as u64,
            "Job enqueued"
        );

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_job(job, seq, cancel).await;
        });
        true
    }

    /// Cancel a delayed job. Running jobs are left alone.
    pub fn cancel(&self, job_id: &str) -> CancelResult {
        let mut jobs = self.inner.jobs.lock();
        match jobs.get(job_id).map(|entry| entry.state) {
            None => CancelResult::Missing,
            Some(JobState::Active) => CancelResult::Active,
            Some(JobState::Delayed) => {
                if let Some(entry) = jobs.remove(job_id) {
                    entry.cancel.cancel();
                    if let Some(metrics) = &self.inner.metrics {
                        metrics.scheduled_jobs.dec();
                    }
                }
                debug!(job_id, "Job cancelled");
                CancelResult::Cancelled
            }
        }
    }

    /// Stop every delayed job; running handlers finish
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    async fn run_job(self, job: Job, seq: u64, cancel: CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {
                self.forget(&job.id, seq);
                return;
            }
            _ = tokio::time::sleep(job.delay) => {}
        }

        let permits = match job.key.queue {
            QueueKind::Core => self.inner.core_permits.clone(),
            QueueKind::Cron => self.inner.cron_permits.clone(),
        };
        let permit = tokio::select! {
            _ = cancel.cancelled() => {
                self.forget(&job.id, seq);
                return;
            }
            permit = permits.acquire_owned() => permit,
        };
        let Ok(permit) = permit else {
            self.forget(&job.id, seq);
            return;
        };

        if !self.activate(&job.id, seq) {
            return;
        }

        let follow_up = self.dispatch(&job).await;
        drop(permit);
        self.forget(&job.id, seq);
        self.follow_up(follow_up).await;
    }

    fn activate(&self, job_id: &str, seq: u64) -> bool {
        let mut jobs = self.inner.jobs.lock();
        match jobs.get_mut(job_id) {
            Some(entry)
                if entry.seq == seq
                    && entry.state == JobState::Delayed
                    && !entry.cancel.is_cancelled() =>
            {
                entry.state = JobState::Active;
                true
            }
            _ => false,
        }
    }

    fn forget(&self, job_id: &str, seq: u64) {
        let mut jobs = self.inner.jobs.lock();
        if jobs.get(job_id).is_some_and(|entry| entry.seq == seq) {
            jobs.remove(job_id);
            if let Some(metrics) = &self.inner.metrics {
                metrics.scheduled_jobs.dec();
            }
        }
    }

    async fn dispatch(&self, job: &Job) -> FollowUp {
        let started = Instant::now();
        if let Some(metrics) = &self.inner.metrics {
            metrics
                .jobs_dispatched
                .with_label_values(&[job.payload.kind.as_str()])
                .inc();
        }

        let follow_up = match job.target {
            JobTarget::Operation { operation_id } => {
                match job.payload.kind.parse::<OperationType>() {
                    Ok(op_type) => {
                        self.dispatch_operation(
                            &job.id,
                            job.key.strategy_id,
                            operation_id,
                            op_type,
                            &job.payload.actor,
                        )
                        .await
                    }
                    Err(e) => {
                        warn!(job_id = %job.id, queue = %job.key, error = %e, "Unknown job kind, dropping");
                        FollowUp::Done
                    }
                }
            }
            JobTarget::Strategy { strategy_id } => match job.payload.kind.parse::<CronCheck>() {
                Ok(check) => self.dispatch_check(strategy_id, check).await,
                Err(e) => {
                    warn!(job_id = %job.id, queue = %job.key, error = %e, "Unknown job kind, dropping");
                    FollowUp::Done
                }
            },
        };

        if let Some(metrics) = &self.inner.metrics {
            metrics
                .job_duration
                .observe(started.elapsed().as_millis() as f64);
        }
        follow_up
    }

    async fn dispatch_operation(
        &self,
        job_id: &str,
        strategy_id: i64,
        operation_id: i64,
        op_type: OperationType,
        actor: &Actor,
    ) -> FollowUp {
        let sm = &self.inner.state_machine;
        let store = sm.store();
        let follow_up = FollowUp::Operation {
            strategy_id,
            op_type,
        };

        let operation = match store.get(operation_id).await {
            Ok(Some(operation)) => operation,
            Ok(None) => {
                warn!(operation_id, "Operation of job no longer exists");
                return FollowUp::Done;
            }
            Err(e) => {
                error!(operation_id, error = %e, "Failed to load operation");
                return follow_up;
            }
        };
        if operation
            .job_id
            .as_deref()
            .is_some_and(|current| current != job_id)
        {
            debug!(operation_id, job_id, "Job superseded by a newer one, skipping");
            return FollowUp::Done;
        }

        let operation = match operation.status {
            OperationStatus::Pending => operation,
            OperationStatus::InProgress => {
                warn!(
                    operation_id,
                    strategy_id = operation.strategy_id,
                    owner_pid = operation.pid,
                    "Stale in-progress operation, replacing"
                );
                if let Err(e) = sm
                    .transition_to_failed(operation.id, false, Some("stale in-progress record"))
                    .await
                {
                    error!(operation_id, error = %e, "Failed to fail stale operation");
                    return follow_up;
                }
                match sm
                    .create(
                        op_type,
                        operation.run_type,
                        operation.strategy_id,
                        operation.blockchain_id,
                        OperationStatus::Pending,
                        actor,
                    )
                    .await
                {
                    Ok(replacement) => replacement,
                    Err(e) => {
                        warn!(operation_id, error = %e, "Could not replace stale operation");
                        return follow_up;
                    }
                }
            }
            status => {
                debug!(operation_id, status = %status, "Operation already finished, skipping job");
                return FollowUp::Done;
            }
        };

        let strategy = match self.inner.config.strategy(operation.strategy_id).await {
            Ok(strategy) => strategy,
            Err(e) => {
                self.fail_operation(&operation, &e.to_string()).await;
                return FollowUp::Done;
            }
        };
        if !strategy.is_active && !op_type.allowed_when_inactive() {
            let reason = AppError::InactiveStrategy(strategy.id).to_string();
            self.fail_operation(&operation, &reason).await;
            return FollowUp::Done;
        }

        let before = self.balances(&strategy).await;
        let operation = match sm.transition_to_in_progress(operation.id, before).await {
            Ok(operation) => operation,
            Err(e @ AppError::OperationInProgressExists { .. }) => {
                warn!(
                    operation_id = operation.id,
                    strategy_id = strategy.id,
                    op_type = %op_type,
                    "Another operation of the strategy is running"
                );
                self.fail_operation(&operation, &e.to_string()).await;
                return follow_up;
            }
            Err(e) => {
                warn!(operation_id = operation.id, error = %e, "Operation could not start");
                return follow_up;
            }
        };

        let farms = match self.inner.config.farms(strategy.id).await {
            Ok(farms) => farms,
            Err(e) => {
                self.fail_operation(&operation, &e.to_string()).await;
                return follow_up;
            }
        };

        let mut log = TxLog::new();
        let result = self
            .inner
            .handler
            .run_operation(op_type, &strategy, &farms, &mut log)
            .await;

        for receipt in &log.receipts {
            if let Err(e) = store.record_transaction(operation.id, receipt).await {
                error!(
                    operation_id = operation.id,
                    tx_hash = %receipt.tx_hash,
                    error = %e,
                    "Failed to record transaction"
                );
            }
        }

        match result {
            Ok(payload) => {
                let after = self.balances(&strategy).await;
                match sm.transition_to_success(operation.id, after, payload).await {
                    Ok(_) => {
                        info!(
                            operation_id = operation.id,
                            strategy_id = strategy.id,
                            op_type = %op_type,
                            transactions = log.receipts.len(),
                            "Operation succeeded"
                        );
                        self.count(op_type, OperationStatus::Success);
                    }
                    Err(e) => {
                        error!(operation_id = operation.id, error = %e, "Failed to mark operation successful")
                    }
                }
            }
            Err(e) if e.is_policy_violation() => {
                warn!(
                    operation_id = operation.id,
                    strategy_id = strategy.id,
                    op_type = %op_type,
                    error = %e,
                    "Operation rejected"
                );
                self.fail_operation(&operation, &e.to_string()).await;
            }
            Err(e) => {
                error!(
                    operation_id = operation.id,
                    strategy_id = strategy.id,
                    op_type = %op_type,
                    error = %e,
                    "Operation failed"
                );
                self.fail_operation(&operation, &e.to_string()).await;
                self.inner
                    .notifier
                    .notify(NotificationEvent::JobFailed {
                        strategy_id: strategy.id,
                        kind: op_type.as_str().to_string(),
                        error: e.to_string(),
                    })
                    .await;
            }
        }

        follow_up
    }

    async fn dispatch_check(&self, strategy_id: i64, check: CronCheck) -> FollowUp {
        let strategy = match self.inner.config.strategy(strategy_id).await {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!(strategy_id, check = %check, error = %e, "Strategy unavailable for check");
                return FollowUp::Done;
            }
        };
        if !strategy.is_active || !strategy.settings.cron_enabled(check) {
            debug!(strategy_id, check = %check, "Check disabled, chain stops");
            return FollowUp::Done;
        }

        let follow_up = FollowUp::Check { strategy_id, check };
        let result = match self.inner.config.farms(strategy_id).await {
            Ok(farms) => self.inner.handler.run_check(check, &strategy, &farms).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(details) => debug!(strategy_id, check = %check, details = %details, "Check finished"),
            Err(e) => {
                error!(strategy_id, check = %check, error = %e, "Check failed");
                self.inner
                    .notifier
                    .notify(NotificationEvent::JobFailed {
                        strategy_id,
                        kind: check.as_str().to_string(),
                        error: e.to_string(),
                    })
                    .await;
            }
        }

        follow_up
    }

    async fn follow_up(&self, follow_up: FollowUp) {
        let result = match follow_up {
            FollowUp::Done => Ok(()),
            FollowUp::Operation {
                strategy_id,
                op_type,
            } => self.reschedule_operation(strategy_id, op_type).await,
            FollowUp::Check { strategy_id, check } => {
                self.reschedule_check(strategy_id, check).await
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to schedule next occurrence");
        }
    }

    async fn reschedule_operation(&self, strategy_id: i64, op_type: OperationType) -> AppResult<()> {
        if !op_type.is_recurring() {
            return Ok(());
        }
        let strategy = self.inner.config.strategy(strategy_id).await?;
        if !strategy.is_active || !strategy.settings.autostart(op_type) {
            debug!(strategy_id, op_type = %op_type, "Autostart off, chain stops");
            return Ok(());
        }
        let delay = Duration::from_millis(strategy.settings.timeout_ms(op_type));
        self.schedule_operation(&strategy, op_type, RunType::Job, Actor::system(), delay)
            .await
            .map(|_| ())
    }

    async fn reschedule_check(&self, strategy_id: i64, check: CronCheck) -> AppResult<()> {
        let strategy = self.inner.config.strategy(strategy_id).await?;
        if strategy.is_active && strategy.settings.cron_enabled(check) {
            let delay = Duration::from_millis(strategy.settings.cron_timeout_ms(check));
            self.enqueue(Job::check(&strategy, check, delay));
        }
        Ok(())
    }

    /// Create a PENDING operation and its job. `None` when one of this type is
    /// already pending for the strategy.
    pub async fn schedule_operation(
        &self,
        strategy: &Strategy,
        op_type: OperationType,
        run_type: RunType,
        actor: Actor,
        delay: Duration,
    ) -> AppResult<Option<i64>> {
        let operation = match self
            .inner
            .state_machine
            .create(
                op_type,
                run_type,
                strategy.id,
                strategy.blockchain_id,
                OperationStatus::Pending,
                &actor,
            )
            .await
        {
            Ok(operation) => operation,
            Err(AppError::OperationPendingExists { .. }) => {
                self.requeue_orphaned_pending(strategy, op_type, actor, delay)
                    .await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.enqueue_operation(strategy, &operation, actor, delay)
            .await?;
        Ok(Some(operation.id))
    }

    /// A PENDING record whose job is gone (a dispatch that hit a store error)
    /// gets a new job; one with a live job is left alone.
    async fn requeue_orphaned_pending(
        &self,
        strategy: &Strategy,
        op_type: OperationType,
        actor: Actor,
        delay: Duration,
    ) -> AppResult<()> {
        let store = self.inner.state_machine.store();
        let Some(pending) = store.find_pending(strategy.id, op_type).await? else {
            return Ok(());
        };
        if pending
            .job_id
            .as_deref()
            .is_some_and(|job_id| self.has_job(job_id))
        {
            debug!(strategy_id = strategy.id, op_type = %op_type, "Already pending");
            return Ok(());
        }

        warn!(
            operation_id = pending.id,
            strategy_id = strategy.id,
            op_type = %op_type,
            "Pending operation has no queued job, re-enqueueing"
        );
        self.enqueue_operation(strategy, &pending, actor, delay)
            .await
    }

    async fn enqueue_operation(
        &self,
        strategy: &Strategy,
        operation: &Operation,
        actor: Actor,
        delay: Duration,
    ) -> AppResult<()> {
        let job = Job::operation(strategy, operation.id, operation.op_type, actor, delay);
        let due = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.inner
            .state_machine
            .store()
            .set_job(operation.id, &job.id, due)
            .await?;
        self.enqueue(job);
        Ok(())
    }

    /// Operator trigger: run `op_type` now.
    ///
    /// A running operation of the strategy means "try again later"; a pending
    /// one of the same type has its job replaced by an immediate one.
    pub async fn run_operation_by_rest_api_call(
        &self,
        actor: &Actor,
        strategy_id: i64,
        op_type: OperationType,
    ) -> AppResult<TriggerOutcome> {
        let strategy = self.inner.config.strategy(strategy_id).await?;
        if !strategy.is_active && !op_type.allowed_when_inactive() {
            return Err(AppError::InactiveStrategy(strategy_id));
        }

        let store = self.inner.state_machine.store();
        if let Some(running) = store.find_in_progress(strategy_id).await? {
            info!(
                strategy_id,
                operation_id = running.id,
                actor = %actor,
                "Operation in progress, try again later"
            );
            return Ok(TriggerOutcome::TryAgainLater {
                operation_id: running.id,
            });
        }

        if let Some(pending) = store.find_pending(strategy_id, op_type).await? {
            if let Some(job_id) = &pending.job_id {
                if self.cancel(job_id) == CancelResult::Active {
                    return Ok(TriggerOutcome::TryAgainLater {
                        operation_id: pending.id,
                    });
                }
            }
            self.enqueue_operation(&strategy, &pending, actor.clone(), Duration::ZERO)
                .await?;
            info!(strategy_id, operation_id = pending.id, actor = %actor, "Pending operation rescheduled");
            return Ok(TriggerOutcome::Rescheduled {
                operation_id: pending.id,
            });
        }

        let operation_id = self
            .schedule_operation(&strategy, op_type, RunType::Api, actor.clone(), Duration::ZERO)
            .await?
            .ok_or(AppError::OperationPendingExists {
                strategy_id,
                op_type,
            })?;
        Ok(TriggerOutcome::Created { operation_id })
    }

    /// Start the autostart core chains and the enabled cron chains of an active strategy
    pub async fn start_chains(&self, strategy_id: i64) -> AppResult<()> {
        let strategy = self.inner.config.strategy(strategy_id).await?;
        if !strategy.is_active {
            return Err(AppError::InactiveStrategy(strategy_id));
        }

        for op_type in OperationType::ALL
            .into_iter()
            .filter(|op_type| op_type.is_recurring() && strategy.settings.autostart(*op_type))
        {
            self.schedule_operation(&strategy, op_type, RunType::Job, Actor::system(), Duration::ZERO)
                .await?;
        }

        for check in CronCheck::ALL
            .into_iter()
            .filter(|check| strategy.settings.cron_enabled(*check))
        {
            self.enqueue(Job::check(&strategy, check, Duration::ZERO));
        }

        info!(strategy_id, "Strategy chains started");
        Ok(())
    }

    /// Cancel every delayed job of a strategy and fail its PENDING operations.
    /// Running jobs complete.
    pub async fn cancel_strategy_jobs(&self, strategy_id: i64, actor: &Actor) -> AppResult<usize> {
        let job_ids: Vec<String> = self
            .inner
            .jobs
            .lock()
            .iter()
            .filter(|(_, entry)| {
                entry.key.strategy_id == strategy_id && entry.state == JobState::Delayed
            })
            .map(|(id, _)| id.clone())
            .collect();
        for job_id in &job_ids {
            self.cancel(job_id);
        }

        let sm = &self.inner.state_machine;
        let pending = sm.store().find_pending_for_strategy(strategy_id).await?;
        let reason = format!("cancelled by {}", actor);
        let mut failed = 0;
        for operation in &pending {
            match sm.transition_to_failed(operation.id, false, Some(&reason)).await {
                Ok(_) => {
                    failed += 1;
                    self.count(operation.op_type, OperationStatus::Failed);
                }
                Err(e) => warn!(operation_id = operation.id, error = %e, "Failed to cancel operation"),
            }
        }

        info!(
            strategy_id,
            jobs = job_ids.len(),
            operations = failed,
            actor = %actor,
            "Strategy jobs cancelled"
        );
        Ok(failed)
    }

    /// Startup: re-enqueue PENDING operations at their scheduled time and
    /// restart the chains of every active strategy
    pub async fn restore(&self) -> AppResult<usize> {
        let sm = &self.inner.state_machine;
        let pending = sm.store().find_all_pending().await?;
        let mut restored = 0;

        for operation in pending {
            let strategy = match self.inner.config.strategy(operation.strategy_id).await {
                Ok(strategy) => strategy,
                Err(e) => {
                    warn!(operation_id = operation.id, error = %e, "Cannot restore operation");
                    continue;
                }
            };
            if !strategy.is_active && !operation.op_type.allowed_when_inactive() {
                self.fail_operation(&operation, "strategy inactive at restart")
                    .await;
                continue;
            }

            let delay = operation
                .scheduled_at
                .and_then(|at| (at - Utc::now()).to_std().ok())
                .unwrap_or(Duration::ZERO);
            let actor = operation
                .meta
                .get("triggeredBy")
                .and_then(Value::as_str)
                .map(Actor::new)
                .unwrap_or_else(Actor::system);

            self.enqueue_operation(&strategy, &operation, actor, delay)
                .await?;
            restored += 1;
        }

        for strategy in self.inner.config.active_strategies().await? {
            if let Err(e) = self.start_chains(strategy.id).await {
                warn!(strategy_id = strategy.id, error = %e, "Failed to start strategy chains");
            }
        }

        info!(restored, "Scheduler restored");
        Ok(restored)
    }

    async fn balances(&self, strategy: &Strategy) -> Value {
        match self.inner.handler.wallet_balances(strategy).await {
            Ok(balances) => balances,
            Err(e) => {
                warn!(strategy_id = strategy.id, error = %e, "Failed to read wallet balances");
                json!({ "error": e.to_string() })
            }
        }
    }

    async fn fail_operation(&self, operation: &Operation, reason: &str) {
        match self
            .inner
            .state_machine
            .transition_to_failed(operation.id, false, Some(reason))
            .await
        {
            Ok(_) => self.count(operation.op_type, OperationStatus::Failed),
            Err(e) => warn!(operation_id = operation.id, error = %e, "Failed to fail operation"),
        }
    }

    fn count(&self, op_type: OperationType, status: OperationStatus) {
        if let Some(metrics) = &self.inner.metrics {
            metrics
                .operations_total
                .with_label_values(&[op_type.as_str(), status.as_str()])
                .inc();
        }
    }
}
