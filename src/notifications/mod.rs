//! Operator notifications
//!
//! Alerts raised by the engine and the strategy handlers:
//! - Debt left after a full repay (base asset exhausted)
//! - Negative claim result
//! - Rewards not distributed (dust) / distributed
//! - Boosting underfunded / topped up
//! - Job failures
//! - Low admin or boosting wallet balance
//! - Operations interrupted by shutdown

pub mod slack;
pub mod telegram;

pub use slack::SlackNotifier;
pub use telegram::TelegramNotifier;

use crate::metrics::MetricsState;
use crate::utils::format_wei;
use alloy_primitives::{Address, I256, U256};
use futures_util::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Alert level for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Funds at risk or work interrupted
    Critical,
    /// Needs operator attention
    Important,
    /// Informational
    Info,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Critical => write!(f, "CRITICAL"),
            AlertLevel::Important => write!(f, "IMPORTANT"),
            AlertLevel::Info => write!(f, "INFO"),
        }
    }
}

/// Notification event types
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// A loan could not be fully repaid
    DebtWarning {
        strategy_id: i64,
        token: Address,
        shortfall: U256,
    },
    /// Claim analytics came out negative (USD, 1e18)
    NegativeResult { strategy_id: i64, usd: I256 },
    /// Claim skipped distribution
    RewardsNotDistributed {
        strategy_id: i64,
        amount: U256,
        reason: String,
    },
    RewardsDistributed {
        strategy_id: i64,
        amount: U256,
        usd: U256,
    },
    /// Boosting wallet cannot cover the top-up
    BoostingUnderfunded {
        strategy_id: i64,
        required: U256,
        available: U256,
    },
    BoostingToppedUp {
        strategy_id: i64,
        amount: U256,
        blocks: u64,
    },
    /// A scheduled job raised
    JobFailed {
        strategy_id: i64,
        kind: String,
        error: String,
    },
    LowAdminBalance {
        strategy_id: i64,
        wallet: Address,
        balance: U256,
        minimum: U256,
    },
    LowBoostingBalance {
        strategy_id: i64,
        wallet: Address,
        balance: U256,
        minimum: U256,
    },
    /// Running operations were marked FAILED_SHUTDOWN
    OperationsShutdown { count: usize },
}

fn format_usd(usd: I256) -> String {
    let sign = if usd.is_negative() { "-" } else { "" };
    format!("{}{}", sign, format_wei(usd.unsigned_abs()))
}

impl NotificationEvent {
    /// Stable template identifier
    pub fn template_id(&self) -> &'static str {
        match self {
            NotificationEvent::DebtWarning { .. } => "debt_warning",
            NotificationEvent::NegativeResult { .. } => "negative_result",
            NotificationEvent::RewardsNotDistributed { .. } => "rewards_not_distributed",
            NotificationEvent::RewardsDistributed { .. } => "rewards_distributed",
            NotificationEvent::BoostingUnderfunded { .. } => "boosting_underfunded",
            NotificationEvent::BoostingToppedUp { .. } => "boosting_topped_up",
            NotificationEvent::JobFailed { .. } => "job_failed",
            NotificationEvent::LowAdminBalance { .. } => "low_admin_balance",
            NotificationEvent::LowBoostingBalance { .. } => "low_boosting_balance",
            NotificationEvent::OperationsShutdown { .. } => "operations_shutdown",
        }
    }

    pub fn strategy_id(&self) -> Option<i64> {
        match self {
            NotificationEvent::DebtWarning { strategy_id, .. }
            | NotificationEvent::NegativeResult { strategy_id, .. }
            | NotificationEvent::RewardsNotDistributed { strategy_id, .. }
            | NotificationEvent::RewardsDistributed { strategy_id, .. }
            | NotificationEvent::BoostingUnderfunded { strategy_id, .. }
            | NotificationEvent::BoostingToppedUp { strategy_id, .. }
            | NotificationEvent::JobFailed { strategy_id, .. }
            | NotificationEvent::LowAdminBalance { strategy_id, .. }
            | NotificationEvent::LowBoostingBalance { strategy_id, .. } => Some(*strategy_id),
            NotificationEvent::OperationsShutdown { .. } => None,
        }
    }

    /// Template fields; amounts are whole-token strings
    pub fn fields(&self) -> Value {
        match self {
            NotificationEvent::DebtWarning {
                strategy_id,
                token,
                shortfall,
            } => json!({
                "strategyId": strategy_id,
                "token": token.to_string(),
                "shortfall": format_wei(*shortfall),
            }),
            NotificationEvent::NegativeResult { strategy_id, usd } => json!({
                "strategyId": strategy_id,
                "usd": format_usd(*usd),
            }),
            NotificationEvent::RewardsNotDistributed {
                strategy_id,
                amount,
                reason,
            } => json!({
                "strategyId": strategy_id,
                "amount": format_wei(*amount),
                "reason": reason,
            }),
            NotificationEvent::RewardsDistributed {
                strategy_id,
                amount,
                usd,
            } => json!({
                "strategyId": strategy_id,
                "amount": format_wei(*amount),
                "usd": format_wei(*usd),
            }),
            NotificationEvent::BoostingUnderfunded {
                strategy_id,
                required,
                available,
            } => json!({
                "strategyId": strategy_id,
                "required": format_wei(*required),
                "available": format_wei(*available),
            }),
            NotificationEvent::BoostingToppedUp {
                strategy_id,
                amount,
                blocks,
            } => json!({
                "strategyId": strategy_id,
                "amount": format_wei(*amount),
                "blocks": blocks,
            }),
            NotificationEvent::JobFailed {
                strategy_id,
                kind,
                error,
            } => json!({
                "strategyId": strategy_id,
                "kind": kind,
                "error": error,
            }),
            NotificationEvent::LowAdminBalance {
                strategy_id,
                wallet,
                balance,
                minimum,
            }
            | NotificationEvent::LowBoostingBalance {
                strategy_id,
                wallet,
                balance,
                minimum,
            } => json!({
                "strategyId": strategy_id,
                "wallet": wallet.to_string(),
                "balance": format_wei(*balance),
                "minimum": format_wei(*minimum),
            }),
            NotificationEvent::OperationsShutdown { count } => json!({ "count": count }),
        }
    }

    /// Get the alert level for this event
    pub fn level(&self) -> AlertLevel {
        match self {
            NotificationEvent::DebtWarning { .. } => AlertLevel::Critical,
            NotificationEvent::JobFailed { .. } => AlertLevel::Critical,
            NotificationEvent::OperationsShutdown { .. } => AlertLevel::Critical,
            NotificationEvent::NegativeResult { .. } => AlertLevel::Important,
            NotificationEvent::RewardsNotDistributed { .. } => AlertLevel::Important,
            NotificationEvent::BoostingUnderfunded { .. } => AlertLevel::Important,
            NotificationEvent::LowAdminBalance { .. } => AlertLevel::Important,
            NotificationEvent::LowBoostingBalance { .. } => AlertLevel::Important,
            NotificationEvent::RewardsDistributed { .. } => AlertLevel::Info,
            NotificationEvent::BoostingToppedUp { .. } => AlertLevel::Info,
        }
    }

    /// Format the event as a notification message
    pub fn format_message(&self) -> String {
        match self {
            NotificationEvent::DebtWarning {
                strategy_id,
                token,
                shortfall,
            } => format!(
                "🚨 Strategy {}: loan of {} not fully repaid, shortfall {}",
                strategy_id,
                token,
                format_wei(*shortfall)
            ),
            NotificationEvent::NegativeResult { strategy_id, usd } => format!(
                "📉 Strategy {}: negative result {} USD",
                strategy_id,
                format_usd(*usd)
            ),
            NotificationEvent::RewardsNotDistributed {
                strategy_id,
                amount,
                reason,
            } => format!(
                "⚠️ Strategy {}: rewards not distributed ({} tokens): {}",
                strategy_id,
                format_wei(*amount),
                reason
            ),
            NotificationEvent::RewardsDistributed {
                strategy_id,
                amount,
                usd,
            } => format!(
                "💰 Strategy {}: distributed {} tokens ({} USD)",
                strategy_id,
                format_wei(*amount),
                format_wei(*usd)
            ),
            NotificationEvent::BoostingUnderfunded {
                strategy_id,
                required,
                available,
            } => format!(
                "⚠️ Strategy {}: boosting needs {} tokens, wallet holds {}",
                strategy_id,
                format_wei(*required),
                format_wei(*available)
            ),
            NotificationEvent::BoostingToppedUp {
                strategy_id,
                amount,
                blocks,
            } => format!(
                "🚀 Strategy {}: boosted {} tokens over {} blocks",
                strategy_id,
                format_wei(*amount),
                blocks
            ),
            NotificationEvent::JobFailed {
                strategy_id,
                kind,
                error,
            } => format!("🚨 Strategy {}: {} failed: {}", strategy_id, kind, error),
            NotificationEvent::LowAdminBalance {
                strategy_id,
                wallet,
                balance,
                minimum,
            } => format!(
                "⛽ Strategy {}: admin wallet {} balance {} below {}",
                strategy_id,
                wallet,
                format_wei(*balance),
                format_wei(*minimum)
            ),
            NotificationEvent::LowBoostingBalance {
                strategy_id,
                wallet,
                balance,
                minimum,
            } => format!(
                "⛽ Strategy {}: boosting wallet {} balance {} below {}",
                strategy_id,
                wallet,
                format_wei(*balance),
                format_wei(*minimum)
            ),
            NotificationEvent::OperationsShutdown { count } => {
                format!("🛑 {} running operation(s) interrupted by shutdown", count)
            }
        }
    }
}

/// Notification transport trait
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// Send a notification
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()>;

    /// Check if the service is enabled
    fn is_enabled(&self) -> bool;
}

/// Fire-and-forget alert sink used by the engine; delivery errors never surface
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: NotificationEvent);
}

/// Composite notifier that can send to multiple services
pub struct CompositeNotifier {
    services: Vec<Arc<dyn NotificationService>>,
    metrics: Option<Arc<MetricsState>>,
}

impl CompositeNotifier {
    /// Create a new composite notifier
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            metrics: None,
        }
    }

    /// Count delivery failures in `lbf_notifications_failed_total`
    pub fn with_metrics(mut self, metrics: Arc<MetricsState>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Add a notification service
    pub fn add_service(&mut self, service: Arc<dyn NotificationService>) {
        self.services.push(service);
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

impl Default for CompositeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NotificationSink for CompositeNotifier {
    /// Send notification to all enabled services concurrently
    async fn notify(&self, event: NotificationEvent) {
        let sends = self
            .services
            .iter()
            .filter(|service| service.is_enabled())
            .map(|service| service.notify(event.clone()));

        for result in join_all(sends).await {
            if let Err(e) = result {
                if let Some(metrics) = &self.metrics {
                    metrics.notifications_failed.inc();
                }
                tracing::error!(
                    error = %e,
                    template = event.template_id(),
                    level = %event.level(),
                    "Failed to send notification"
                );
            }
        }
    }
}

/// Per-key send throttle shared by the transports
pub(crate) struct RateLimiter {
    last_sent: RwLock<HashMap<String, Instant>>,
    interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(interval_seconds: u64) -> Self {
        Self {
            last_sent: RwLock::new(HashMap::new()),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    pub(crate) fn can_send(&self, key: &str) -> bool {
        let last_sent = self.last_sent.read();
        match last_sent.get(key) {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    pub(crate) fn mark_sent(&self, key: &str) {
        let mut last_sent = self.last_sent.write();
        last_sent.insert(key.to_string(), Instant::now());
    }

    /// Rate limit key: one bucket per template and strategy
    pub(crate) fn get_key(event: &NotificationEvent) -> String {
        match event.strategy_id() {
            Some(id) => format!("{}:{}", event.template_id(), id),
            None => event.template_id().to_string(),
        }
    }
}
