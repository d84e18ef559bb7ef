//! Configuration management for the LBF Operator
//!
//! Loads configuration from YAML files and environment variables.
//! Environment variables override YAML values.

use crate::chain::GatewayConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Health/metrics server
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Chain gateway connection
    pub chain: GatewayConfig,
    /// Job scheduler tuning
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Multicall submission
    #[serde(default)]
    pub multicall: MulticallConfig,
    /// Notification configuration
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/lbf_operator.db")
}

fn default_max_connections() -> u32 {
    5
}

/// Scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrent operation jobs across all strategies
    #[serde(default = "default_core_concurrency")]
    pub core_concurrency: usize,
    /// Concurrent health-check jobs across all strategies
    #[serde(default = "default_cron_concurrency")]
    pub cron_concurrency: usize,
    /// Finished records without transactions older than this are deleted
    #[serde(default = "default_orphan_max_age")]
    pub orphan_max_age_secs: u64,
    /// How often the orphan sweep runs
    #[serde(default = "default_orphan_sweep_interval")]
    pub orphan_sweep_interval_secs: u64,
}

fn default_core_concurrency() -> usize {
    4
}

fn default_cron_concurrency() -> usize {
    2
}

fn default_orphan_max_age() -> u64 {
    86_400
}

fn default_orphan_sweep_interval() -> u64 {
    3_600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            core_concurrency: default_core_concurrency(),
            cron_concurrency: default_cron_concurrency(),
            orphan_max_age_secs: default_orphan_max_age(),
            orphan_sweep_interval_secs: default_orphan_sweep_interval(),
        }
    }
}

/// Multicall configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MulticallConfig {
    /// Combine same-target same-method calls into one `multicall` transaction
    #[serde(default)]
    pub batching_enabled: bool,
}

/// Notification configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    /// Telegram notification settings
    #[serde(default)]
    pub telegram: TelegramNotificationConfig,
    /// Slack notification settings
    #[serde(default)]
    pub slack: SlackNotificationConfig,
}

/// Telegram-specific notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramNotificationConfig {
    /// Whether Telegram notifications are enabled
    #[serde(default)]
    pub enabled: bool,
    /// Bot token (from environment: LBF_NOTIFICATIONS__TELEGRAM__BOT_TOKEN)
    #[serde(default)]
    pub bot_token: String,
    /// Chat ID to send notifications to
    #[serde(default)]
    pub chat_id: String,
    /// Rate limit in seconds between similar notifications
    #[serde(default = "default_notification_rate_limit")]
    pub rate_limit_seconds: u64,
}

fn default_notification_rate_limit() -> u64 {
    60
}

impl Default for TelegramNotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            rate_limit_seconds: default_notification_rate_limit(),
        }
    }
}

/// Slack-specific notification configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackNotificationConfig {
    /// Whether Slack notifications are enabled
    #[serde(default)]
    pub enabled: bool,
    /// Incoming webhook URL
    #[serde(default)]
    pub webhook_url: String,
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LBF_*)
    /// 2. config/config.yaml (if exists)
    /// 3. config.yaml (if exists)
    /// 4. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/lbf_operator.db")?
            .set_default("database.max_connections", 5)?
            .set_default("chain.url", "http://127.0.0.1:8600")?
            .set_default("chain.timeout_secs", 120)?
            .set_default("chain.chain_id", 56)?
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/config").required(false))
            // LBF_SCHEDULER__CORE_CONCURRENCY=8 -> scheduler.core_concurrency = 8
            .add_source(
                Environment::with_prefix("LBF")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.url.is_empty() {
            return Err(ConfigError::Message("Chain gateway URL must be set".to_string()));
        }

        if self.scheduler.core_concurrency == 0 || self.scheduler.cron_concurrency == 0 {
            return Err(ConfigError::Message(
                "Scheduler concurrency must be at least 1".to_string(),
            ));
        }

        if self.scheduler.orphan_max_age_secs == 0 || self.scheduler.orphan_sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "Orphan sweep age and interval must be greater than zero".to_string(),
            ));
        }

        let telegram = &self.notifications.telegram;
        if telegram.enabled && (telegram.bot_token.is_empty() || telegram.chat_id.is_empty()) {
            return Err(ConfigError::Message(
                "Telegram is enabled but bot_token/chat_id are missing".to_string(),
            ));
        }

        let slack = &self.notifications.slack;
        if slack.enabled && slack.webhook_url.is_empty() {
            return Err(ConfigError::Message(
                "Slack is enabled but webhook_url is missing".to_string(),
            ));
        }

        Ok(())
    }
}
