//! Telegram notification service
//!
//! Sends alerts via Telegram Bot API with rate limiting to prevent spam.

use super::{AlertLevel, NotificationEvent, NotificationService, RateLimiter};
use crate::config::TelegramNotificationConfig;
use std::time::Duration;

/// Telegram notification service
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
    enabled: bool,
    rate_limiter: RateLimiter,
}

impl TelegramNotifier {
    /// Create a new Telegram notifier
    pub fn new(config: &TelegramNotificationConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            client,
            enabled: config.enabled,
            rate_limiter: RateLimiter::new(config.rate_limit_seconds),
        })
    }

    /// Send a message to Telegram
    async fn send_message(&self, text: &str) -> anyhow::Result<()> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );

        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error: {} - {}", status, body);
        }

        Ok(())
    }

    /// Format message with level prefix
    fn format_with_level(&self, level: AlertLevel, message: &str) -> String {
        let level_prefix = match level {
            AlertLevel::Critical => "🔴 <b>CRITICAL</b>",
            AlertLevel::Important => "🟡 <b>IMPORTANT</b>",
            AlertLevel::Info => "🔵 <b>INFO</b>",
        };

        format!("{}\n\n{}", level_prefix, message)
    }
}

#[async_trait::async_trait]
impl NotificationService for TelegramNotifier {
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        // Critical alerts bypass the rate limit
        let rate_key = RateLimiter::get_key(&event);
        if event.level() != AlertLevel::Critical && !self.rate_limiter.can_send(&rate_key) {
            tracing::debug!(key = %rate_key, "Rate limited, skipping notification");
            return Ok(());
        }

        let level = event.level();
        let formatted = self.format_with_level(level, &event.format_message());

        self.send_message(&formatted).await?;
        self.rate_limiter.mark_sent(&rate_key);

        tracing::info!(
            level = %level,
            template = event.template_id(),
            "Sent Telegram notification"
        );

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled && !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}
