//! Slack notification service
//!
//! Posts alerts to a Slack incoming webhook.

use super::{AlertLevel, NotificationEvent, NotificationService};
use crate::config::SlackNotificationConfig;
use std::time::Duration;

/// Slack notification service
pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
    enabled: bool,
}

impl SlackNotifier {
    pub fn new(config: &SlackNotificationConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            webhook_url: config.webhook_url.clone(),
            client,
            enabled: config.enabled,
        })
    }

    fn payload(event: &NotificationEvent) -> serde_json::Value {
        let color = match event.level() {
            AlertLevel::Critical => "#ff0000",
            AlertLevel::Important => "#ffaa00",
            AlertLevel::Info => "#0099ff",
        };

        serde_json::json!({
            "attachments": [{
                "color": color,
                "title": format!("{} {}", event.level(), event.template_id()),
                "text": event.format_message(),
                "ts": chrono::Utc::now().timestamp(),
            }]
        })
    }
}

#[async_trait::async_trait]
impl NotificationService for SlackNotifier {
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(&event))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Slack API error: {} - {}", status, body);
        }

        tracing::info!(
            level = %event.level(),
            template = event.template_id(),
            "Sent Slack notification"
        );

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled && !self.webhook_url.is_empty()
    }
}
