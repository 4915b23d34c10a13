//! Telegram notification service
//!
//! Sends each event to the recipient's chat via the Bot API.

use super::{AlertLevel, NotificationEvent, Notifier};
use crate::config::TelegramNotificationConfig;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Telegram notification service
pub struct TelegramNotifier {
    /// Bot token from @BotFather
    bot_token: SecretString,
    /// Bot API base URL
    api_url: String,
    /// HTTP client
    client: reqwest::Client,
    enabled: bool,
}

impl TelegramNotifier {
    /// Create a new Telegram notifier
    pub fn new(config: &TelegramNotificationConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            bot_token: config
                .bot_token
                .clone()
                .unwrap_or_else(|| SecretString::new(String::new())),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            client,
            enabled: config.enabled,
        })
    }

    /// Send a message to one chat
    async fn send_message(&self, chat_id: &str, text: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_url,
            self.bot_token.expose_secret()
        );

        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
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
    fn format_with_level(level: AlertLevel, message: &str) -> String {
        match level {
            AlertLevel::Important => format!("IMPORTANT\n\n{}", message),
            AlertLevel::Info => message.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, recipient: &str, event: &NotificationEvent) -> anyhow::Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let level = event.level();
        let formatted = Self::format_with_level(level, &event.format_message());

        self.send_message(recipient, &formatted).await?;

        tracing::info!(
            level = %level,
            kind = event.kind(),
            "Sent Telegram notification"
        );

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled && !self.bot_token.expose_secret().is_empty()
    }
}
