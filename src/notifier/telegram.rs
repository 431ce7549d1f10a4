use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::notifier::Notifier;
use crate::utils::error::{AppError, Result};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const MAX_RETRIES: usize = 3;

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Sends alerts through the Telegram Bot API with Markdown formatting.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        Self::with_api_base(config, TELEGRAM_API_BASE)
    }

    /// Point the notifier at an alternate API host, used by tests.
    pub fn with_api_base(config: &TelegramConfig, api_base: &str) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(AppError::Validation(
                "telegram bot_token is not configured".to_string(),
            ));
        }
        if config.chat_id.is_empty() {
            return Err(AppError::Validation(
                "telegram chat_id is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    /// Verify the token against the getMe endpoint.
    pub async fn test_connection(&self) -> Result<String> {
        let url = format!("{}/bot{}/getMe", self.api_base, self.bot_token);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body: TelegramResponse = response.json().await?;

        if !body.ok {
            return Err(AppError::Notification(format!(
                "getMe failed ({}): {}",
                status,
                body.description.unwrap_or_else(|| "no description".to_string())
            )));
        }
        Ok("telegram connection ok".to_string())
    }

    async fn send_once(&self, message: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        let response = self.client.post(&url).json(&payload).send().await?;
        let status = response.status();
        let body: TelegramResponse = response.json().await?;

        if !body.ok {
            return Err(AppError::Notification(format!(
                "sendMessage failed ({}): {}",
                status,
                body.description.unwrap_or_else(|| "no description".to_string())
            )));
        }

        debug!(chat_id = %self.chat_id, "telegram message delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let strategy = ExponentialBackoff::from_millis(500)
            .map(jitter)
            .take(MAX_RETRIES);

        Retry::spawn(strategy, || async {
            self.send_once(message).await.map_err(|e| {
                warn!(error = %e, "telegram send attempt failed, retrying");
                e
            })
        })
        .await
    }
}
