//! Telegram Bot API delivery with exponential-backoff retry.
//!
//! [`TelegramDelivery`] posts an HTML-formatted message to a single chat via
//! `sendMessage`. Failed attempts are retried with backoff (1 s, 2 s, 4 s).

use std::time::Duration;

use async_trait::async_trait;

use super::Notifier;

const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Telegram bot settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Base URL of the Bot API. Overridable for tests.
    pub api_base: String,
}

impl TelegramConfig {
    /// Load from `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID` and
    /// `NOTIFICATIONS_ENABLED`.
    ///
    /// Returns `None` when notifications are disabled or either credential
    /// is missing.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let enabled = lookup("NOTIFICATIONS_ENABLED")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(true);
        if !enabled {
            return None;
        }
        let bot_token = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.trim().is_empty())?;
        let chat_id = lookup("TELEGRAM_CHAT_ID").filter(|v| !v.trim().is_empty())?;
        Some(Self {
            bot_token,
            chat_id,
            api_base: lookup("TELEGRAM_API_URL").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// Network, DNS or timeout failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The Bot API answered with a non-2xx status.
    #[error("Telegram returned HTTP {status}: {description}")]
    Api { status: u16, description: String },
}

// ---------------------------------------------------------------------------
// TelegramDelivery
// ---------------------------------------------------------------------------

/// Sends notification messages to one Telegram chat.
pub struct TelegramDelivery {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramDelivery {
    pub fn new(config: TelegramConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, config }
    }

    fn send_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    /// Deliver a message, retrying with backoff before giving up.
    pub async fn deliver(&self, message: &str) -> Result<(), TelegramError> {
        let body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": message,
            "parse_mode": "HTML",
        });

        let mut last_err: Option<TelegramError> = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(&body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Telegram delivery attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        match self.try_send(&body).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "Telegram delivery failed after all retries");
                Err(last_err.unwrap_or(e))
            }
        }
    }

    async fn try_send(&self, body: &serde_json::Value) -> Result<(), TelegramError> {
        let response = self.client.post(self.send_url()).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let description = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v["description"].as_str().map(str::to_string))
            .unwrap_or_else(|| "Failed to send Telegram message".to_string());
        Err(TelegramError::Api {
            status: status.as_u16(),
            description,
        })
    }
}

#[async_trait]
impl Notifier for TelegramDelivery {
    async fn notify(&self, message: &str) -> Result<(), TelegramError> {
        self.deliver(message).await
    }
}
