//! External delivery channels for platform notifications.

pub mod telegram;

use async_trait::async_trait;

/// A channel that can deliver a rendered notification message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), telegram::TelegramError>;
}
