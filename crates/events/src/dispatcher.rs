//! Background task relaying selected bus events to a notifier.
//!
//! Delivery is fire-and-forget: a failed message is logged and dropped,
//! and nothing that published the event is affected.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::{event_types, PlatformEvent};
use crate::delivery::Notifier;

/// Subscribes to the bus and forwards notification-worthy events.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Run until the bus closes or `cancel` fires.
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification dispatcher cancelled");
                    break;
                }
                received = receiver.recv() => received,
            };

            match event {
                Ok(event) => self.dispatch(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification dispatcher lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification dispatcher shutting down");
                    break;
                }
            }
        }
    }

    async fn dispatch(&self, event: &PlatformEvent) {
        let Some(message) = render_message(event) else {
            return;
        };
        if let Err(e) = self.notifier.notify(&message).await {
            tracing::error!(
                error = %e,
                event_type = %event.event_type,
                "Failed to deliver notification"
            );
        }
    }
}

/// Render the operator message for an event, or `None` if the event is not
/// one operators are notified about.
pub fn render_message(event: &PlatformEvent) -> Option<String> {
    match event.event_type.as_str() {
        event_types::PAYMENT_COMPLETED => {
            let field = |key: &str| {
                event.payload[key]
                    .as_str()
                    .map(escape_html)
                    .unwrap_or_else(|| "-".to_string())
            };
            let amount = event.payload["amount"]
                .as_i64()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string());
            Some(format!(
                "<b>New lifetime access purchase</b>\n\nUser: {}\nAmount: {} {}\nReference: <code>{}</code>",
                field("email"),
                field("currency"),
                amount,
                field("external_id"),
            ))
        }
        _ => None,
    }
}

/// Escape the characters Telegram's HTML parse mode treats as markup.
fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
