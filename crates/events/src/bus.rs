//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` across the application.
//! Publishing never blocks and never fails the caller.

use chrono::{DateTime, Utc};
use dailywatch_core::types::UserId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event names published by the service.
pub mod event_types {
    /// A payment attempt moved to `paid` and the subscription was activated.
    pub const PAYMENT_COMPLETED: &str = "payment.completed";
    /// A trial session was blocked by the abuse check.
    pub const TRIAL_BLOCKED: &str = "trial.blocked";
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event that occurred in the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"payment.completed"`.
    pub event_type: String,

    /// Source entity kind (e.g. `"payment_attempt"`).
    pub source_entity_type: Option<String>,

    /// Natural key of the source entity (external id, session token).
    pub source_entity_key: Option<String>,

    /// User the event concerns, when known.
    pub actor_user_id: Option<UserId>,

    /// Event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_key: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, key: impl Into<String>) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_key = Some(key.into());
        self
    }

    pub fn with_actor(mut self, user_id: UserId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped if none.
    pub fn publish(&self, event: PlatformEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_enriched_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let user = uuid::Uuid::new_v4();

        bus.publish(
            PlatformEvent::new(event_types::PAYMENT_COMPLETED)
                .with_source("payment_attempt", "dailywatch_x_1")
                .with_actor(user)
                .with_payload(serde_json::json!({"amount": 99})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "payment.completed");
        assert_eq!(received.source_entity_key.as_deref(), Some("dailywatch_x_1"));
        assert_eq!(received.actor_user_id, Some(user));
        assert_eq!(received.payload["amount"], 99);
    }

    #[tokio::test]
    async fn every_subscriber_gets_a_copy() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::new(event_types::TRIAL_BLOCKED));

        assert_eq!(rx1.recv().await.unwrap().event_type, "trial.blocked");
        assert_eq!(rx2.recv().await.unwrap().event_type, "trial.blocked");
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        EventBus::default().publish(PlatformEvent::new("orphan"));
    }
}
