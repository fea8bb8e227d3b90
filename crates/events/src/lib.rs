//! DailyWatch event bus and notification infrastructure.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the domain event envelope.
//! - [`delivery`]: external notification channels (Telegram).
//! - [`NotificationDispatcher`]: background task relaying selected events
//!   to a [`delivery::Notifier`].

pub mod bus;
pub mod delivery;
pub mod dispatcher;

pub use bus::{event_types, EventBus, PlatformEvent};
pub use delivery::telegram::{TelegramConfig, TelegramDelivery};
pub use delivery::Notifier;
pub use dispatcher::NotificationDispatcher;
