//! Headless client SDK for the DailyWatch access API.
//!
//! Carries the pieces that run next to the player: the typed [`ApiClient`],
//! a [`TokenStore`] for the trial session token, the [`TrialClock`]
//! countdown, and [`TrialStarter`] which ties them together.

pub mod api;
pub mod clock;
pub mod error;
pub mod session;
pub mod token_store;
pub mod types;

pub use api::ApiClient;
pub use clock::{ClockState, TrialClock};
pub use error::ClientError;
pub use session::{TrialStart, TrialStarter};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
