//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Methods that only ever run alone take `&PgPool`; methods that also run
//! inside a transaction take any [`sqlx::PgExecutor`].

pub mod activity_log_repo;
pub mod payment_attempt_repo;
pub mod subscription_repo;
pub mod trial_session_repo;

pub use activity_log_repo::ActivityLogRepo;
pub use payment_attempt_repo::PaymentAttemptRepo;
pub use subscription_repo::SubscriptionRepo;
pub use trial_session_repo::TrialSessionRepo;
