//! Storage seams used by the trial and billing services.
//!
//! Every operation that must be atomic (the abuse check, payment
//! activation, attempt status changes) is a single trait method, so each
//! implementation can provide the atomicity in its own way.

mod memory;
mod pg;

use async_trait::async_trait;
use dailywatch_core::payment::PaymentStatus;
use dailywatch_core::types::{Timestamp, UserId};

use crate::models::activity_log::{ActivityLog, CreateActivityLog};
use crate::models::payment_attempt::{CreatePaymentAttempt, PaymentAttempt};
use crate::models::subscription::{Activation, ActivationOutcome, Subscription};
use crate::models::trial_session::{
    TrialSession, UpdateTrialSession, ValidationCheck, ValidationRecord,
};

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Errors returned by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for anonymous trial sessions.
#[async_trait]
pub trait TrialStore: Send + Sync {
    /// Return the session for `session_token`, or start a new one at `now`
    /// when the token is absent or unknown.
    async fn get_or_create(
        &self,
        session_token: Option<&str>,
        now: Timestamp,
    ) -> Result<TrialSession, StoreError>;

    async fn find(&self, session_token: &str) -> Result<Option<TrialSession>, StoreError>;

    /// Merge a partial update. `None` if the token is unknown.
    async fn update(
        &self,
        session_token: &str,
        input: &UpdateTrialSession,
    ) -> Result<Option<TrialSession>, StoreError>;

    /// Count one more watched video. `false` if the token is unknown.
    async fn increment_video_count(&self, session_token: &str) -> Result<bool, StoreError>;

    /// Record the submitted identity on a session and block it if another
    /// session with the same fingerprint or IP had a recent trial.
    ///
    /// The lookup and the write happen atomically with respect to other
    /// validations sharing either identity. `None` if the token is unknown.
    async fn record_validation(
        &self,
        check: &ValidationCheck,
    ) -> Result<Option<ValidationRecord>, StoreError>;
}

/// Persistence for payment attempts, subscriptions and the activity log.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn insert_attempt(
        &self,
        input: &CreatePaymentAttempt,
    ) -> Result<PaymentAttempt, StoreError>;

    async fn find_attempt(&self, external_id: &str) -> Result<Option<PaymentAttempt>, StoreError>;

    /// Move an attempt to `to` if its current status allows it.
    ///
    /// `None` if the attempt does not exist or is already past `to`.
    async fn transition_attempt(
        &self,
        external_id: &str,
        to: PaymentStatus,
    ) -> Result<Option<PaymentAttempt>, StoreError>;

    /// Settle an attempt as paid, activate the owner's subscription and
    /// append one `payment_completed` log entry, all or nothing.
    ///
    /// Exactly one concurrent caller per attempt gets
    /// [`ActivationOutcome::Activated`].
    async fn activate(&self, activation: &Activation) -> Result<ActivationOutcome, StoreError>;

    async fn find_subscription(&self, user_id: UserId)
        -> Result<Option<Subscription>, StoreError>;

    /// Create a `pending` subscription if the user has none.
    async fn ensure_pending_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Subscription, StoreError>;

    async fn append_activity(&self, input: &CreateActivityLog) -> Result<ActivityLog, StoreError>;
}

/// The audit entry written alongside a successful activation.
pub(crate) fn payment_completed_log(
    attempt: &PaymentAttempt,
    activation: &Activation,
) -> CreateActivityLog {
    CreateActivityLog {
        user_id: Some(attempt.user_id),
        action: dailywatch_core::payment::actions::PAYMENT_COMPLETED.to_string(),
        details: Some(serde_json::json!({
            "external_id": attempt.external_id,
            "amount": attempt.amount,
            "currency": attempt.currency,
        })),
        ip_address: activation.ip_address.clone(),
    }
}

/// Classify an attempt that lost (or never entered) the paid transition.
pub(crate) fn settled_outcome(
    attempt: PaymentAttempt,
    subscription: Option<Subscription>,
) -> ActivationOutcome {
    match attempt.payment_status() {
        Ok(PaymentStatus::Paid) => ActivationOutcome::AlreadyPaid {
            attempt,
            subscription,
        },
        _ => ActivationOutcome::Unpayable(attempt),
    }
}
