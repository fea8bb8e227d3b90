//! Subscription model and activation DTOs.

use dailywatch_core::error::CoreError;
use dailywatch_core::subscription::SubscriptionStatus;
use dailywatch_core::types::{DbId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

use crate::models::payment_attempt::PaymentAttempt;

/// A row from the `subscriptions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscription {
    pub id: DbId,
    pub user_id: UserId,
    pub status: String,
    pub payment_id: Option<String>,
    pub paid_at: Option<Timestamp>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    pub fn subscription_status(&self) -> Result<SubscriptionStatus, CoreError> {
        self.status.parse()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.subscription_status(), Ok(SubscriptionStatus::Active))
    }
}

/// Request to settle a payment attempt and activate its owner.
#[derive(Debug, Clone)]
pub struct Activation {
    pub external_id: String,
    pub paid_at: Timestamp,
    pub ip_address: Option<String>,
}

/// What an activation call did.
#[derive(Debug, Clone)]
pub enum ActivationOutcome {
    /// This call moved the attempt to `paid` and activated the subscription.
    Activated {
        attempt: PaymentAttempt,
        subscription: Subscription,
    },
    /// The attempt was already paid by an earlier call. Nothing was written.
    AlreadyPaid {
        attempt: PaymentAttempt,
        subscription: Option<Subscription>,
    },
    /// The attempt is `failed` or `expired` and can never be paid.
    Unpayable(PaymentAttempt),
    /// No attempt has this external id.
    NotFound,
}
