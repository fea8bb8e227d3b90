//! Repository for the `subscriptions` table.

use dailywatch_core::subscription::SubscriptionStatus;
use dailywatch_core::types::UserId;
use sqlx::{PgExecutor, PgPool};

use crate::models::payment_attempt::PaymentAttempt;
use crate::models::subscription::Subscription;

const COLUMNS: &str = "id, user_id, status, payment_id, paid_at, amount, currency, \
                       created_at, updated_at";

pub struct SubscriptionRepo;

impl SubscriptionRepo {
    pub async fn find_by_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: UserId,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM subscriptions WHERE user_id = $1");
        sqlx::query_as::<_, Subscription>(&query)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Create a `pending` row for the user if none exists. Never touches an
    /// existing row, so an active subscription is never downgraded.
    pub async fn ensure_pending(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Subscription, sqlx::Error> {
        let query = format!(
            "INSERT INTO subscriptions (user_id, status) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(user_id)
            .bind(SubscriptionStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    /// Set the owner's subscription to active for a paid attempt.
    ///
    /// A set-to-value upsert: repeating it with the same attempt is harmless.
    pub async fn activate<'e>(
        executor: impl PgExecutor<'e>,
        attempt: &PaymentAttempt,
    ) -> Result<Subscription, sqlx::Error> {
        let query = format!(
            "INSERT INTO subscriptions (user_id, status, payment_id, paid_at, amount, currency)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id) DO UPDATE SET
                status = EXCLUDED.status,
                payment_id = EXCLUDED.payment_id,
                paid_at = EXCLUDED.paid_at,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(attempt.user_id)
            .bind(SubscriptionStatus::Active.as_str())
            .bind(&attempt.external_id)
            .bind(attempt.paid_at)
            .bind(attempt.amount)
            .bind(&attempt.currency)
            .fetch_one(executor)
            .await
    }
}
