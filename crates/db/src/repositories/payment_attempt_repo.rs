//! Repository for the `payment_attempts` table.

use dailywatch_core::payment::PaymentStatus;
use dailywatch_core::types::Timestamp;
use sqlx::{PgExecutor, PgPool};

use crate::models::payment_attempt::{CreatePaymentAttempt, PaymentAttempt};

const COLUMNS: &str = "id, external_id, user_id, user_email, amount, currency, description, \
                       status, invoice_id, invoice_url, ip_address, raw_provider_response, \
                       paid_at, created_at, updated_at";

/// Provides insert and compare-and-set operations for payment attempts.
pub struct PaymentAttemptRepo;

impl PaymentAttemptRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreatePaymentAttempt,
    ) -> Result<PaymentAttempt, sqlx::Error> {
        let query = format!(
            "INSERT INTO payment_attempts
                (external_id, user_id, user_email, amount, currency, description, status,
                 invoice_id, invoice_url, ip_address, raw_provider_response)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PaymentAttempt>(&query)
            .bind(&input.external_id)
            .bind(input.user_id)
            .bind(&input.user_email)
            .bind(input.amount)
            .bind(&input.currency)
            .bind(&input.description)
            .bind(input.status.as_str())
            .bind(&input.invoice_id)
            .bind(&input.invoice_url)
            .bind(&input.ip_address)
            .bind(&input.raw_provider_response)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_external_id<'e>(
        executor: impl PgExecutor<'e>,
        external_id: &str,
    ) -> Result<Option<PaymentAttempt>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payment_attempts WHERE external_id = $1");
        sqlx::query_as::<_, PaymentAttempt>(&query)
            .bind(external_id)
            .fetch_optional(executor)
            .await
    }

    /// Move an attempt to `to` only if its current status may legally do so.
    ///
    /// Returns `None` when the attempt does not exist or lost the race.
    pub async fn transition<'e>(
        executor: impl PgExecutor<'e>,
        external_id: &str,
        to: PaymentStatus,
        paid_at: Option<Timestamp>,
    ) -> Result<Option<PaymentAttempt>, sqlx::Error> {
        let sources: Vec<String> = PaymentStatus::sources_for(to)
            .into_iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let query = format!(
            "UPDATE payment_attempts SET status = $2, paid_at = COALESCE($3, paid_at)
             WHERE external_id = $1 AND status = ANY($4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PaymentAttempt>(&query)
            .bind(external_id)
            .bind(to.as_str())
            .bind(paid_at)
            .bind(sources)
            .fetch_optional(executor)
            .await
    }
}
