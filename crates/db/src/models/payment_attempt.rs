//! Payment attempt (invoice log) model and DTOs.

use dailywatch_core::error::CoreError;
use dailywatch_core::payment::PaymentStatus;
use dailywatch_core::types::{DbId, Timestamp, UserId};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `payment_attempts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentAttempt {
    pub id: DbId,
    pub external_id: String,
    pub user_id: UserId,
    pub user_email: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub status: String,
    pub invoice_id: Option<String>,
    pub invoice_url: Option<String>,
    pub ip_address: Option<String>,
    /// Full provider payload, kept for operators only.
    #[serde(skip_serializing)]
    pub raw_provider_response: Option<serde_json::Value>,
    pub paid_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentAttempt {
    pub fn payment_status(&self) -> Result<PaymentStatus, CoreError> {
        self.status.parse()
    }

    /// Whether the attempt can still settle.
    pub fn is_open(&self) -> bool {
        self.payment_status()
            .is_ok_and(|s| PaymentStatus::OPEN.contains(&s))
    }
}

/// DTO for recording a new attempt.
#[derive(Debug, Clone)]
pub struct CreatePaymentAttempt {
    pub external_id: String,
    pub user_id: UserId,
    pub user_email: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub status: PaymentStatus,
    pub invoice_id: Option<String>,
    pub invoice_url: Option<String>,
    pub ip_address: Option<String>,
    pub raw_provider_response: Option<serde_json::Value>,
}
