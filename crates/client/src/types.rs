//! Wire types of the access API as seen by a client.

use dailywatch_core::payment::PaymentStatus;
use dailywatch_core::subscription::SubscriptionStatus;
use dailywatch_core::trial::TrialPhase;
use dailywatch_core::types::{Timestamp, UserId};
use dailywatch_core::video::ResolvedVideo;
use serde::{Deserialize, Serialize};

/// `{ data }` envelope used by most endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct Data<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrialSessionView {
    pub session_token: String,
    pub started_at: Timestamp,
    pub expires_at: Timestamp,
    pub remaining_secs: i64,
    pub state: TrialPhase,
    pub video_count: i32,
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTrial {
    pub session_id: String,
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Subscription,
    Trial,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchGrant {
    #[serde(flatten)]
    pub video: ResolvedVideo,
    pub access: AccessKind,
    #[serde(default)]
    pub remaining_secs: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    pub user_id: UserId,
    pub email: String,
    pub amount: i64,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub external_id: String,
    pub invoice_id: String,
    pub invoice_url: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VerifyOutcome {
    pub success: bool,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSummary {
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub paid_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionView {
    pub subscription: Option<SubscriptionSummary>,
    pub has_access: bool,
}
