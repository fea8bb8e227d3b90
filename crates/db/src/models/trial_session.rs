//! Trial session model and DTOs.

use dailywatch_core::trial::{self, TrialPhase};
use dailywatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `trial_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrialSession {
    pub id: DbId,
    pub session_token: String,
    pub fingerprint: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub started_at: Timestamp,
    pub expires_at: Timestamp,
    pub video_count: i32,
    pub is_blocked: bool,
    /// First time the session passed through the abuse check.
    pub validated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TrialSession {
    pub fn phase(&self, now: Timestamp) -> TrialPhase {
        TrialPhase::for_session(
            self.is_blocked,
            self.validated_at.is_some(),
            self.expires_at,
            now,
        )
    }

    pub fn remaining_secs(&self, now: Timestamp) -> i64 {
        trial::remaining_secs(self.expires_at, now)
    }
}

/// DTO for inserting a fresh session.
#[derive(Debug, Clone)]
pub struct CreateTrialSession {
    pub session_token: String,
    pub started_at: Timestamp,
}

impl CreateTrialSession {
    pub fn expires_at(&self) -> Timestamp {
        trial::expiry_for(self.started_at)
    }
}

/// Partial update keyed by session token.
///
/// `None` leaves a column unchanged. `block` can only set the flag, and
/// `validated_at` only fills an empty column.
#[derive(Debug, Clone, Default)]
pub struct UpdateTrialSession {
    pub fingerprint: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub block: bool,
    pub validated_at: Option<Timestamp>,
}

/// Input to the atomic abuse check.
#[derive(Debug, Clone)]
pub struct ValidationCheck {
    pub session_token: String,
    pub fingerprint: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// When the check runs.
    pub checked_at: Timestamp,
}

impl ValidationCheck {
    /// Prior sessions expiring after this instant count as recent.
    pub fn recent_since(&self) -> Timestamp {
        trial::recent_since(self.checked_at)
    }
}

/// Result of the atomic abuse check.
#[derive(Debug, Clone)]
pub struct ValidationRecord {
    /// The session after fingerprint, IP and block flag were written.
    pub session: TrialSession,
    /// Another session with the same fingerprint or IP had a recent trial.
    pub prior_trial_found: bool,
    /// This call is the one that set the block flag.
    pub newly_blocked: bool,
}
