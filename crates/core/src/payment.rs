//! Payment attempt status machine, external-id format and audit constants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Timestamp, UserId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Prefix of every external id sent to the payment provider.
pub const EXTERNAL_ID_PREFIX: &str = "dailywatch";

/// Currency used when none is configured.
pub const DEFAULT_CURRENCY: &str = "PHP";

/// Price of lifetime access in whole currency units.
pub const LIFETIME_PRICE: i64 = 49;

/// How long a hosted invoice stays payable.
pub const INVOICE_DURATION_SECS: i64 = 86_400;

/// Generic message shown when the provider rejects an invoice request.
pub const INVOICE_FAILED_MESSAGE: &str = "Failed to create invoice. Please try again.";

/// Activity-log action names written by the billing flow.
pub mod actions {
    pub const PAYMENT_COMPLETED: &str = "payment_completed";
    pub const INVOICE_CREATED: &str = "invoice_created";
    pub const INVOICE_FAILED: &str = "invoice_failed";
    pub const TRIAL_BLOCKED: &str = "trial_blocked";
}

// ---------------------------------------------------------------------------
// PaymentStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a payment attempt.
///
/// `created -> pending`, `created | pending -> paid | failed | expired`.
/// `paid`, `failed` and `expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Pending,
    Paid,
    Failed,
    Expired,
}

impl PaymentStatus {
    /// Statuses from which an attempt can still settle.
    pub const OPEN: [PaymentStatus; 2] = [PaymentStatus::Created, PaymentStatus::Pending];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentStatus::Paid | PaymentStatus::Failed | PaymentStatus::Expired
        )
    }

    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        match self {
            PaymentStatus::Created => next != PaymentStatus::Created,
            PaymentStatus::Pending => next.is_terminal(),
            _ => false,
        }
    }

    /// Every status that may legally move to `next`.
    pub fn sources_for(next: PaymentStatus) -> Vec<PaymentStatus> {
        [
            PaymentStatus::Created,
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Expired,
        ]
        .into_iter()
        .filter(|s| s.can_transition_to(next))
        .collect()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(PaymentStatus::Created),
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "expired" => Ok(PaymentStatus::Expired),
            other => Err(CoreError::Internal(format!(
                "unknown payment status '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// External ids
// ---------------------------------------------------------------------------

/// Build the provider correlation id for an attempt made by `user_id` at `now`.
///
/// One id per attempt, not per user, so an abandoned invoice never blocks a
/// retry.
pub fn external_id_for(user_id: UserId, now: Timestamp) -> String {
    format!(
        "{EXTERNAL_ID_PREFIX}_{user_id}_{}",
        now.timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Created,
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Expired,
    ];

    #[test]
    fn terminal_statuses_never_transition() {
        for from in [PaymentStatus::Paid, PaymentStatus::Failed, PaymentStatus::Expired] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn created_moves_forward_only() {
        assert!(PaymentStatus::Created.can_transition_to(PaymentStatus::Pending));
        assert!(PaymentStatus::Created.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Created.can_transition_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Created.can_transition_to(PaymentStatus::Expired));
        assert!(!PaymentStatus::Created.can_transition_to(PaymentStatus::Created));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Created));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Pending));
    }

    #[test]
    fn sources_for_paid_are_open_statuses() {
        assert_eq!(PaymentStatus::sources_for(PaymentStatus::Paid), PaymentStatus::OPEN.to_vec());
        assert_eq!(
            PaymentStatus::sources_for(PaymentStatus::Pending),
            vec![PaymentStatus::Created]
        );
    }

    #[test]
    fn status_string_round_trip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("settled".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn external_id_is_deterministic_and_traceable() {
        let user = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 5, 4, 3, 2, 1).unwrap();
        let id = external_id_for(user, at);
        assert_eq!(id, external_id_for(user, at));
        assert_eq!(id, format!("dailywatch_{user}_{}", at.timestamp_millis()));
    }

    #[test]
    fn retries_get_new_external_ids() {
        let user = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 5, 4, 3, 2, 1).unwrap();
        assert_ne!(
            external_id_for(user, at),
            external_id_for(user, at + chrono::Duration::milliseconds(1))
        );
    }
}
