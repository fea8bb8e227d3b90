//! Trial abuse check.
//!
//! A session is denied when another session with the same fingerprint or
//! IP had a trial that ended less than 24 hours ago. The check and the
//! write of the submitted identity are one atomic store operation.

use std::sync::Arc;

use dailywatch_core::clock::Clock;
use dailywatch_core::error::CoreError;
use dailywatch_core::fingerprint;
use dailywatch_core::payment::actions;
use dailywatch_core::trial::{self, FailurePolicy, TrialVerdict};
use dailywatch_db::models::activity_log::CreateActivityLog;
use dailywatch_db::models::trial_session::{ValidationCheck, ValidationRecord};
use dailywatch_db::{BillingStore, TrialStore};
use dailywatch_events::{event_types, EventBus, PlatformEvent};

use crate::error::AppError;
use crate::middleware::client_ip::normalize_ip;

/// Identity submitted for a trial session.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub session_token: String,
    pub fingerprint: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct TrialValidator {
    trials: Arc<dyn TrialStore>,
    billing: Arc<dyn BillingStore>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    policy: FailurePolicy,
}

impl TrialValidator {
    pub fn new(
        trials: Arc<dyn TrialStore>,
        billing: Arc<dyn BillingStore>,
        event_bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            trials,
            billing,
            event_bus,
            clock,
            policy,
        }
    }

    /// Decide whether the session may run its trial.
    ///
    /// Malformed input is a 400 and an unknown token a 404. Store failures
    /// resolve to the configured [`FailurePolicy`] verdict.
    pub async fn validate(&self, request: ValidationRequest) -> Result<TrialVerdict, AppError> {
        let session_token = request.session_token.trim();
        if session_token.is_empty() {
            return Err(CoreError::Validation("sessionId is required".into()).into());
        }
        let fingerprint = request.fingerprint.trim();
        if !fingerprint::is_acceptable(fingerprint) {
            return Err(CoreError::Validation("fingerprint is missing or malformed".into()).into());
        }

        let check = ValidationCheck {
            session_token: session_token.to_string(),
            fingerprint: fingerprint.to_string(),
            ip_address: normalize_ip(request.ip_address),
            user_agent: request.user_agent.filter(|ua| !ua.trim().is_empty()),
            checked_at: self.clock.now(),
        };

        let record = match self.trials.record_validation(&check).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(CoreError::not_found("Trial session", session_token).into()),
            Err(e) => {
                let verdict = self.policy.verdict();
                tracing::warn!(
                    error = %e,
                    session_token,
                    policy = %self.policy,
                    allowed = verdict.allowed,
                    "Trial store unavailable, applying failure policy"
                );
                return Ok(verdict);
            }
        };

        if !record.session.is_blocked {
            tracing::debug!(session_token, "Trial session validated");
            return Ok(TrialVerdict::allow());
        }

        if record.newly_blocked {
            self.record_block(&record).await;
        }
        Ok(TrialVerdict::deny(trial::REASON_TRIAL_USED))
    }

    /// Audit a fresh block. Failures are logged; the verdict stands.
    async fn record_block(&self, record: &ValidationRecord) {
        let session = &record.session;
        tracing::info!(
            session_token = %session.session_token,
            ip_address = ?session.ip_address,
            "Trial blocked: identity already used a trial"
        );

        let entry = CreateActivityLog {
            user_id: None,
            action: actions::TRIAL_BLOCKED.to_string(),
            details: Some(serde_json::json!({
                "session_token": session.session_token,
                "fingerprint": session.fingerprint,
            })),
            ip_address: session.ip_address.clone(),
        };
        if let Err(e) = self.billing.append_activity(&entry).await {
            tracing::warn!(error = %e, session_token = %session.session_token, "Failed to log trial block");
        }

        self.event_bus.publish(
            PlatformEvent::new(event_types::TRIAL_BLOCKED)
                .with_source("trial_session", session.session_token.clone()),
        );
    }
}
