//! Starting (or resuming) a trial from a client.

use std::sync::Arc;

use dailywatch_core::fingerprint::{generate_fingerprint, SignalSource};
use dailywatch_core::trial::{TrialPhase, TrialVerdict};

use crate::api::ApiClient;
use crate::clock::{ClockState, TrialClock};
use crate::error::ClientError;
use crate::token_store::TokenStore;
use crate::types::{TrialSessionView, ValidateTrial};

/// Result of [`TrialStarter::start`].
pub enum TrialStart {
    /// The trial is running; the clock is counting down.
    Running {
        session: TrialSessionView,
        clock: TrialClock,
    },
    /// This device or network already used a trial.
    Blocked {
        session: TrialSessionView,
        verdict: TrialVerdict,
    },
    /// The session's window has already elapsed.
    Expired { session: TrialSessionView },
}

impl TrialStart {
    pub fn phase(&self) -> TrialPhase {
        match self {
            TrialStart::Running { .. } => TrialPhase::Active,
            TrialStart::Blocked { .. } => TrialPhase::Blocked,
            TrialStart::Expired { .. } => TrialPhase::Expired,
        }
    }

    pub fn session(&self) -> &TrialSessionView {
        match self {
            TrialStart::Running { session, .. }
            | TrialStart::Blocked { session, .. }
            | TrialStart::Expired { session } => session,
        }
    }
}

/// Resumes the stored session, validates this device, and starts the clock.
pub struct TrialStarter {
    api: ApiClient,
    tokens: Arc<dyn TokenStore>,
    user_agent: Option<String>,
}

impl TrialStarter {
    pub fn new(api: ApiClient, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            tokens,
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Run the start-up sequence: resume or create the session, persist its
    /// token, validate the fingerprint, and on success start a countdown
    /// that calls `on_tick` every second.
    pub async fn start<S, F>(&self, signals: &S, on_tick: F) -> Result<TrialStart, ClientError>
    where
        S: SignalSource + ?Sized,
        F: Fn(ClockState) + Send + 'static,
    {
        let stored = match self.tokens.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored trial token");
                None
            }
        };

        let session = self.api.get_or_create_session(stored.as_deref()).await?;
        if stored.as_deref() != Some(session.session_token.as_str()) {
            if let Err(e) = self.tokens.save(&session.session_token) {
                tracing::warn!(error = %e, "Could not persist trial token");
            }
        }

        match session.state {
            TrialPhase::Blocked => {
                return Ok(TrialStart::Blocked {
                    verdict: TrialVerdict::deny(dailywatch_core::trial::REASON_TRIAL_USED),
                    session,
                })
            }
            TrialPhase::Expired => return Ok(TrialStart::Expired { session }),
            TrialPhase::Active | TrialPhase::Validating => {}
        }

        let verdict = self
            .api
            .validate_trial(&ValidateTrial {
                session_id: session.session_token.clone(),
                fingerprint: generate_fingerprint(signals),
                ip_address: None,
                user_agent: self.user_agent.clone(),
            })
            .await?;

        let mut session = session;
        session.state = TrialPhase::Validating.on_verdict(verdict.allowed);
        if !verdict.allowed {
            tracing::info!(session_token = %session.session_token, "Trial denied");
            return Ok(TrialStart::Blocked { session, verdict });
        }

        let clock = TrialClock::start(session.expires_at, on_tick);
        Ok(TrialStart::Running { session, clock })
    }
}
