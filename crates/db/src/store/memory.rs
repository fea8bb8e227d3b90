//! Process-local store.
//!
//! Every operation runs under one mutex, which gives the same atomicity the
//! Postgres store gets from transactions and row locks. Used by tests and
//! by the API when no `DATABASE_URL` is configured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use dailywatch_core::payment::PaymentStatus;
use dailywatch_core::subscription::SubscriptionStatus;
use dailywatch_core::trial;
use dailywatch_core::types::{DbId, Timestamp, UserId};

use crate::models::activity_log::{ActivityLog, CreateActivityLog};
use crate::models::payment_attempt::{CreatePaymentAttempt, PaymentAttempt};
use crate::models::subscription::{Activation, ActivationOutcome, Subscription};
use crate::models::trial_session::{
    CreateTrialSession, TrialSession, UpdateTrialSession, ValidationCheck, ValidationRecord,
};

use super::{payment_completed_log, settled_outcome, BillingStore, StoreError, TrialStore};

#[derive(Debug, Default)]
struct Tables {
    next_id: DbId,
    sessions: HashMap<String, TrialSession>,
    attempts: HashMap<String, PaymentAttempt>,
    subscriptions: HashMap<UserId, Subscription>,
    activity: Vec<ActivityLog>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn insert_session(&mut self, input: &CreateTrialSession) -> TrialSession {
        let id = self.next_id();
        let now = Utc::now();
        let session = TrialSession {
            id,
            session_token: input.session_token.clone(),
            fingerprint: None,
            ip_address: None,
            user_agent: None,
            started_at: input.started_at,
            expires_at: input.expires_at(),
            video_count: 0,
            is_blocked: false,
            validated_at: None,
            created_at: now,
            updated_at: now,
        };
        self.sessions
            .insert(session.session_token.clone(), session.clone());
        session
    }

    fn update_session(
        &mut self,
        session_token: &str,
        input: &UpdateTrialSession,
    ) -> Option<TrialSession> {
        let session = self.sessions.get_mut(session_token)?;
        if let Some(fingerprint) = &input.fingerprint {
            session.fingerprint = Some(fingerprint.clone());
        }
        if let Some(ip) = &input.ip_address {
            session.ip_address = Some(ip.clone());
        }
        if let Some(ua) = &input.user_agent {
            session.user_agent = Some(ua.clone());
        }
        session.is_blocked |= input.block;
        if session.validated_at.is_none() {
            session.validated_at = input.validated_at;
        }
        session.updated_at = Utc::now();
        Some(session.clone())
    }

    fn has_recent_match(&self, check: &ValidationCheck) -> bool {
        self.sessions.values().any(|other| {
            other.session_token != check.session_token
                && trial::is_recent_trial(other.expires_at, check.checked_at)
                && (other.fingerprint.as_deref() == Some(check.fingerprint.as_str())
                    || (check.ip_address.is_some() && other.ip_address == check.ip_address))
        })
    }

    fn transition(
        &mut self,
        external_id: &str,
        to: PaymentStatus,
        paid_at: Option<Timestamp>,
    ) -> Option<PaymentAttempt> {
        let attempt = self.attempts.get_mut(external_id)?;
        let current = attempt.payment_status().ok()?;
        if !current.can_transition_to(to) {
            return None;
        }
        attempt.status = to.as_str().to_string();
        if paid_at.is_some() {
            attempt.paid_at = paid_at;
        }
        attempt.updated_at = Utc::now();
        Some(attempt.clone())
    }

    fn append(&mut self, input: &CreateActivityLog) -> ActivityLog {
        let entry = ActivityLog {
            id: self.next_id(),
            user_id: input.user_id,
            action: input.action.clone(),
            details: input.details.clone(),
            ip_address: input.ip_address.clone(),
            created_at: Utc::now(),
        };
        self.activity.push(entry.clone());
        entry
    }
}

/// In-memory implementation of [`TrialStore`] and [`BillingStore`].
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn trial_sessions(&self) -> Vec<TrialSession> {
        let mut rows: Vec<_> = self.lock().sessions.values().cloned().collect();
        rows.sort_by_key(|s| s.id);
        rows
    }

    pub fn payment_attempts(&self) -> Vec<PaymentAttempt> {
        let mut rows: Vec<_> = self.lock().attempts.values().cloned().collect();
        rows.sort_by_key(|a| a.id);
        rows
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut rows: Vec<_> = self.lock().subscriptions.values().cloned().collect();
        rows.sort_by_key(|s| s.id);
        rows
    }

    pub fn activity_logs(&self) -> Vec<ActivityLog> {
        self.lock().activity.clone()
    }

    /// Insert a session with an explicit token and start time.
    pub fn seed_session(&self, session_token: &str, started_at: Timestamp) -> TrialSession {
        self.lock().insert_session(&CreateTrialSession {
            session_token: session_token.to_string(),
            started_at,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(self.lock())
    }
}

#[async_trait]
impl TrialStore for MemoryStore {
    async fn get_or_create(
        &self,
        session_token: Option<&str>,
        now: Timestamp,
    ) -> Result<TrialSession, StoreError> {
        let mut tables = self.tables()?;
        if let Some(existing) = session_token.and_then(|t| tables.sessions.get(t)) {
            return Ok(existing.clone());
        }
        let mut token = trial::generate_session_token(now);
        while tables.sessions.contains_key(&token) {
            token = trial::generate_session_token(now);
        }
        Ok(tables.insert_session(&CreateTrialSession {
            session_token: token,
            started_at: now,
        }))
    }

    async fn find(&self, session_token: &str) -> Result<Option<TrialSession>, StoreError> {
        Ok(self.tables()?.sessions.get(session_token).cloned())
    }

    async fn update(
        &self,
        session_token: &str,
        input: &UpdateTrialSession,
    ) -> Result<Option<TrialSession>, StoreError> {
        Ok(self.tables()?.update_session(session_token, input))
    }

    async fn increment_video_count(&self, session_token: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        match tables.sessions.get_mut(session_token) {
            Some(session) => {
                session.video_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_validation(
        &self,
        check: &ValidationCheck,
    ) -> Result<Option<ValidationRecord>, StoreError> {
        let mut tables = self.tables()?;
        let Some(was_blocked) = tables
            .sessions
            .get(&check.session_token)
            .map(|s| s.is_blocked)
        else {
            return Ok(None);
        };

        let prior_trial_found = tables.has_recent_match(check);
        let update = UpdateTrialSession {
            fingerprint: Some(check.fingerprint.clone()),
            ip_address: check.ip_address.clone(),
            user_agent: check.user_agent.clone(),
            block: prior_trial_found,
            validated_at: Some(check.checked_at),
        };
        Ok(tables
            .update_session(&check.session_token, &update)
            .map(|session| ValidationRecord {
                session,
                prior_trial_found,
                newly_blocked: prior_trial_found && !was_blocked,
            }))
    }
}

#[async_trait]
impl BillingStore for MemoryStore {
    async fn insert_attempt(
        &self,
        input: &CreatePaymentAttempt,
    ) -> Result<PaymentAttempt, StoreError> {
        let mut tables = self.tables()?;
        if tables.attempts.contains_key(&input.external_id) {
            return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                "duplicate external_id {}",
                input.external_id
            ))));
        }
        let now = Utc::now();
        let attempt = PaymentAttempt {
            id: tables.next_id(),
            external_id: input.external_id.clone(),
            user_id: input.user_id,
            user_email: input.user_email.clone(),
            amount: input.amount,
            currency: input.currency.clone(),
            description: input.description.clone(),
            status: input.status.as_str().to_string(),
            invoice_id: input.invoice_id.clone(),
            invoice_url: input.invoice_url.clone(),
            ip_address: input.ip_address.clone(),
            raw_provider_response: input.raw_provider_response.clone(),
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        tables
            .attempts
            .insert(attempt.external_id.clone(), attempt.clone());
        Ok(attempt)
    }

    async fn find_attempt(&self, external_id: &str) -> Result<Option<PaymentAttempt>, StoreError> {
        Ok(self.tables()?.attempts.get(external_id).cloned())
    }

    async fn transition_attempt(
        &self,
        external_id: &str,
        to: PaymentStatus,
    ) -> Result<Option<PaymentAttempt>, StoreError> {
        Ok(self.tables()?.transition(external_id, to, None))
    }

    async fn activate(&self, activation: &Activation) -> Result<ActivationOutcome, StoreError> {
        let mut tables = self.tables()?;

        let won = tables.transition(
            &activation.external_id,
            PaymentStatus::Paid,
            Some(activation.paid_at),
        );
        let Some(attempt) = won else {
            return Ok(match tables.attempts.get(&activation.external_id).cloned() {
                None => ActivationOutcome::NotFound,
                Some(attempt) => {
                    let subscription = tables.subscriptions.get(&attempt.user_id).cloned();
                    settled_outcome(attempt, subscription)
                }
            });
        };

        let now = Utc::now();
        let id = match tables.subscriptions.get(&attempt.user_id) {
            Some(existing) => existing.id,
            None => tables.next_id(),
        };
        let created_at = tables
            .subscriptions
            .get(&attempt.user_id)
            .map_or(now, |s| s.created_at);
        let subscription = Subscription {
            id,
            user_id: attempt.user_id,
            status: SubscriptionStatus::Active.as_str().to_string(),
            payment_id: Some(attempt.external_id.clone()),
            paid_at: attempt.paid_at,
            amount: Some(attempt.amount),
            currency: Some(attempt.currency.clone()),
            created_at,
            updated_at: now,
        };
        tables
            .subscriptions
            .insert(attempt.user_id, subscription.clone());
        tables.append(&payment_completed_log(&attempt, activation));

        Ok(ActivationOutcome::Activated {
            attempt,
            subscription,
        })
    }

    async fn find_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self.tables()?.subscriptions.get(&user_id).cloned())
    }

    async fn ensure_pending_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Subscription, StoreError> {
        let mut tables = self.tables()?;
        if let Some(existing) = tables.subscriptions.get(&user_id) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let subscription = Subscription {
            id: tables.next_id(),
            user_id,
            status: SubscriptionStatus::Pending.as_str().to_string(),
            payment_id: None,
            paid_at: None,
            amount: None,
            currency: None,
            created_at: now,
            updated_at: now,
        };
        tables.subscriptions.insert(user_id, subscription.clone());
        Ok(subscription)
    }

    async fn append_activity(&self, input: &CreateActivityLog) -> Result<ActivityLog, StoreError> {
        Ok(self.tables()?.append(input))
    }
}
