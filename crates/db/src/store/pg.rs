//! Postgres-backed store built on the repositories.

use async_trait::async_trait;
use dailywatch_core::payment::PaymentStatus;
use dailywatch_core::trial;
use dailywatch_core::types::{Timestamp, UserId};

use crate::models::activity_log::{ActivityLog, CreateActivityLog};
use crate::models::payment_attempt::{CreatePaymentAttempt, PaymentAttempt};
use crate::models::subscription::{Activation, ActivationOutcome, Subscription};
use crate::models::trial_session::{
    CreateTrialSession, TrialSession, UpdateTrialSession, ValidationCheck, ValidationRecord,
};
use crate::repositories::{
    ActivityLogRepo, PaymentAttemptRepo, SubscriptionRepo, TrialSessionRepo,
};
use crate::DbPool;

use super::{payment_completed_log, settled_outcome, BillingStore, StoreError, TrialStore};

/// Store backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrialStore for PgStore {
    async fn get_or_create(
        &self,
        session_token: Option<&str>,
        now: Timestamp,
    ) -> Result<TrialSession, StoreError> {
        if let Some(token) = session_token {
            if let Some(existing) = TrialSessionRepo::find_by_token(&self.pool, token).await? {
                return Ok(existing);
            }
        }

        let input = CreateTrialSession {
            session_token: trial::generate_session_token(now),
            started_at: now,
        };
        if let Some(created) = TrialSessionRepo::create_if_absent(&self.pool, &input).await? {
            return Ok(created);
        }
        tracing::debug!(session_token = %input.session_token, "Session token collision, reading existing row");
        TrialSessionRepo::find_by_token(&self.pool, &input.session_token)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn find(&self, session_token: &str) -> Result<Option<TrialSession>, StoreError> {
        Ok(TrialSessionRepo::find_by_token(&self.pool, session_token).await?)
    }

    async fn update(
        &self,
        session_token: &str,
        input: &UpdateTrialSession,
    ) -> Result<Option<TrialSession>, StoreError> {
        Ok(TrialSessionRepo::update(&self.pool, session_token, input).await?)
    }

    async fn increment_video_count(&self, session_token: &str) -> Result<bool, StoreError> {
        Ok(TrialSessionRepo::increment_video_count(&self.pool, session_token).await?)
    }

    async fn record_validation(
        &self,
        check: &ValidationCheck,
    ) -> Result<Option<ValidationRecord>, StoreError> {
        let mut identities = vec![check.fingerprint.clone()];
        identities.extend(check.ip_address.clone());

        let mut tx = self.pool.begin().await?;
        TrialSessionRepo::lock_identities(&mut *tx, &identities).await?;

        let Some(was_blocked) =
            TrialSessionRepo::lock_for_validation(&mut *tx, &check.session_token).await?
        else {
            return Ok(None);
        };

        let prior_trial_found = TrialSessionRepo::has_recent_match(&mut *tx, check).await?;
        let update = UpdateTrialSession {
            fingerprint: Some(check.fingerprint.clone()),
            ip_address: check.ip_address.clone(),
            user_agent: check.user_agent.clone(),
            block: prior_trial_found,
            validated_at: Some(check.checked_at),
        };
        let Some(session) = TrialSessionRepo::update(&mut *tx, &check.session_token, &update).await?
        else {
            return Ok(None);
        };
        tx.commit().await?;

        Ok(Some(ValidationRecord {
            session,
            prior_trial_found,
            newly_blocked: prior_trial_found && !was_blocked,
        }))
    }
}

#[async_trait]
impl BillingStore for PgStore {
    async fn insert_attempt(
        &self,
        input: &CreatePaymentAttempt,
    ) -> Result<PaymentAttempt, StoreError> {
        Ok(PaymentAttemptRepo::create(&self.pool, input).await?)
    }

    async fn find_attempt(&self, external_id: &str) -> Result<Option<PaymentAttempt>, StoreError> {
        Ok(PaymentAttemptRepo::find_by_external_id(&self.pool, external_id).await?)
    }

    async fn transition_attempt(
        &self,
        external_id: &str,
        to: PaymentStatus,
    ) -> Result<Option<PaymentAttempt>, StoreError> {
        Ok(PaymentAttemptRepo::transition(&self.pool, external_id, to, None).await?)
    }

    async fn activate(&self, activation: &Activation) -> Result<ActivationOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let won = PaymentAttemptRepo::transition(
            &mut *tx,
            &activation.external_id,
            PaymentStatus::Paid,
            Some(activation.paid_at),
        )
        .await?;

        let Some(attempt) = won else {
            let existing =
                PaymentAttemptRepo::find_by_external_id(&mut *tx, &activation.external_id).await?;
            tx.rollback().await?;
            return match existing {
                None => Ok(ActivationOutcome::NotFound),
                Some(attempt) => {
                    let subscription =
                        SubscriptionRepo::find_by_user(&self.pool, attempt.user_id).await?;
                    Ok(settled_outcome(attempt, subscription))
                }
            };
        };

        let subscription = SubscriptionRepo::activate(&mut *tx, &attempt).await?;
        ActivityLogRepo::create(&mut *tx, &payment_completed_log(&attempt, activation)).await?;
        tx.commit().await?;

        Ok(ActivationOutcome::Activated {
            attempt,
            subscription,
        })
    }

    async fn find_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(SubscriptionRepo::find_by_user(&self.pool, user_id).await?)
    }

    async fn ensure_pending_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Subscription, StoreError> {
        Ok(SubscriptionRepo::ensure_pending(&self.pool, user_id).await?)
    }

    async fn append_activity(&self, input: &CreateActivityLog) -> Result<ActivityLog, StoreError> {
        Ok(ActivityLogRepo::create(&self.pool, input).await?)
    }
}
