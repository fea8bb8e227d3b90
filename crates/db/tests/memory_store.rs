//! Behaviour of the in-memory store: trial sessions, the atomic abuse
//! check, and compare-and-set activation.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use dailywatch_core::payment::{actions, PaymentStatus};
use dailywatch_core::trial::{self, TrialPhase};
use dailywatch_core::types::Timestamp;
use dailywatch_db::models::payment_attempt::CreatePaymentAttempt;
use dailywatch_db::models::subscription::{Activation, ActivationOutcome};
use dailywatch_db::models::trial_session::{UpdateTrialSession, ValidationCheck};
use dailywatch_db::{BillingStore, MemoryStore, StoreError, TrialStore};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

fn check(token: &str, fingerprint: &str, ip: Option<&str>, now: Timestamp) -> ValidationCheck {
    ValidationCheck {
        session_token: token.to_string(),
        fingerprint: fingerprint.to_string(),
        ip_address: ip.map(str::to_string),
        user_agent: Some("Mozilla/5.0".to_string()),
        checked_at: now,
    }
}

fn attempt(user: Uuid, external_id: &str) -> CreatePaymentAttempt {
    CreatePaymentAttempt {
        external_id: external_id.to_string(),
        user_id: user,
        user_email: "viewer@example.com".to_string(),
        amount: 99,
        currency: "PHP".to_string(),
        description: "Lifetime access".to_string(),
        status: PaymentStatus::Created,
        invoice_id: Some("inv_1".to_string()),
        invoice_url: Some("https://checkout.example/inv_1".to_string()),
        ip_address: None,
        raw_provider_response: None,
    }
}

fn activation(external_id: &str) -> Activation {
    Activation {
        external_id: external_id.to_string(),
        paid_at: t0(),
        ip_address: None,
    }
}

// ---------------------------------------------------------------------------
// Trial sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_or_create_mints_fifteen_minute_session() {
    let store = MemoryStore::new();
    let session = store.get_or_create(None, t0()).await.unwrap();

    assert!(session.session_token.starts_with(trial::TOKEN_PREFIX));
    assert_eq!(session.started_at, t0());
    assert_eq!(session.expires_at - session.started_at, Duration::minutes(15));
    assert!(!session.is_blocked);
    assert_eq!(session.video_count, 0);
}

#[tokio::test]
async fn get_or_create_returns_existing_session_unchanged() {
    let store = MemoryStore::new();
    let first = store.get_or_create(None, t0()).await.unwrap();
    let again = store
        .get_or_create(Some(&first.session_token), t0() + Duration::minutes(5))
        .await
        .unwrap();

    assert_eq!(again.id, first.id);
    assert_eq!(again.started_at, first.started_at);
    assert_eq!(store.trial_sessions().len(), 1);
}

#[tokio::test]
async fn unknown_token_starts_a_new_session() {
    let store = MemoryStore::new();
    let session = store
        .get_or_create(Some("trial_0_forgedtoken123"), t0())
        .await
        .unwrap();
    assert_ne!(session.session_token, "trial_0_forgedtoken123");
}

#[tokio::test]
async fn update_never_clears_block_flag() {
    let store = MemoryStore::new();
    let session = store.get_or_create(None, t0()).await.unwrap();
    let token = session.session_token.as_str();

    let blocked = UpdateTrialSession {
        block: true,
        ..Default::default()
    };
    store.update(token, &blocked).await.unwrap();

    let cleared = UpdateTrialSession {
        fingerprint: Some("fp".into()),
        block: false,
        ..Default::default()
    };
    let after = store.update(token, &cleared).await.unwrap().unwrap();
    assert!(after.is_blocked);
    assert_eq!(after.fingerprint.as_deref(), Some("fp"));
}

#[tokio::test]
async fn increment_video_count_reports_unknown_token() {
    let store = MemoryStore::new();
    let session = store.get_or_create(None, t0()).await.unwrap();

    assert!(store
        .increment_video_count(&session.session_token)
        .await
        .unwrap());
    assert!(!store.increment_video_count("missing").await.unwrap());
    let stored = store.find(&session.session_token).await.unwrap().unwrap();
    assert_eq!(stored.video_count, 1);
}

// ---------------------------------------------------------------------------
// Abuse check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_session_for_device_is_allowed() {
    let store = MemoryStore::new();
    let s = store.get_or_create(None, t0()).await.unwrap();

    let record = store
        .record_validation(&check(&s.session_token, "fp-a", Some("1.2.3.4"), t0()))
        .await
        .unwrap()
        .unwrap();

    assert!(!record.prior_trial_found);
    assert!(!record.session.is_blocked);
    assert_eq!(record.session.fingerprint.as_deref(), Some("fp-a"));
    assert_eq!(record.session.ip_address.as_deref(), Some("1.2.3.4"));
    assert_eq!(record.session.validated_at, Some(t0()));
}

#[tokio::test]
async fn session_is_validating_until_checked() {
    let store = MemoryStore::new();
    let s = store.get_or_create(None, t0()).await.unwrap();
    assert_eq!(s.phase(t0()), TrialPhase::Validating);

    let later = t0() + Duration::minutes(2);
    store
        .record_validation(&check(&s.session_token, "fp-a", None, t0()))
        .await
        .unwrap();
    let again = store
        .record_validation(&check(&s.session_token, "fp-a", None, later))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.session.validated_at, Some(t0()));
    assert_eq!(again.session.phase(later), TrialPhase::Active);
}

#[tokio::test]
async fn revalidating_own_session_is_not_abuse() {
    let store = MemoryStore::new();
    let s = store.get_or_create(None, t0()).await.unwrap();
    let c = check(&s.session_token, "fp-a", Some("1.2.3.4"), t0());

    store.record_validation(&c).await.unwrap();
    let again = store.record_validation(&c).await.unwrap().unwrap();
    assert!(!again.prior_trial_found);
}

#[tokio::test]
async fn same_fingerprint_within_window_is_blocked() {
    let store = MemoryStore::new();
    let first = store.get_or_create(None, t0()).await.unwrap();
    store
        .record_validation(&check(&first.session_token, "fp-a", Some("1.1.1.1"), t0()))
        .await
        .unwrap();

    let later = t0() + Duration::minutes(25);
    let second = store.get_or_create(None, later).await.unwrap();
    let record = store
        .record_validation(&check(&second.session_token, "fp-a", Some("2.2.2.2"), later))
        .await
        .unwrap()
        .unwrap();

    assert!(record.prior_trial_found);
    assert!(record.newly_blocked);
    assert!(record.session.is_blocked);
}

#[tokio::test]
async fn same_ip_within_window_is_blocked() {
    let store = MemoryStore::new();
    let first = store.get_or_create(None, t0()).await.unwrap();
    store
        .record_validation(&check(&first.session_token, "fp-a", Some("1.1.1.1"), t0()))
        .await
        .unwrap();

    let second = store.get_or_create(None, t0()).await.unwrap();
    let record = store
        .record_validation(&check(&second.session_token, "fp-b", Some("1.1.1.1"), t0()))
        .await
        .unwrap()
        .unwrap();
    assert!(record.session.is_blocked);
}

#[tokio::test]
async fn missing_ip_never_matches_missing_ip() {
    let store = MemoryStore::new();
    let first = store.get_or_create(None, t0()).await.unwrap();
    store
        .record_validation(&check(&first.session_token, "fp-a", None, t0()))
        .await
        .unwrap();

    let second = store.get_or_create(None, t0()).await.unwrap();
    let record = store
        .record_validation(&check(&second.session_token, "fp-b", None, t0()))
        .await
        .unwrap()
        .unwrap();
    assert!(!record.prior_trial_found);
}

#[tokio::test]
async fn prior_trial_older_than_window_is_ignored() {
    let store = MemoryStore::new();
    let first = store.get_or_create(None, t0()).await.unwrap();
    store
        .record_validation(&check(&first.session_token, "fp-a", Some("1.1.1.1"), t0()))
        .await
        .unwrap();

    // 25 hours after the first trial expired.
    let later = first.expires_at + Duration::hours(25);
    let second = store.get_or_create(None, later).await.unwrap();
    let record = store
        .record_validation(&check(&second.session_token, "fp-a", Some("1.1.1.1"), later))
        .await
        .unwrap()
        .unwrap();
    assert!(!record.prior_trial_found);
    assert!(!record.session.is_blocked);
}

#[tokio::test]
async fn blocked_session_stays_blocked_on_revalidation() {
    let store = MemoryStore::new();
    let first = store.get_or_create(None, t0()).await.unwrap();
    store
        .record_validation(&check(&first.session_token, "fp-a", None, t0()))
        .await
        .unwrap();
    let second = store.get_or_create(None, t0()).await.unwrap();
    store
        .record_validation(&check(&second.session_token, "fp-a", None, t0()))
        .await
        .unwrap();

    // Revalidate with a fresh identity, long after every window closed.
    let much_later = t0() + Duration::days(3);
    let record = store
        .record_validation(&check(&second.session_token, "fp-z", None, much_later))
        .await
        .unwrap()
        .unwrap();
    assert!(record.session.is_blocked);
    assert!(!record.newly_blocked);
}

#[tokio::test]
async fn validation_of_unknown_token_returns_none() {
    let store = MemoryStore::new();
    let record = store
        .record_validation(&check("trial_missing", "fp-a", None, t0()))
        .await
        .unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn concurrent_validations_block_all_but_one() {
    let store = Arc::new(MemoryStore::new());
    let mut tokens = Vec::new();
    for _ in 0..8 {
        tokens.push(store.get_or_create(None, t0()).await.unwrap().session_token);
    }

    let mut handles = Vec::new();
    for token in tokens {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .record_validation(&check(&token, "fp-shared", Some("9.9.9.9"), t0()))
                .await
                .unwrap()
                .unwrap()
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if !handle.await.unwrap().session.is_blocked {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 1);
}

#[tokio::test]
async fn offline_store_reports_unavailable() {
    let store = MemoryStore::new();
    store.set_unavailable(true);
    assert_matches!(
        store.get_or_create(None, t0()).await,
        Err(StoreError::Unavailable(_))
    );
    store.set_unavailable(false);
    assert!(store.get_or_create(None, t0()).await.is_ok());
}

// ---------------------------------------------------------------------------
// Billing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn activation_is_applied_exactly_once() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();
    store.insert_attempt(&attempt(user, "ext_1")).await.unwrap();
    store.ensure_pending_subscription(user).await.unwrap();

    let first = store.activate(&activation("ext_1")).await.unwrap();
    assert_matches!(first, ActivationOutcome::Activated { ref subscription, .. } => {
        assert!(subscription.is_active());
        assert_eq!(subscription.payment_id.as_deref(), Some("ext_1"));
        assert_eq!(subscription.paid_at, Some(t0()));
    });

    let second = store.activate(&activation("ext_1")).await.unwrap();
    assert_matches!(second, ActivationOutcome::AlreadyPaid { subscription: Some(_), .. });

    let completed: Vec<_> = store
        .activity_logs()
        .into_iter()
        .filter(|l| l.action == actions::PAYMENT_COMPLETED)
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(store.subscriptions().len(), 1);
}

#[tokio::test]
async fn concurrent_activations_have_one_winner() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    store.insert_attempt(&attempt(user, "ext_race")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.activate(&activation("ext_race")).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), ActivationOutcome::Activated { .. }) {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(store.activity_logs().len(), 1);
}

#[tokio::test]
async fn expired_attempt_cannot_be_paid() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();
    store.insert_attempt(&attempt(user, "ext_2")).await.unwrap();

    let expired = store
        .transition_attempt("ext_2", PaymentStatus::Expired)
        .await
        .unwrap();
    assert_eq!(expired.unwrap().status, "expired");

    assert_matches!(
        store.activate(&activation("ext_2")).await.unwrap(),
        ActivationOutcome::Unpayable(_)
    );
    assert!(store.find_subscription(user).await.unwrap().is_none());
}

#[tokio::test]
async fn activation_of_unknown_attempt_is_not_found() {
    let store = MemoryStore::new();
    assert_matches!(
        store.activate(&activation("nope")).await.unwrap(),
        ActivationOutcome::NotFound
    );
}

#[tokio::test]
async fn ensure_pending_never_downgrades_active() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();
    store.insert_attempt(&attempt(user, "ext_3")).await.unwrap();
    store.activate(&activation("ext_3")).await.unwrap();

    let sub = store.ensure_pending_subscription(user).await.unwrap();
    assert!(sub.is_active());
}

#[tokio::test]
async fn duplicate_external_id_is_rejected() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();
    store.insert_attempt(&attempt(user, "ext_4")).await.unwrap();
    assert!(store.insert_attempt(&attempt(user, "ext_4")).await.is_err());
}
