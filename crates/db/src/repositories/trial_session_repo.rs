//! Repository for the `trial_sessions` table.

use sqlx::{PgExecutor, PgPool};

use crate::models::trial_session::{
    CreateTrialSession, TrialSession, UpdateTrialSession, ValidationCheck,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, session_token, fingerprint, ip_address, user_agent, \
                       started_at, expires_at, video_count, is_blocked, validated_at, \
                       created_at, updated_at";

/// Provides queries for trial sessions. All writes are keyed by session token.
pub struct TrialSessionRepo;

impl TrialSessionRepo {
    /// Insert a new session unless the token already exists.
    ///
    /// Returns `None` on a token collision so the caller can read the
    /// existing row instead.
    pub async fn create_if_absent(
        pool: &PgPool,
        input: &CreateTrialSession,
    ) -> Result<Option<TrialSession>, sqlx::Error> {
        let query = format!(
            "INSERT INTO trial_sessions (session_token, started_at, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (session_token) DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TrialSession>(&query)
            .bind(&input.session_token)
            .bind(input.started_at)
            .bind(input.expires_at())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_token(
        pool: &PgPool,
        session_token: &str,
    ) -> Result<Option<TrialSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM trial_sessions WHERE session_token = $1");
        sqlx::query_as::<_, TrialSession>(&query)
            .bind(session_token)
            .fetch_optional(pool)
            .await
    }

    /// Merge the given fields into a session. The block flag is OR-merged.
    pub async fn update<'e>(
        executor: impl PgExecutor<'e>,
        session_token: &str,
        input: &UpdateTrialSession,
    ) -> Result<Option<TrialSession>, sqlx::Error> {
        let query = format!(
            "UPDATE trial_sessions SET
                fingerprint = COALESCE($2, fingerprint),
                ip_address = COALESCE($3, ip_address),
                user_agent = COALESCE($4, user_agent),
                is_blocked = is_blocked OR $5,
                validated_at = COALESCE(validated_at, $6)
             WHERE session_token = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TrialSession>(&query)
            .bind(session_token)
            .bind(&input.fingerprint)
            .bind(&input.ip_address)
            .bind(&input.user_agent)
            .bind(input.block)
            .bind(input.validated_at)
            .fetch_optional(executor)
            .await
    }

    /// Atomically bump the video counter. Returns `true` if the row exists.
    pub async fn increment_video_count(
        pool: &PgPool,
        session_token: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE trial_sessions SET video_count = video_count + 1 WHERE session_token = $1",
        )
        .bind(session_token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Take transaction-scoped advisory locks on the given identities.
    ///
    /// Locks are acquired in key order so two requests sharing a fingerprint
    /// and an IP cannot deadlock.
    pub async fn lock_identities<'e>(
        executor: impl PgExecutor<'e>,
        identities: &[String],
    ) -> Result<(), sqlx::Error> {
        if identities.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "SELECT pg_advisory_xact_lock(k)
             FROM (SELECT DISTINCT hashtextextended('trial:' || v, 0) AS k
                   FROM unnest($1::text[]) AS v) keys
             ORDER BY k",
        )
        .bind(identities)
        .execute(executor)
        .await
        .map(|_| ())
    }

    /// Read a session's block flag and lock its row for the transaction.
    pub async fn lock_for_validation<'e>(
        executor: impl PgExecutor<'e>,
        session_token: &str,
    ) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT is_blocked FROM trial_sessions WHERE session_token = $1 FOR UPDATE",
        )
        .bind(session_token)
        .fetch_optional(executor)
        .await
    }

    /// Whether any other session shares the fingerprint or IP and expires
    /// after `check.recent_since()`.
    pub async fn has_recent_match<'e>(
        executor: impl PgExecutor<'e>,
        check: &ValidationCheck,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM trial_sessions
                WHERE session_token <> $1
                  AND (fingerprint = $2 OR ip_address = $3)
                  AND expires_at > $4
             )",
        )
        .bind(&check.session_token)
        .bind(&check.fingerprint)
        .bind(&check.ip_address)
        .bind(check.recent_since())
        .fetch_one(executor)
        .await
    }
}
