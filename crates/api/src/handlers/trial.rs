//! Handlers for anonymous trial sessions.

use axum::extract::{Path, State};
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use dailywatch_core::error::CoreError;
use dailywatch_core::trial::{TrialPhase, TrialVerdict};
use dailywatch_core::types::Timestamp;
use dailywatch_db::models::trial_session::TrialSession;
use serde::{Deserialize, Serialize};

use crate::engine::ValidationRequest;
use crate::error::AppResult;
use crate::middleware::client_ip::ClientIp;
use crate::response::DataResponse;
use crate::state::AppState;

/// Client view of a session, with the countdown derived server-side.
#[derive(Debug, Serialize)]
pub struct TrialSessionView {
    pub session_token: String,
    pub started_at: Timestamp,
    pub expires_at: Timestamp,
    pub remaining_secs: i64,
    pub state: TrialPhase,
    pub video_count: i32,
    pub is_blocked: bool,
}

impl TrialSessionView {
    pub fn new(session: TrialSession, now: Timestamp) -> Self {
        Self {
            remaining_secs: session.remaining_secs(now),
            state: session.phase(now),
            session_token: session.session_token,
            started_at: session.started_at,
            expires_at: session.expires_at,
            video_count: session.video_count,
            is_blocked: session.is_blocked,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionBody {
    #[serde(default)]
    pub session_token: Option<String>,
}

/// POST /api/v1/trial/sessions
///
/// Resume the session for the given token or start a new one.
pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionBody>>,
) -> AppResult<Json<DataResponse<TrialSessionView>>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let token = body
        .session_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let now = state.clock.now();
    let session = state.trials.get_or_create(token, now).await?;
    tracing::debug!(session_token = %session.session_token, "Trial session resolved");

    Ok(Json(DataResponse {
        data: TrialSessionView::new(session, now),
    }))
}

/// GET /api/v1/trial/sessions/{token}
pub async fn get_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<DataResponse<TrialSessionView>>> {
    let session = state
        .trials
        .find(&token)
        .await?
        .ok_or_else(|| CoreError::not_found("Trial session", &token))?;

    Ok(Json(DataResponse {
        data: TrialSessionView::new(session, state.clock.now()),
    }))
}

/// POST /api/v1/trial/sessions/{token}/videos
///
/// Count one watched video. Informational only.
pub async fn record_video(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<StatusCode> {
    if !state.trials.increment_video_count(&token).await? {
        return Err(CoreError::not_found("Trial session", &token).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateBody {
    pub session_id: String,
    pub fingerprint: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// POST /api/v1/trial/validate
///
/// Returns `{ allowed, reason? }`. The proxy-reported IP and the request's
/// `User-Agent` take precedence over body values.
pub async fn validate(
    State(state): State<AppState>,
    client_ip: ClientIp,
    headers: HeaderMap,
    Json(body): Json<ValidateBody>,
) -> AppResult<Json<TrialVerdict>> {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(body.user_agent);

    let verdict = state
        .validator
        .validate(ValidationRequest {
            session_token: body.session_id,
            fingerprint: body.fingerprint,
            ip_address: client_ip.or(body.ip_address),
            user_agent,
        })
        .await?;

    Ok(Json(verdict))
}
