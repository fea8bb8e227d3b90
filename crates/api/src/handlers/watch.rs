//! Server-side watch gate and video resolution.

use axum::extract::{Query, State};
use axum::Json;
use dailywatch_core::error::CoreError;
use dailywatch_core::trial::{self, TrialPhase};
use dailywatch_core::video::{self, ResolvedVideo};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

const INVALID_VIDEO: &str = "Not a recognised Dailymotion link or video id";
const NO_ACCESS: &str = "Start a free trial or purchase lifetime access to watch.";

/// How the caller was let in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Subscription,
    Trial,
}

#[derive(Debug, Serialize)]
pub struct WatchGrant {
    #[serde(flatten)]
    pub video: ResolvedVideo,
    pub access: AccessKind,
    /// Seconds left in the trial, for trial access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchBody {
    pub input: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// POST /api/v1/watch
///
/// Returns an embed URL only for an active subscriber or a running trial
/// that has passed validation. Trial watches increment the session's video
/// count.
pub async fn watch(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(body): Json<WatchBody>,
) -> AppResult<Json<DataResponse<WatchGrant>>> {
    let resolved =
        video::resolve(&body.input).ok_or_else(|| CoreError::Validation(INVALID_VIDEO.into()))?;

    if let Some(user) = &user {
        let subscription = state.billing.find_subscription(user.user_id).await?;
        if subscription.is_some_and(|s| s.is_active()) {
            return Ok(Json(DataResponse {
                data: WatchGrant {
                    video: resolved,
                    access: AccessKind::Subscription,
                    remaining_secs: None,
                },
            }));
        }
    }

    let Some(token) = body.session_id.as_deref().filter(|t| !t.trim().is_empty()) else {
        return Err(CoreError::Forbidden(NO_ACCESS.into()).into());
    };
    let session = state
        .trials
        .find(token)
        .await?
        .ok_or_else(|| CoreError::Forbidden(NO_ACCESS.into()))?;

    let now = state.clock.now();
    match session.phase(now) {
        TrialPhase::Blocked => Err(CoreError::Forbidden(trial::REASON_TRIAL_USED.into()).into()),
        TrialPhase::Expired => Err(CoreError::Forbidden(trial::REASON_EXPIRED.into()).into()),
        TrialPhase::Validating => {
            Err(CoreError::Forbidden(trial::REASON_NOT_VALIDATED.into()).into())
        }
        TrialPhase::Active => {
            state.trials.increment_video_count(token).await?;
            tracing::debug!(session_token = token, video_id = %resolved.video_id, "Trial watch");
            Ok(Json(DataResponse {
                data: WatchGrant {
                    video: resolved,
                    access: AccessKind::Trial,
                    remaining_secs: Some(session.remaining_secs(now)),
                },
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub input: String,
}

/// GET /api/v1/videos/resolve?input=
pub async fn resolve_video(
    Query(query): Query<ResolveQuery>,
) -> AppResult<Json<DataResponse<ResolvedVideo>>> {
    let resolved =
        video::resolve(&query.input).ok_or_else(|| CoreError::Validation(INVALID_VIDEO.into()))?;
    Ok(Json(DataResponse { data: resolved }))
}
