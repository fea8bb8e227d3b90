//! JWT-based authentication extractor for Axum handlers.

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use dailywatch_core::error::CoreError;
use dailywatch_core::types::UserId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub email: Option<String>,
}

impl AuthUser {
    /// Fail with 403 unless this user is `user_id`.
    pub fn ensure_is(&self, user_id: UserId) -> Result<(), AppError> {
        if self.user_id != user_id {
            return Err(CoreError::Forbidden("You can only act on your own account".into()).into());
        }
        Ok(())
    }
}

fn unauthorized(msg: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(msg.into()))
}

fn from_header(value: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid Authorization format. Expected: Bearer <token>"))?;

    let claims = validate_token(token, &state.config.jwt)
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?;
        from_header(header, state)
    }
}

/// A missing header yields `None`; a present but invalid one is still 401.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        {
            Some(header) => from_header(header, state).map(Some),
            None => Ok(None),
        }
    }
}
