use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dailywatch_core::error::CoreError;
use dailywatch_db::StoreError;
use serde_json::json;

/// Message shown when a confirmed payment could not be recorded.
pub const ACTIVATION_PENDING_MESSAGE: &str =
    "Payment received. Your access is still being activated; if it does not appear shortly, please contact support.";

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce `{ "error", "code" }` bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The payment provider failed. Carries the message safe to show users.
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// The provider confirmed a payment but activation could not be saved.
    #[error("Activation pending for {external_id}")]
    ActivationPending { external_id: String },
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, key } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} '{key}' not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Configuration(msg) => {
                    tracing::error!(error = %msg, "Service misconfigured");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "CONFIGURATION_ERROR",
                        "This service is not configured to take payments right now".to_string(),
                    )
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            AppError::Store(StoreError::Database(err)) => classify_sqlx_error(err),
            AppError::Store(StoreError::Unavailable(msg)) => {
                tracing::error!(error = %msg, "Store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "The service is temporarily unavailable".to_string(),
                )
            }

            AppError::Provider(msg) => (
                StatusCode::BAD_GATEWAY,
                "PAYMENT_PROVIDER_ERROR",
                msg.clone(),
            ),
            AppError::ActivationPending { external_id } => {
                tracing::error!(%external_id, "Confirmed payment could not be activated");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ACTIVATION_PENDING",
                    ACTIVATION_PENDING_MESSAGE.to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// Unique violations on `uq_` constraints map to 409; everything else is a
/// sanitized 500.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_maps_to_400() {
        let (status, body) =
            render(CoreError::Validation("amount must be positive".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"], "amount must be positive");
    }

    #[tokio::test]
    async fn configuration_error_hides_details() {
        let (status, body) =
            render(CoreError::Configuration("XENDIT_SECRET_KEY is not set".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "CONFIGURATION_ERROR");
        assert!(!body["error"].as_str().unwrap().contains("XENDIT"));
    }

    #[tokio::test]
    async fn activation_pending_is_distinct_from_payment_failure() {
        let (status, body) = render(AppError::ActivationPending {
            external_id: "dailywatch_u_1".into(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "ACTIVATION_PENDING");
        assert!(body["error"].as_str().unwrap().contains("contact support"));
    }

    #[tokio::test]
    async fn database_errors_are_sanitized() {
        let (status, body) = render(AppError::Store(StoreError::Database(
            sqlx::Error::Protocol("connection reset by peer".into()),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn unavailable_store_maps_to_503() {
        let (status, _) =
            render(AppError::Store(StoreError::Unavailable("offline".into()))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
