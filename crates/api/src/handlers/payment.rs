//! Handlers for invoices, payment verification, provider callbacks and
//! subscription lookup.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use dailywatch_core::error::CoreError;
use dailywatch_core::payment::PaymentStatus;
use dailywatch_db::models::subscription::Subscription;
use dailywatch_xendit::callback::{verify_callback_token, CALLBACK_TOKEN_HEADER};
use dailywatch_xendit::{InvoiceCallback, InvoiceStatus};
use serde::Serialize;
use serde_json::{json, Value};

use crate::engine::{InvoiceRequest, IssuedInvoice, VerifyOutcome, VerifyRequest};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::client_ip::ClientIp;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/payments/invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    client_ip: ClientIp,
    Json(body): Json<InvoiceRequest>,
) -> AppResult<Json<DataResponse<IssuedInvoice>>> {
    let issued = state.invoices.create(&user, body, client_ip.0).await?;
    Ok(Json(DataResponse { data: issued }))
}

/// POST /api/v1/payments/verify
///
/// Safe to call repeatedly; only the first confirmation activates.
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    client_ip: ClientIp,
    Json(body): Json<VerifyRequest>,
) -> AppResult<Json<VerifyOutcome>> {
    let outcome = state.activator.verify(&user, body, client_ip.0).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/payments/callback
///
/// Invoice status webhook. Requests without the configured callback token
/// are rejected before the body is parsed. Known statuses for unknown
/// invoices are acknowledged so the provider stops retrying.
pub async fn callback(
    State(state): State<AppState>,
    client_ip: ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let expected = state.config.payment.callback_token.as_deref().unwrap_or("");
    let provided = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if !verify_callback_token(expected, provided) {
        tracing::warn!(ip = ?client_ip.0, "Rejected callback with bad token");
        return Err(CoreError::Unauthorized("Invalid callback token".into()).into());
    }

    let body: InvoiceCallback = serde_json::from_slice(&body)
        .map_err(|e| CoreError::Validation(format!("Malformed callback body: {e}")))?;

    let external_id = body.external_id.as_str();
    let result = match body.status {
        status if status.is_paid() => state
            .activator
            .activate(external_id, client_ip.0)
            .await
            .map(|_| ()),
        InvoiceStatus::Expired => state.activator.mark(external_id, PaymentStatus::Expired).await,
        InvoiceStatus::Pending => state.activator.mark(external_id, PaymentStatus::Pending).await,
        _ => {
            tracing::debug!(external_id, invoice_id = %body.id, "Ignoring callback status");
            Ok(())
        }
    };

    match result {
        Ok(()) => {}
        Err(AppError::Core(CoreError::NotFound { .. })) => {
            tracing::warn!(external_id, "Callback for unknown payment");
        }
        Err(e) => return Err(e),
    }

    Ok(Json(json!({ "received": true })))
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub subscription: Option<Subscription>,
    pub has_access: bool,
}

/// GET /api/v1/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<SubscriptionView>>> {
    let subscription = state.billing.find_subscription(user.user_id).await?;
    let has_access = subscription.as_ref().is_some_and(Subscription::is_active);
    Ok(Json(DataResponse {
        data: SubscriptionView {
            subscription,
            has_access,
        },
    }))
}
