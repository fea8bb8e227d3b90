pub mod health;
pub mod payment;
pub mod trial;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /trial/sessions                      start or resume a trial
/// /trial/sessions/{token}              session view
/// /trial/sessions/{token}/videos       count a watched video
/// /trial/validate                      abuse check
///
/// /watch                               watch gate (trial or subscription)
/// /videos/resolve                      parse a Dailymotion link
///
/// /payments/invoices                   create invoice (auth required)
/// /payments/verify                     confirm a payment (auth required)
/// /payments/callback                   provider webhook
///
/// /subscription                        caller's subscription (auth required)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/trial", trial::router())
        .nest("/payments", payment::router())
        .route("/watch", post(handlers::watch::watch))
        .route("/videos/resolve", get(handlers::watch::resolve_video))
        .route("/subscription", get(handlers::payment::get_subscription))
}
