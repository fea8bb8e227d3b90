//! Route definitions for payments.
//!
//! Mounted at `/payments`.
//!
//! ```text
//! POST /invoices   create_invoice   (auth required)
//! POST /verify     verify_payment   (auth required)
//! POST /callback   callback         (callback token required)
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::payment;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invoices", post(payment::create_invoice))
        .route("/verify", post(payment::verify_payment))
        .route("/callback", post(payment::callback))
}
