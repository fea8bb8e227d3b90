//! Route definitions for anonymous trials.
//!
//! Mounted at `/trial`.
//!
//! ```text
//! POST /sessions                  create_session
//! GET  /sessions/{token}          get_session
//! POST /sessions/{token}/videos   record_video
//! POST /validate                  validate
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::trial;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(trial::create_session))
        .route("/sessions/{token}", get(trial::get_session))
        .route("/sessions/{token}/videos", post(trial::record_video))
        .route("/validate", post(trial::validate))
}
