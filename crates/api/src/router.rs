//! Shared application router builder.
//!
//! Provides [`build_app_router`] so the binary (`main.rs`) and integration
//! tests (`tests/common/mod.rs`) run the same middleware stack.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

/// Build the full application [`Router`] with all middleware layers.
///
/// The middleware stack is applied bottom-up:
///
/// 1. CORS
/// 2. Set request ID on incoming requests
/// 3. Structured request/response tracing
/// 4. Propagate request ID to response
/// 5. Request timeout
/// 6. Panic recovery (catch panics, return 500)
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = build_cors_layer(config);
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        // Health check for the load balancer, outside the versioned API.
        .merge(routes::health::router())
        // Trial, watch, payment and subscription endpoints.
        .nest("/api/v1", routes::api_routes())
        // -- Middleware, outermost last --
        // A panicking handler becomes a 500 instead of a dropped connection.
        .layer(CatchPanicLayer::new())
        // Provider calls share this budget; a hung invoice request ends as 408.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Echo the request id so clients can quote it in support requests.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // One INFO span per request, carrying the request id.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Keep an inbound x-request-id, otherwise mint a UUID.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // Browser origins from CORS_ORIGINS.
        .layer(cors)
        .with_state(state)
}

/// Build the CORS middleware layer from server configuration.
///
/// Only GET and POST are routed. `x-callback-token` is listed so provider
/// test consoles running in a browser can reach the callback endpoint.
///
/// Panics at startup if any configured origin is invalid.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        // Bearer tokens from the auth provider, plus the callback secret.
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-callback-token"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
