use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dailywatch_api::config::ServerConfig;
use dailywatch_api::router::build_app_router;
use dailywatch_api::state::{AppState, Services};
use dailywatch_core::clock::SystemClock;
use dailywatch_db::PgStore;
use dailywatch_events::{EventBus, NotificationDispatcher, TelegramConfig, TelegramDelivery};
use dailywatch_xendit::{PaymentProvider, XenditClient};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dailywatch_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        trial_failure_policy = %config.trial_failure_policy,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = dailywatch_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    dailywatch_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    dailywatch_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store = Arc::new(PgStore::new(pool));

    // --- Payment provider ---
    let provider: Option<Arc<dyn PaymentProvider>> = match &config.payment.secret_key {
        Some(key) => Some(Arc::new(XenditClient::new(
            config.payment.api_url.clone(),
            key.clone(),
        ))),
        None => {
            tracing::warn!("XENDIT_SECRET_KEY is not set; invoices and verification are disabled");
            None
        }
    };
    if config.payment.callback_token.is_none() {
        tracing::warn!("XENDIT_CALLBACK_TOKEN is not set; provider callbacks will be rejected");
    }

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();

    let dispatcher_handle = match TelegramConfig::from_env() {
        Some(telegram) => {
            let dispatcher = NotificationDispatcher::new(Arc::new(TelegramDelivery::new(telegram)));
            tracing::info!("Telegram notifications enabled");
            Some(tokio::spawn(
                dispatcher.run(event_bus.subscribe(), cancel.clone()),
            ))
        }
        None => {
            tracing::info!("Telegram notifications disabled");
            None
        }
    };

    // --- App state ---
    let state = AppState::new(
        config.clone(),
        Services {
            trials: store.clone(),
            billing: store,
            provider,
            event_bus: Arc::clone(&event_bus),
            clock: Arc::new(SystemClock),
        },
    );
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Dropping the last sender closes the bus; the dispatcher drains and exits.
    drop(event_bus);
    if let Some(handle) = dispatcher_handle {
        let timeout = Duration::from_secs(config.shutdown_timeout_secs);
        if tokio::time::timeout(timeout, handle).await.is_err() {
            tracing::warn!("Notification dispatcher did not stop in time, cancelling");
            cancel.cancel();
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
