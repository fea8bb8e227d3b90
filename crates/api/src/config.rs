use dailywatch_core::payment::{DEFAULT_CURRENCY, LIFETIME_PRICE};
use dailywatch_core::trial::FailurePolicy;
use dailywatch_xendit::api::DEFAULT_API_URL;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks (default: `5`).
    pub shutdown_timeout_secs: u64,
    /// Public origin of the web app, used in payment redirect URLs.
    pub app_base_url: String,
    /// Verdict returned by the trial validator when its store fails.
    pub trial_failure_policy: FailurePolicy,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `5`                     |
    /// | `APP_BASE_URL`          | `http://localhost:5173` |
    /// | `TRIAL_FAILURE_POLICY`  | `closed`                |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let app_base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .trim_end_matches('/')
            .to_string();

        let trial_failure_policy = std::env::var("TRIAL_FAILURE_POLICY")
            .map(|v| v.parse().unwrap_or_else(|e: String| panic!("{e}")))
            .unwrap_or_default();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            app_base_url,
            trial_failure_policy,
            jwt: JwtConfig::from_env(),
            payment: PaymentConfig::from_env(),
        }
    }
}

/// Payment provider settings.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Provider secret key. Invoices cannot be issued without it.
    pub secret_key: Option<String>,
    /// Token the provider sends with callbacks. Callbacks are rejected
    /// without it.
    pub callback_token: Option<String>,
    pub api_url: String,
    pub currency: String,
    /// Price of lifetime access, in whole units of `currency`.
    pub price: i64,
}

impl PaymentConfig {
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `XENDIT_SECRET_KEY`     | unset                   |
    /// | `XENDIT_CALLBACK_TOKEN` | unset                   |
    /// | `XENDIT_API_URL`        | `https://api.xendit.co` |
    /// | `PAYMENT_CURRENCY`      | `PHP`                   |
    /// | `LIFETIME_PRICE`        | `49`                    |
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            secret_key: non_empty("XENDIT_SECRET_KEY"),
            callback_token: non_empty("XENDIT_CALLBACK_TOKEN"),
            api_url: non_empty("XENDIT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            currency: non_empty("PAYMENT_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.into()),
            price: non_empty("LIFETIME_PRICE")
                .map(|v| parse_price(&v).expect("LIFETIME_PRICE must be a positive integer"))
                .unwrap_or(LIFETIME_PRICE),
        }
    }
}

fn parse_price(raw: &str) -> Option<i64> {
    raw.trim().parse().ok().filter(|p| *p > 0)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
