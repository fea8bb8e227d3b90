#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::{TimeZone, Utc};
use dailywatch_api::auth::jwt::{generate_access_token, JwtConfig};
use dailywatch_api::config::{PaymentConfig, ServerConfig};
use dailywatch_api::router::build_app_router;
use dailywatch_api::state::{AppState, Services};
use dailywatch_core::clock::ManualClock;
use dailywatch_core::trial::FailurePolicy;
use dailywatch_core::types::{Timestamp, UserId};
use dailywatch_db::MemoryStore;
use dailywatch_events::{EventBus, PlatformEvent};
use dailywatch_xendit::{
    CreateInvoiceRequest, Invoice, InvoiceStatus, PaymentProvider, XenditError,
};
use http_body_util::BodyExt;
use tokio::sync::broadcast;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret-for-integration-tests";
pub const CALLBACK_TOKEN: &str = "cb_test_token";

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        app_base_url: "http://localhost:5173".to_string(),
        trial_failure_policy: FailurePolicy::Closed,
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
        },
        payment: PaymentConfig {
            secret_key: Some("xnd_development_test".to_string()),
            callback_token: Some(CALLBACK_TOKEN.to_string()),
            api_url: "http://xendit.invalid".to_string(),
            currency: "PHP".to_string(),
            price: 49,
        },
    }
}

// ---------------------------------------------------------------------------
// Fake provider
// ---------------------------------------------------------------------------

/// In-process stand-in for the hosted-invoice provider.
///
/// Every created invoice is remembered and reported back by `find_invoice`
/// with the status set through [`FakeProvider::set_status`].
#[derive(Default)]
pub struct FakeProvider {
    invoices: Mutex<Vec<Invoice>>,
    status: Mutex<Option<InvoiceStatus>>,
    fail_create: AtomicBool,
    fail_find: AtomicBool,
    pub create_calls: AtomicUsize,
    pub find_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn set_status(&self, status: InvoiceStatus) {
        *self.status.lock().unwrap() = Some(status);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_find(&self, fail: bool) {
        self.fail_find.store(fail, Ordering::SeqCst);
    }

    pub fn create_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn find_count(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_invoice(&self, request: &CreateInvoiceRequest) -> Result<Invoice, XenditError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(XenditError::Api {
                status: 400,
                body: r#"{"error_code":"API_VALIDATION_ERROR","message":"amount is too small"}"#
                    .to_string(),
            });
        }

        let mut invoices = self.invoices.lock().unwrap();
        let id = format!("inv_{}", invoices.len() + 1);
        let invoice = Invoice {
            invoice_url: format!("https://checkout.xendit.test/web/{id}"),
            id,
            external_id: request.external_id.clone(),
            status: InvoiceStatus::Pending,
            amount: Some(request.amount as f64),
            currency: Some(request.currency.clone()),
            expiry_date: Some("2025-03-02T09:00:00.000Z".to_string()),
            raw: serde_json::json!({ "external_id": request.external_id }),
        };
        invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn find_invoice(&self, external_id: &str) -> Result<Option<Invoice>, XenditError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(XenditError::Decode("connection reset".to_string()));
        }

        let status = *self.status.lock().unwrap();
        let invoices = self.invoices.lock().unwrap();
        Ok(invoices
            .iter()
            .find(|i| i.external_id == external_id)
            .cloned()
            .map(|mut invoice| {
                if let Some(status) = status {
                    invoice.status = status;
                }
                invoice
            }))
    }
}

// ---------------------------------------------------------------------------
// Test app
// ---------------------------------------------------------------------------

/// A router wired to in-memory collaborators the test can inspect.
pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub provider: Arc<FakeProvider>,
    pub clock: Arc<ManualClock>,
    pub events: broadcast::Receiver<PlatformEvent>,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Events published so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<PlatformEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config(), true)
}

/// Build the full application router with all middleware layers.
///
/// `with_provider = false` simulates a deployment without a provider key.
pub fn build_test_app_with(config: ServerConfig, with_provider: bool) -> TestApp {
    let store = MemoryStore::new();
    let provider = Arc::new(FakeProvider::default());
    let clock = Arc::new(ManualClock::new(t0()));
    let event_bus = Arc::new(EventBus::default());
    let events = event_bus.subscribe();

    let provider_seam: Option<Arc<dyn PaymentProvider>> = if with_provider {
        Some(provider.clone() as Arc<dyn PaymentProvider>)
    } else {
        None
    };

    let state = AppState::new(
        config.clone(),
        Services {
            trials: Arc::new(store.clone()),
            billing: Arc::new(store.clone()),
            provider: provider_seam,
            event_bus,
            clock: clock.clone(),
        },
    );

    TestApp {
        router: build_app_router(state, &config),
        store,
        provider,
        clock,
        events,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn bearer(user_id: UserId) -> String {
    let config = JwtConfig {
        secret: JWT_SECRET.to_string(),
    };
    let token = generate_access_token(user_id, Some("viewer@example.com"), 60, &config).unwrap();
    format!("Bearer {token}")
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, user_id: UserId) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", bearer(user_id))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// POST a JSON body with extra headers.
pub async fn post_json_with(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    headers: &[(&str, String)],
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_json_with(app, uri, body, &[]).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    user_id: UserId,
) -> Response<Body> {
    post_json_with(app, uri, body, &[("authorization", bearer(user_id))]).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

/// Start a fresh trial and return its token.
pub async fn start_trial(app: &TestApp) -> String {
    let response = post_json(app.app(), "/api/v1/trial/sessions", serde_json::json!({})).await;
    assert_eq!(response.status(), 200);
    body_json(response).await["data"]["session_token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Validate `token` as `fingerprint` from `ip` and return the JSON verdict.
pub async fn validate(app: &TestApp, token: &str, fingerprint: &str, ip: &str) -> serde_json::Value {
    let response = post_json(
        app.app(),
        "/api/v1/trial/validate",
        serde_json::json!({
            "sessionId": token,
            "fingerprint": fingerprint,
            "ipAddress": ip,
            "userAgent": "Mozilla/5.0",
        }),
    )
    .await;
    assert_eq!(response.status(), 200);
    body_json(response).await
}

/// Issue an invoice for `user` and return its external id.
pub async fn issue_invoice(app: &TestApp, user: UserId) -> String {
    let response = post_json_auth(
        app.app(),
        "/api/v1/payments/invoices",
        serde_json::json!({
            "userId": user,
            "email": "viewer@example.com",
            "amount": 49,
            "description": "DailyWatch lifetime access",
        }),
        user,
    )
    .await;
    assert_eq!(response.status(), 200);
    body_json(response).await["data"]["external_id"]
        .as_str()
        .unwrap()
        .to_string()
}
