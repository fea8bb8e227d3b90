//! Typed HTTP client for the `/api/v1` surface.

use dailywatch_core::trial::TrialVerdict;
use dailywatch_core::types::UserId;
use dailywatch_core::video::ResolvedVideo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::types::{
    Data, Invoice, InvoiceRequest, SubscriptionView, TrialSessionView, ValidateTrial,
    VerifyOutcome, WatchGrant,
};

/// Client for one API deployment, optionally carrying a user's access token.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl ApiClient {
    /// * `base_url` - Server origin, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    /// Attach the bearer token used by authenticated endpoints.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    // ---- trial ----

    /// Resume the session for `token`, or start a new one.
    pub async fn get_or_create_session(
        &self,
        token: Option<&str>,
    ) -> Result<TrialSessionView, ClientError> {
        let body = json!({ "session_token": token });
        self.post_data("/trial/sessions", &body).await
    }

    pub async fn get_session(&self, token: &str) -> Result<TrialSessionView, ClientError> {
        self.get_data(&format!("/trial/sessions/{token}")).await
    }

    pub async fn validate_trial(&self, request: &ValidateTrial) -> Result<TrialVerdict, ClientError> {
        let response = self
            .client
            .post(self.url("/trial/validate"))
            .json(request)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn increment_video_count(&self, token: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url(&format!("/trial/sessions/{token}/videos")))
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    /// Count a watched video in the background. Failures are only logged.
    pub fn spawn_increment_video_count(&self, token: &str) -> JoinHandle<()> {
        let client = self.clone();
        let token = token.to_string();
        tokio::spawn(async move {
            if let Err(e) = client.increment_video_count(&token).await {
                tracing::debug!(error = %e, session_token = %token, "Video count not recorded");
            }
        })
    }

    // ---- videos ----

    pub async fn watch(&self, input: &str, session_token: Option<&str>) -> Result<WatchGrant, ClientError> {
        let body = json!({ "input": input, "sessionId": session_token });
        self.post_data("/watch", &body).await
    }

    pub async fn resolve_video(&self, input: &str) -> Result<ResolvedVideo, ClientError> {
        let response = self
            .client
            .get(self.url("/videos/resolve"))
            .query(&[("input", input)])
            .send()
            .await?;
        Self::parse::<Data<ResolvedVideo>>(response).await.map(|d| d.data)
    }

    // ---- payments ----

    pub async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, ClientError> {
        self.post_data("/payments/invoices", request).await
    }

    pub async fn verify_payment(
        &self,
        external_id: &str,
        user_id: UserId,
    ) -> Result<VerifyOutcome, ClientError> {
        let body = json!({ "externalId": external_id, "userId": user_id });
        let response = self
            .authorized(self.client.post(self.url("/payments/verify")))
            .json(&body)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn subscription(&self) -> Result<SubscriptionView, ClientError> {
        self.get_data("/subscription").await
    }

    // ---- private helpers ----

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.authorized(self.client.get(self.url(path))).send().await?;
        Self::parse::<Data<T>>(response).await.map(|d| d.data)
    }

    async fn post_data<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .authorized(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await?;
        Self::parse::<Data<T>>(response).await.map(|d| d.data)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), %body, "API request rejected");
        Err(ClientError::from_response(status.as_u16(), &body))
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let text = Self::check(response).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }
}
