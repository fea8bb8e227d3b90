//! REST client for the Xendit invoices endpoints.

use async_trait::async_trait;

use crate::provider::PaymentProvider;
use crate::types::{CreateInvoiceRequest, Invoice};

/// Default production API base URL.
pub const DEFAULT_API_URL: &str = "https://api.xendit.co";

/// Errors from the invoices API layer.
#[derive(Debug, thiserror::Error)]
pub enum XenditError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("Xendit API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A 2xx body that does not match the expected shape.
    #[error("Unexpected Xendit response: {0}")]
    Decode(String),
}

impl XenditError {
    /// The provider's error payload as JSON, for the audit trail.
    pub fn raw_payload(&self) -> serde_json::Value {
        match self {
            XenditError::Api { status, body } => serde_json::from_str(body)
                .unwrap_or_else(|_| serde_json::json!({ "status": status, "body": body })),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

/// HTTP client authenticated with one secret key.
pub struct XenditClient {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl XenditClient {
    /// * `api_url` - Base URL, e.g. `https://api.xendit.co`.
    pub fn new(api_url: String, secret_key: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, secret_key)
    }

    pub fn with_client(client: reqwest::Client, api_url: String, secret_key: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    fn invoices_url(&self) -> String {
        format!("{}/v2/invoices", self.api_url)
    }

    /// Create a hosted invoice via `POST /v2/invoices`.
    pub async fn create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<Invoice, XenditError> {
        let response = self
            .client
            .post(self.invoices_url())
            .basic_auth(&self.secret_key, Some(""))
            .json(request)
            .send()
            .await?;

        let raw = Self::parse_json(response).await?;
        Self::invoice_from_raw(raw)
    }

    /// List invoices for an external id via `GET /v2/invoices?external_id=`.
    ///
    /// Returns the most recent one.
    pub async fn find_invoice(&self, external_id: &str) -> Result<Option<Invoice>, XenditError> {
        let response = self
            .client
            .get(self.invoices_url())
            .basic_auth(&self.secret_key, Some(""))
            .query(&[("external_id", external_id)])
            .send()
            .await?;

        let raw = Self::parse_json(response).await?;
        let serde_json::Value::Array(items) = raw else {
            return Err(XenditError::Decode("expected an array of invoices".into()));
        };
        items.into_iter().next().map(Self::invoice_from_raw).transpose()
    }

    // ---- private helpers ----

    async fn parse_json(response: reqwest::Response) -> Result<serde_json::Value, XenditError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), %body, "Xendit request rejected");
            return Err(XenditError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<serde_json::Value>().await?)
    }

    fn invoice_from_raw(raw: serde_json::Value) -> Result<Invoice, XenditError> {
        let mut invoice: Invoice =
            serde_json::from_value(raw.clone()).map_err(|e| XenditError::Decode(e.to_string()))?;
        invoice.raw = raw;
        Ok(invoice)
    }
}

#[async_trait]
impl PaymentProvider for XenditClient {
    async fn create_invoice(&self, request: &CreateInvoiceRequest) -> Result<Invoice, XenditError> {
        XenditClient::create_invoice(self, request).await
    }

    async fn find_invoice(&self, external_id: &str) -> Result<Option<Invoice>, XenditError> {
        XenditClient::find_invoice(self, external_id).await
    }
}
