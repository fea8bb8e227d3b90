//! Request and response shapes of the invoices API.

use serde::{Deserialize, Serialize};

/// Invoice status as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Settled,
    Expired,
    #[serde(other)]
    Unknown,
}

impl InvoiceStatus {
    /// Funds were captured. `SETTLED` follows `PAID` once disbursed.
    pub fn is_paid(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Settled)
    }
}

/// Body of `POST /v2/invoices`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateInvoiceRequest {
    pub external_id: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub payer_email: String,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
    pub invoice_duration: i64,
}

/// An invoice as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub external_id: String,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    pub invoice_url: String,
    #[serde(default)]
    pub expiry_date: Option<String>,
    /// The full response body, kept for the audit trail.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// Body of an invoice callback posted by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceCallback {
    pub id: String,
    pub external_id: String,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub payer_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_invoice_response() {
        let json = r#"{
            "id": "579c8d61f23fa4ca35e52da4",
            "external_id": "dailywatch_u_1",
            "status": "PENDING",
            "amount": 49,
            "currency": "PHP",
            "invoice_url": "https://checkout.xendit.co/web/579c8d61f23fa4ca35e52da4",
            "expiry_date": "2025-03-02T09:00:00.000Z",
            "merchant_name": "DailyWatch"
        }"#;
        let invoice: Invoice = serde_json::from_str(json).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.amount, Some(49.0));
        assert!(invoice.raw.is_null());
    }

    #[test]
    fn paid_and_settled_count_as_paid() {
        for (raw, paid) in [("PAID", true), ("SETTLED", true), ("PENDING", false), ("EXPIRED", false)] {
            let status: InvoiceStatus = serde_json::from_value(serde_json::json!(raw)).unwrap();
            assert_eq!(status.is_paid(), paid, "{raw}");
        }
    }

    #[test]
    fn unknown_status_does_not_fail_parsing() {
        let status: InvoiceStatus = serde_json::from_value(serde_json::json!("VOIDED")).unwrap();
        assert_eq!(status, InvoiceStatus::Unknown);
    }

    #[test]
    fn parse_callback() {
        let json = r#"{"id":"inv_1","external_id":"dailywatch_u_1","status":"PAID","paid_at":"2025-03-01T09:10:00.000Z","amount":49}"#;
        let callback: InvoiceCallback = serde_json::from_str(json).unwrap();
        assert!(callback.status.is_paid());
        assert_eq!(callback.external_id, "dailywatch_u_1");
    }
}
