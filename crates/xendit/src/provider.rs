//! The payment-provider seam.

use async_trait::async_trait;

use crate::api::XenditError;
use crate::types::{CreateInvoiceRequest, Invoice};

/// Operations the billing engines need from a hosted-invoice provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_invoice(&self, request: &CreateInvoiceRequest) -> Result<Invoice, XenditError>;

    /// Look up the invoice issued for `external_id`. `None` if the provider
    /// has no such invoice.
    async fn find_invoice(&self, external_id: &str) -> Result<Option<Invoice>, XenditError>;
}
