//! Hosted-invoice creation.
//!
//! Every attempt, successful or not, leaves a `payment_attempts` row and an
//! activity entry. Validation and configuration failures leave nothing and
//! never reach the provider.

use std::sync::Arc;

use dailywatch_core::clock::Clock;
use dailywatch_core::error::CoreError;
use dailywatch_core::payment::{self, actions, PaymentStatus};
use dailywatch_core::types::UserId;
use dailywatch_db::models::activity_log::CreateActivityLog;
use dailywatch_db::models::payment_attempt::CreatePaymentAttempt;
use dailywatch_db::BillingStore;
use dailywatch_xendit::{CreateInvoiceRequest, PaymentProvider, XenditError};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;

/// Body of `POST /payments/invoices`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    pub user_id: Option<UserId>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: Option<i64>,
    #[validate(length(min = 1, max = 255, message = "description must not be empty"))]
    pub description: Option<String>,
}

/// What the caller gets back: where to pay and how to find the attempt.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedInvoice {
    pub external_id: String,
    pub invoice_id: String,
    pub invoice_url: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
}

/// Fields of a request that passed validation.
#[derive(Debug)]
struct ValidInvoice {
    user_id: UserId,
    email: String,
    amount: i64,
    description: String,
}

pub struct InvoiceIssuer {
    billing: Arc<dyn BillingStore>,
    provider: Option<Arc<dyn PaymentProvider>>,
    clock: Arc<dyn Clock>,
    app_base_url: String,
    currency: String,
    price: i64,
}

impl InvoiceIssuer {
    pub fn new(
        billing: Arc<dyn BillingStore>,
        provider: Option<Arc<dyn PaymentProvider>>,
        clock: Arc<dyn Clock>,
        app_base_url: String,
        currency: String,
        price: i64,
    ) -> Self {
        Self {
            billing,
            provider,
            clock,
            app_base_url,
            currency,
            price,
        }
    }

    pub async fn create(
        &self,
        caller: &AuthUser,
        request: InvoiceRequest,
        ip_address: Option<String>,
    ) -> Result<IssuedInvoice, AppError> {
        let input = validate(request)?;
        caller.ensure_is(input.user_id)?;
        ensure_price(input.amount, self.price, &self.currency)?;

        let provider = self.provider.as_ref().ok_or_else(|| {
            CoreError::Configuration("XENDIT_SECRET_KEY is not set; cannot issue invoices".into())
        })?;

        if let Some(existing) = self.billing.find_subscription(input.user_id).await? {
            if existing.is_active() {
                return Err(CoreError::Conflict("Lifetime access is already active".into()).into());
            }
        }

        let external_id = payment::external_id_for(input.user_id, self.clock.now());
        let provider_request = CreateInvoiceRequest {
            external_id: external_id.clone(),
            amount: input.amount,
            currency: self.currency.clone(),
            description: input.description.clone(),
            payer_email: input.email.clone(),
            success_redirect_url: format!(
                "{}/payment/success?external_id={external_id}",
                self.app_base_url
            ),
            failure_redirect_url: format!("{}/payment", self.app_base_url),
            invoice_duration: payment::INVOICE_DURATION_SECS,
        };

        match provider.create_invoice(&provider_request).await {
            Ok(invoice) => {
                let attempt = self
                    .billing
                    .insert_attempt(&CreatePaymentAttempt {
                        external_id: external_id.clone(),
                        user_id: input.user_id,
                        user_email: input.email.clone(),
                        amount: input.amount,
                        currency: self.currency.clone(),
                        description: input.description.clone(),
                        status: PaymentStatus::Created,
                        invoice_id: Some(invoice.id.clone()),
                        invoice_url: Some(invoice.invoice_url.clone()),
                        ip_address: ip_address.clone(),
                        raw_provider_response: Some(invoice.raw.clone()),
                    })
                    .await?;
                self.billing.ensure_pending_subscription(input.user_id).await?;
                self.billing
                    .append_activity(&CreateActivityLog {
                        user_id: Some(input.user_id),
                        action: actions::INVOICE_CREATED.to_string(),
                        details: Some(serde_json::json!({
                            "external_id": external_id,
                            "invoice_id": invoice.id,
                            "amount": input.amount,
                            "currency": self.currency,
                        })),
                        ip_address,
                    })
                    .await?;

                tracing::info!(
                    user_id = %input.user_id,
                    external_id = %attempt.external_id,
                    invoice_id = %invoice.id,
                    "Invoice created"
                );

                Ok(IssuedInvoice {
                    external_id: attempt.external_id,
                    invoice_id: invoice.id,
                    invoice_url: invoice.invoice_url,
                    amount: attempt.amount,
                    currency: attempt.currency,
                    status: PaymentStatus::Created,
                    expiry_date: invoice.expiry_date,
                })
            }
            Err(e) => {
                self.record_failure(&input, &external_id, &e, ip_address).await;
                Err(AppError::Provider(payment::INVOICE_FAILED_MESSAGE.to_string()))
            }
        }
    }

    /// Keep an audit trail of a rejected invoice. Store errors here are
    /// logged only, so the caller still sees the provider failure.
    async fn record_failure(
        &self,
        input: &ValidInvoice,
        external_id: &str,
        error: &XenditError,
        ip_address: Option<String>,
    ) {
        tracing::warn!(
            user_id = %input.user_id,
            external_id,
            error = %error,
            "Invoice creation rejected by provider"
        );

        let raw = error.raw_payload();
        let attempt = CreatePaymentAttempt {
            external_id: external_id.to_string(),
            user_id: input.user_id,
            user_email: input.email.clone(),
            amount: input.amount,
            currency: self.currency.clone(),
            description: input.description.clone(),
            status: PaymentStatus::Failed,
            invoice_id: None,
            invoice_url: None,
            ip_address: ip_address.clone(),
            raw_provider_response: Some(raw.clone()),
        };
        if let Err(e) = self.billing.insert_attempt(&attempt).await {
            tracing::error!(error = %e, external_id, "Failed to record failed payment attempt");
        }

        let entry = CreateActivityLog {
            user_id: Some(input.user_id),
            action: actions::INVOICE_FAILED.to_string(),
            details: Some(serde_json::json!({
                "external_id": external_id,
                "error": raw,
            })),
            ip_address,
        };
        if let Err(e) = self.billing.append_activity(&entry).await {
            tracing::error!(error = %e, external_id, "Failed to log invoice failure");
        }
    }
}

fn validate(request: InvoiceRequest) -> Result<ValidInvoice, AppError> {
    request
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    let missing = |field: &str| CoreError::Validation(format!("{field} is required"));
    let user_id = request.user_id.ok_or_else(|| missing("userId"))?;
    let amount = request.amount.ok_or_else(|| missing("amount"))?;
    let email = request
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| missing("email"))?;
    let description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| missing("description"))?;

    Ok(ValidInvoice {
        user_id,
        email,
        amount,
        description,
    })
}

/// Lifetime access has one price; any other amount is refused.
fn ensure_price(amount: i64, price: i64, currency: &str) -> Result<(), AppError> {
    if amount != price {
        return Err(CoreError::Validation(format!(
            "amount must be {price} {currency} for lifetime access"
        ))
        .into());
    }
    Ok(())
}
