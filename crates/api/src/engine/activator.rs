//! Payment confirmation and subscription activation.
//!
//! Both the user-facing verify call and the provider callback end in
//! [`BillingStore::activate`], whose compare-and-set on the attempt status
//! picks exactly one winner. Only the winner publishes `payment.completed`.
//! Attempts whose amount or currency differ from the lifetime price are
//! failed instead of activated.

use std::sync::Arc;

use dailywatch_core::clock::Clock;
use dailywatch_core::error::CoreError;
use dailywatch_core::payment::PaymentStatus;
use dailywatch_core::types::UserId;
use dailywatch_db::models::subscription::{Activation, ActivationOutcome};
use dailywatch_db::BillingStore;
use dailywatch_events::{event_types, EventBus, PlatformEvent};
use dailywatch_xendit::{InvoiceStatus, PaymentProvider};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::auth::AuthUser;

/// Body of `POST /payments/verify`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub external_id: String,
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyOutcome {
    pub success: bool,
    pub status: PaymentStatus,
}

impl VerifyOutcome {
    fn paid() -> Self {
        Self {
            success: true,
            status: PaymentStatus::Paid,
        }
    }

    fn unsettled(status: PaymentStatus) -> Self {
        Self {
            success: false,
            status,
        }
    }
}

pub struct PaymentActivator {
    billing: Arc<dyn BillingStore>,
    provider: Option<Arc<dyn PaymentProvider>>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    currency: String,
    price: i64,
}

impl PaymentActivator {
    pub fn new(
        billing: Arc<dyn BillingStore>,
        provider: Option<Arc<dyn PaymentProvider>>,
        event_bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        currency: String,
        price: i64,
    ) -> Self {
        Self {
            billing,
            provider,
            event_bus,
            clock,
            currency,
            price,
        }
    }

    /// Verify a payment the user says they completed and activate their
    /// subscription if the provider confirms it.
    pub async fn verify(
        &self,
        caller: &AuthUser,
        request: VerifyRequest,
        ip_address: Option<String>,
    ) -> Result<VerifyOutcome, AppError> {
        caller.ensure_is(request.user_id)?;
        let external_id = request.external_id.trim();

        let attempt = self
            .billing
            .find_attempt(external_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Payment", external_id))?;
        if attempt.user_id != request.user_id {
            return Err(CoreError::Forbidden("This payment belongs to another account".into()).into());
        }

        let status = attempt
            .payment_status()
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        match status {
            PaymentStatus::Paid => return Ok(VerifyOutcome::paid()),
            PaymentStatus::Failed | PaymentStatus::Expired => {
                return Ok(VerifyOutcome::unsettled(status))
            }
            PaymentStatus::Created | PaymentStatus::Pending => {}
        }

        let provider = self.provider.as_ref().ok_or_else(|| {
            CoreError::Configuration("XENDIT_SECRET_KEY is not set; cannot verify payments".into())
        })?;

        let invoice = provider.find_invoice(external_id).await.map_err(|e| {
            tracing::warn!(external_id, error = %e, "Could not confirm payment with provider");
            AppError::Provider("Could not confirm your payment right now. Please try again.".into())
        })?;

        let Some(invoice) = invoice else {
            tracing::warn!(external_id, "Provider has no invoice for this payment");
            return Ok(VerifyOutcome::unsettled(status));
        };

        match invoice.status {
            s if s.is_paid() => self.activate(external_id, ip_address).await,
            InvoiceStatus::Pending => {
                self.mark(external_id, PaymentStatus::Pending).await?;
                Ok(VerifyOutcome::unsettled(PaymentStatus::Pending))
            }
            InvoiceStatus::Expired => {
                self.mark(external_id, PaymentStatus::Expired).await?;
                Ok(VerifyOutcome::unsettled(PaymentStatus::Expired))
            }
            _ => Ok(VerifyOutcome::unsettled(status)),
        }
    }

    /// Apply an already-confirmed payment (verified callback or provider
    /// re-check). Idempotent.
    pub async fn activate(
        &self,
        external_id: &str,
        ip_address: Option<String>,
    ) -> Result<VerifyOutcome, AppError> {
        let pending = |e: &dyn std::fmt::Display| {
            tracing::error!(external_id, error = %e, "Failed to persist confirmed payment");
            AppError::ActivationPending {
                external_id: external_id.to_string(),
            }
        };

        let attempt = self
            .billing
            .find_attempt(external_id)
            .await
            .map_err(|e| pending(&e))?
            .ok_or_else(|| CoreError::not_found("Payment", external_id))?;
        if attempt.is_open() && !self.is_lifetime_price(attempt.amount, &attempt.currency) {
            tracing::error!(
                external_id,
                user_id = %attempt.user_id,
                amount = attempt.amount,
                currency = %attempt.currency,
                "Paid amount does not match the lifetime price; not activating"
            );
            self.mark(external_id, PaymentStatus::Failed).await?;
            return Ok(VerifyOutcome::unsettled(PaymentStatus::Failed));
        }

        let activation = Activation {
            external_id: external_id.to_string(),
            paid_at: self.clock.now(),
            ip_address,
        };

        let outcome = self
            .billing
            .activate(&activation)
            .await
            .map_err(|e| pending(&e))?;

        match outcome {
            ActivationOutcome::Activated {
                attempt,
                subscription,
            } => {
                tracing::info!(
                    external_id,
                    user_id = %attempt.user_id,
                    subscription_id = subscription.id,
                    "Subscription activated"
                );
                self.event_bus.publish(
                    PlatformEvent::new(event_types::PAYMENT_COMPLETED)
                        .with_source("payment_attempt", attempt.external_id.clone())
                        .with_actor(attempt.user_id)
                        .with_payload(serde_json::json!({
                            "external_id": attempt.external_id,
                            "email": attempt.user_email,
                            "amount": attempt.amount,
                            "currency": attempt.currency,
                        })),
                );
                Ok(VerifyOutcome::paid())
            }
            ActivationOutcome::AlreadyPaid { .. } => {
                tracing::debug!(external_id, "Payment already activated");
                Ok(VerifyOutcome::paid())
            }
            ActivationOutcome::Unpayable(attempt) => {
                tracing::warn!(
                    external_id,
                    status = %attempt.status,
                    "Confirmed payment for an attempt that can no longer be paid"
                );
                let status = attempt
                    .payment_status()
                    .map_err(|e| CoreError::Internal(e.to_string()))?;
                Ok(VerifyOutcome::unsettled(status))
            }
            ActivationOutcome::NotFound => Err(CoreError::not_found("Payment", external_id).into()),
        }
    }

    fn is_lifetime_price(&self, amount: i64, currency: &str) -> bool {
        amount == self.price && currency.eq_ignore_ascii_case(&self.currency)
    }

    /// Record a non-paid provider status. A lost race is not an error.
    pub async fn mark(&self, external_id: &str, to: PaymentStatus) -> Result<(), AppError> {
        if self.billing.transition_attempt(external_id, to).await?.is_some() {
            tracing::info!(external_id, status = %to, "Payment attempt status updated");
        }
        Ok(())
    }
}
