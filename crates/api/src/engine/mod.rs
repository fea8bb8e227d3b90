//! Business engines behind the HTTP handlers.
//!
//! - [`TrialValidator`]: abuse check for anonymous trial sessions.
//! - [`InvoiceIssuer`]: creates provider invoices and records attempts.
//! - [`PaymentActivator`]: confirms payments and activates subscriptions
//!   exactly once.

pub mod activator;
pub mod invoice_issuer;
pub mod trial_validator;

pub use activator::{PaymentActivator, VerifyOutcome, VerifyRequest};
pub use invoice_issuer::{InvoiceIssuer, InvoiceRequest, IssuedInvoice};
pub use trial_validator::{TrialValidator, ValidationRequest};
