//! Xendit invoices API client.
//!
//! - [`XenditClient`]: REST wrapper for creating and looking up invoices.
//! - [`PaymentProvider`]: the seam the API engines call, implemented by
//!   [`XenditClient`] and by test fakes.
//! - [`callback`]: verification of provider-initiated invoice callbacks.

pub mod api;
pub mod callback;
pub mod provider;
pub mod types;

pub use api::{XenditClient, XenditError};
pub use provider::PaymentProvider;
pub use types::{CreateInvoiceRequest, Invoice, InvoiceCallback, InvoiceStatus};
