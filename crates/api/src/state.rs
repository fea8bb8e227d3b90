use std::sync::Arc;

use dailywatch_core::clock::Clock;
use dailywatch_db::{BillingStore, TrialStore};
use dailywatch_events::EventBus;
use dailywatch_xendit::PaymentProvider;

use crate::config::ServerConfig;
use crate::engine::{InvoiceIssuer, PaymentActivator, TrialValidator};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub trials: Arc<dyn TrialStore>,
    pub billing: Arc<dyn BillingStore>,
    pub event_bus: Arc<EventBus>,
    pub clock: Arc<dyn Clock>,
    pub validator: Arc<TrialValidator>,
    pub invoices: Arc<InvoiceIssuer>,
    pub activator: Arc<PaymentActivator>,
}

/// Collaborators the state is assembled from.
pub struct Services {
    pub trials: Arc<dyn TrialStore>,
    pub billing: Arc<dyn BillingStore>,
    /// `None` when no provider secret key is configured.
    pub provider: Option<Arc<dyn PaymentProvider>>,
    pub event_bus: Arc<EventBus>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the engines to the given stores, provider, bus and clock.
    pub fn new(config: ServerConfig, services: Services) -> Self {
        let config = Arc::new(config);
        let Services {
            trials,
            billing,
            provider,
            event_bus,
            clock,
        } = services;

        let validator = Arc::new(TrialValidator::new(
            Arc::clone(&trials),
            Arc::clone(&billing),
            Arc::clone(&event_bus),
            Arc::clone(&clock),
            config.trial_failure_policy,
        ));
        let invoices = Arc::new(InvoiceIssuer::new(
            Arc::clone(&billing),
            provider.clone(),
            Arc::clone(&clock),
            config.app_base_url.clone(),
            config.payment.currency.clone(),
            config.payment.price,
        ));
        let activator = Arc::new(PaymentActivator::new(
            Arc::clone(&billing),
            provider,
            Arc::clone(&event_bus),
            Arc::clone(&clock),
            config.payment.currency.clone(),
            config.payment.price,
        ));

        Self {
            config,
            trials,
            billing,
            event_bus,
            clock,
            validator,
            invoices,
            activator,
        }
    }
}
