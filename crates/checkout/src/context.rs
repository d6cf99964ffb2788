//! Shared checkout context.

use std::sync::Arc;

use crate::config::CheckoutConfig;
use crate::services::{
    AbandonedCartStore, CarrierClient, CarrierService, CatalogService, CreditLedger,
    EmailNotifier, NotificationService, OrderStore, PaymentGateway, PickupDirectory,
    PlatformClient, PromotionEvaluator, RemoteCartStore, StripeGateway,
};

/// Service wiring for one checkout deployment.
///
/// Cheaply cloneable via `Arc`. Production code builds it from
/// [`CheckoutConfig`]; tests inject fakes through [`Services`].
#[derive(Clone)]
pub struct CheckoutContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: CheckoutConfig,
    services: Services,
}

/// The full set of external collaborators behind the pipeline.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn CatalogService>,
    pub remote_cart: Arc<dyn RemoteCartStore>,
    pub promotions: Arc<dyn PromotionEvaluator>,
    pub carrier: Arc<dyn CarrierService>,
    pub pickup: Arc<dyn PickupDirectory>,
    pub payments: Arc<dyn PaymentGateway>,
    pub orders: Arc<dyn OrderStore>,
    pub credits: Arc<dyn CreditLedger>,
    pub notifications: Arc<dyn NotificationService>,
    pub abandoned_carts: Arc<dyn AbandonedCartStore>,
}

impl CheckoutContext {
    /// Build the production wiring from configuration.
    ///
    /// The platform client is shared by every platform-backed concern so
    /// its product cache and connection pool are shared too.
    #[must_use]
    pub fn new(config: CheckoutConfig) -> Self {
        let platform = Arc::new(PlatformClient::new(&config.platform));
        let carrier = Arc::new(CarrierClient::new(&config.carrier, config.seedlings_per_box));
        let payments = Arc::new(StripeGateway::new(config.stripe_secret_key.clone()));
        let notifications = Arc::new(EmailNotifier::new(&config.platform));

        let services = Services {
            catalog: platform.clone(),
            remote_cart: platform.clone(),
            promotions: platform.clone(),
            carrier,
            pickup: platform.clone(),
            payments,
            orders: platform.clone(),
            credits: platform.clone(),
            notifications,
            abandoned_carts: platform,
        };

        Self::with_services(config, services)
    }

    /// Build a context over explicit service implementations.
    #[must_use]
    pub fn with_services(config: CheckoutConfig, services: Services) -> Self {
        Self {
            inner: Arc::new(ContextInner { config, services }),
        }
    }

    /// Get a reference to the checkout configuration.
    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    /// Get the service wiring.
    #[must_use]
    pub fn services(&self) -> &Services {
        &self.inner.services
    }
}
