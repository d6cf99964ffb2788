//! External collaborator interfaces.
//!
//! Every network dependency of the pipeline sits behind one of these
//! traits so the submission flow can be exercised against fakes. Concrete
//! clients live in the submodules: [`platform`] (nursery platform API),
//! [`carrier`] (shipping rate service), [`stripe`] (payments), and
//! [`notify`] (transactional email).

pub mod carrier;
pub mod notify;
pub mod platform;
pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use verdant_core::{CustomerId, Email, LocationId, Money, OrderId, ProductId, PromotionId};

use crate::models::{
    Address, AddressValidation, CartLine, CreatedOrder, DiscountCandidate, OrderConfirmation,
    OrderPatch, OrderSnapshot, PackageBreakdown, PickupLocation, PickupSlot, ShippingRateOption,
    ZoneInfo,
};

pub use carrier::CarrierClient;
pub use notify::EmailNotifier;
pub use platform::PlatformClient;
pub use stripe::StripeGateway;

/// Errors surfaced by service collaborators.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP transport failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API returned an error response.
    #[error("api error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),
}

impl ServiceError {
    /// Whether an API failure looks like the platform's inventory guard
    /// firing during order creation (stock changed between check and
    /// commit). Callers re-surface this as a recoverable stock conflict.
    #[must_use]
    pub fn is_stock_guard(&self) -> bool {
        matches!(self, Self::Api { message, .. }
            if message.to_lowercase().contains("insufficient stock"))
    }
}

/// Live catalog data for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub available_quantity: u32,
}

/// Catalog reads: price reconciliation and stock validation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Current pricing and availability. May serve a short-lived cache.
    async fn fetch_product(&self, id: &ProductId) -> Result<CatalogProduct, ServiceError>;

    /// Live available quantity, never cached. Used by the pre-commit stock
    /// check.
    async fn available_quantity(&self, id: &ProductId) -> Result<u32, ServiceError>;
}

/// The remotely persisted cart for authenticated customers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    async fn get_cart(&self, customer: &CustomerId) -> Result<Vec<CartLine>, ServiceError>;

    async fn replace_cart(
        &self,
        customer: &CustomerId,
        lines: &[CartLine],
    ) -> Result<(), ServiceError>;
}

/// Result of validating a manually entered promotion code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum CodeEvaluation {
    Valid(DiscountCandidate),
    Invalid { message: String },
}

/// Server-side promotion evaluation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromotionEvaluator: Send + Sync {
    /// Best automatic promotion matching cart and customer, if any.
    async fn evaluate_auto(
        &self,
        lines: &[CartLine],
        customer: Option<CustomerId>,
    ) -> Result<Option<DiscountCandidate>, ServiceError>;

    /// Validate an entered code against the same eligibility rules.
    async fn evaluate_code(
        &self,
        lines: &[CartLine],
        code: &str,
        customer: Option<CustomerId>,
    ) -> Result<CodeEvaluation, ServiceError>;

    /// Record a redemption after finalize. Failure never blocks the order.
    async fn record_usage(
        &self,
        promotion: &PromotionId,
        order: &OrderId,
    ) -> Result<(), ServiceError>;
}

/// Carrier rates and package breakdown for a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub zone: ZoneInfo,
    pub options: Vec<ShippingRateOption>,
    pub packages: PackageBreakdown,
}

/// The carrier rate service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CarrierService: Send + Sync {
    async fn validate_address(&self, address: &Address) -> Result<AddressValidation, ServiceError>;

    /// Raw rates plus zone ruling; zone filtering happens in
    /// [`crate::shipping`].
    async fn fetch_rates(
        &self,
        address: &Address,
        lines: &[CartLine],
    ) -> Result<RateQuote, ServiceError>;
}

/// Pickup locations and their bookable slots.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PickupDirectory: Send + Sync {
    async fn list_locations(&self) -> Result<Vec<PickupLocation>, ServiceError>;

    async fn list_slots(
        &self,
        location: &LocationId,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    ) -> Result<Vec<PickupSlot>, ServiceError>;
}

/// A created payment intent awaiting confirmation by the hosted element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub client_secret: String,
}

/// Outcome surfaced by the hosted payment element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ConfirmOutcome {
    Succeeded,
    RequiresAction,
    Error { message: String },
}

/// The payment gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for the charge amount. Metadata ties the intent to
    /// the pending order for webhook reconciliation.
    async fn create_intent(
        &self,
        amount: Money,
        order: &OrderId,
        session_key: &str,
    ) -> Result<PaymentIntent, ServiceError>;

    /// Resolve the confirmation outcome for a created intent.
    async fn await_confirmation(&self, intent_id: &str) -> Result<ConfirmOutcome, ServiceError>;
}

/// Order persistence on the platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, snapshot: &OrderSnapshot) -> Result<CreatedOrder, ServiceError>;

    async fn update_order(&self, id: &OrderId, patch: OrderPatch) -> Result<(), ServiceError>;
}

/// Seedling buy-back program credit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Verified balance for a credit code; the payment layer applies at
    /// most this amount, never a client-supplied figure.
    async fn verify(&self, code: &str, customer: Option<CustomerId>) -> Result<Money, ServiceError>;

    /// Redeem an applied amount against an order after finalize.
    async fn redeem(&self, code: &str, order: &OrderId, amount: Money) -> Result<(), ServiceError>;
}

/// Transactional notifications. Fire-and-forget; failure never rolls back
/// an order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_order_confirmation(
        &self,
        email: &Email,
        confirmation: &OrderConfirmation,
    ) -> Result<(), ServiceError>;
}

/// Abandoned-cart snapshots keyed by a stable per-session identifier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AbandonedCartStore: Send + Sync {
    async fn upsert_snapshot(
        &self,
        session_key: &str,
        email: &Email,
        lines: &[CartLine],
    ) -> Result<(), ServiceError>;
}
