//! Integration test harness for the checkout pipeline.
//!
//! Provides in-memory fakes for every external collaborator and a
//! [`TestHarness`] that wires them into a [`CheckoutContext`], so the
//! scenario tests in `tests/` can drive full submissions without any
//! network.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::SecretString;

use verdant_core::{CustomerId, Email, LocationId, Money, OrderId, ProductId, PromotionId};

use verdant_checkout::cart::{CartStore, InMemoryCartCache};
use verdant_checkout::config::{CarrierConfig, CheckoutConfig, PlatformConfig};
use verdant_checkout::context::{CheckoutContext, Services};
use verdant_checkout::models::{
    Address, AddressValidation, CartLine, CreatedOrder, DiscountCandidate, FulfillmentConstraint,
    OrderConfirmation, OrderPatch, OrderSnapshot, PackageBreakdown, PickupLocation, PickupSlot,
    ShippingRateOption, ZoneInfo, ZoneStatus,
};
use verdant_checkout::services::{
    AbandonedCartStore, CarrierService, CatalogProduct, CatalogService, CodeEvaluation,
    ConfirmOutcome, CreditLedger, NotificationService, OrderStore, PaymentGateway, PaymentIntent,
    PickupDirectory, PromotionEvaluator, RemoteCartStore, ServiceError, RateQuote,
};
use verdant_checkout::tax::TaxConfig;

// =============================================================================
// Catalog
// =============================================================================

#[derive(Default)]
pub struct FakeCatalog {
    products: Mutex<HashMap<ProductId, CatalogProduct>>,
}

impl FakeCatalog {
    pub fn insert(&self, id: &str, price_cents: i64, available: u32) {
        self.products.lock().unwrap().insert(
            ProductId::new(id),
            CatalogProduct {
                price: Money::from_cents(price_cents),
                compare_at_price: None,
                available_quantity: available,
            },
        );
    }

    pub fn set_available(&self, id: &str, available: u32) {
        if let Some(product) = self.products.lock().unwrap().get_mut(&ProductId::new(id)) {
            product.available_quantity = available;
        }
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn fetch_product(&self, id: &ProductId) -> Result<CatalogProduct, ServiceError> {
        self.products
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    async fn available_quantity(&self, id: &ProductId) -> Result<u32, ServiceError> {
        Ok(self.fetch_product(id).await?.available_quantity)
    }
}

// =============================================================================
// Remote cart
// =============================================================================

#[derive(Default)]
pub struct FakeRemoteCart {
    carts: Mutex<HashMap<CustomerId, Vec<CartLine>>>,
    replace_calls: AtomicUsize,
}

impl FakeRemoteCart {
    pub fn seed(&self, customer: &str, lines: Vec<CartLine>) {
        self.carts
            .lock()
            .unwrap()
            .insert(CustomerId::new(customer), lines);
    }

    pub fn stored(&self, customer: &str) -> Vec<CartLine> {
        self.carts
            .lock()
            .unwrap()
            .get(&CustomerId::new(customer))
            .cloned()
            .unwrap_or_default()
    }

    pub fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteCartStore for FakeRemoteCart {
    async fn get_cart(&self, customer: &CustomerId) -> Result<Vec<CartLine>, ServiceError> {
        Ok(self
            .carts
            .lock()
            .unwrap()
            .get(customer)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_cart(
        &self,
        customer: &CustomerId,
        lines: &[CartLine],
    ) -> Result<(), ServiceError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        self.carts
            .lock()
            .unwrap()
            .insert(customer.clone(), lines.to_vec());
        Ok(())
    }
}

// =============================================================================
// Promotions
// =============================================================================

#[derive(Default)]
pub struct FakePromotions {
    auto: Mutex<Option<DiscountCandidate>>,
    codes: Mutex<HashMap<String, CodeEvaluation>>,
    usages: Mutex<Vec<PromotionId>>,
    fail_next_usage: Mutex<Option<ServiceError>>,
}

impl FakePromotions {
    pub fn set_auto(&self, candidate: DiscountCandidate) {
        *self.auto.lock().unwrap() = Some(candidate);
    }

    pub fn set_code(&self, code: &str, evaluation: CodeEvaluation) {
        self.codes.lock().unwrap().insert(code.to_owned(), evaluation);
    }

    pub fn recorded_usages(&self) -> Vec<PromotionId> {
        self.usages.lock().unwrap().clone()
    }

    pub fn fail_next_usage(&self, error: ServiceError) {
        *self.fail_next_usage.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl PromotionEvaluator for FakePromotions {
    async fn evaluate_auto(
        &self,
        _lines: &[CartLine],
        _customer: Option<CustomerId>,
    ) -> Result<Option<DiscountCandidate>, ServiceError> {
        Ok(self.auto.lock().unwrap().clone())
    }

    async fn evaluate_code(
        &self,
        _lines: &[CartLine],
        code: &str,
        _customer: Option<CustomerId>,
    ) -> Result<CodeEvaluation, ServiceError> {
        Ok(self
            .codes
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .unwrap_or(CodeEvaluation::Invalid {
                message: format!("Code {code} is not valid"),
            }))
    }

    async fn record_usage(
        &self,
        promotion: &PromotionId,
        _order: &OrderId,
    ) -> Result<(), ServiceError> {
        if let Some(error) = self.fail_next_usage.lock().unwrap().take() {
            return Err(error);
        }
        self.usages.lock().unwrap().push(promotion.clone());
        Ok(())
    }
}

// =============================================================================
// Carrier
// =============================================================================

pub struct FakeCarrier {
    zone: Mutex<ZoneInfo>,
    rates: Mutex<Vec<ShippingRateOption>>,
}

impl Default for FakeCarrier {
    fn default() -> Self {
        Self {
            zone: Mutex::new(ZoneInfo {
                status: ZoneStatus::Open,
                reason: None,
            }),
            rates: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCarrier {
    pub fn set_zone(&self, zone: ZoneInfo) {
        *self.zone.lock().unwrap() = zone;
    }

    pub fn set_rates(&self, rates: Vec<ShippingRateOption>) {
        *self.rates.lock().unwrap() = rates;
    }
}

#[async_trait]
impl CarrierService for FakeCarrier {
    async fn validate_address(&self, address: &Address) -> Result<AddressValidation, ServiceError> {
        Ok(AddressValidation {
            status: verdant_core::AddressStatus::Verified,
            normalized: Some(address.clone()),
        })
    }

    async fn fetch_rates(
        &self,
        _address: &Address,
        lines: &[CartLine],
    ) -> Result<RateQuote, ServiceError> {
        let seedling_units = lines.iter().map(CartLine::seedling_units).sum();
        Ok(RateQuote {
            zone: self.zone.lock().unwrap().clone(),
            options: self.rates.lock().unwrap().clone(),
            packages: PackageBreakdown {
                seedling_units,
                boxes: 1,
                per_box: 72,
            },
        })
    }
}

// =============================================================================
// Pickup
// =============================================================================

#[derive(Default)]
pub struct FakePickup {
    locations: Mutex<Vec<PickupLocation>>,
    slots: Mutex<Vec<PickupSlot>>,
}

impl FakePickup {
    pub fn set_locations(&self, locations: Vec<PickupLocation>) {
        *self.locations.lock().unwrap() = locations;
    }

    pub fn set_slots(&self, slots: Vec<PickupSlot>) {
        *self.slots.lock().unwrap() = slots;
    }
}

#[async_trait]
impl PickupDirectory for FakePickup {
    async fn list_locations(&self) -> Result<Vec<PickupLocation>, ServiceError> {
        Ok(self.locations.lock().unwrap().clone())
    }

    async fn list_slots(
        &self,
        _location: &LocationId,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<PickupSlot>, ServiceError> {
        Ok(self.slots.lock().unwrap().clone())
    }
}

// =============================================================================
// Payments
// =============================================================================

/// Payment fake. Outcomes are consumed in order; once the queue is empty
/// every confirmation succeeds.
#[derive(Default)]
pub struct FakePayments {
    outcomes: Mutex<VecDeque<ConfirmOutcome>>,
    intents_created: AtomicUsize,
    last_charge: Mutex<Option<Money>>,
}

impl FakePayments {
    pub fn queue_outcome(&self, outcome: ConfirmOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn intents_created(&self) -> usize {
        self.intents_created.load(Ordering::SeqCst)
    }

    pub fn last_charge(&self) -> Option<Money> {
        *self.last_charge.lock().unwrap()
    }
}

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn create_intent(
        &self,
        amount: Money,
        order: &OrderId,
        _session_key: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let n = self.intents_created.fetch_add(1, Ordering::SeqCst);
        *self.last_charge.lock().unwrap() = Some(amount);
        Ok(PaymentIntent {
            intent_id: format!("pi_{order}_{n}"),
            client_secret: format!("pi_{order}_{n}_secret"),
        })
    }

    async fn await_confirmation(&self, _intent_id: &str) -> Result<ConfirmOutcome, ServiceError> {
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConfirmOutcome::Succeeded))
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Default)]
pub struct FakeOrders {
    created: Mutex<Vec<OrderSnapshot>>,
    patches: Mutex<Vec<(OrderId, OrderPatch)>>,
    fail_next_create: Mutex<Option<ServiceError>>,
    fail_next_update: Mutex<Option<ServiceError>>,
}

impl FakeOrders {
    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn created_snapshots(&self) -> Vec<OrderSnapshot> {
        self.created.lock().unwrap().clone()
    }

    pub fn patches(&self) -> Vec<(OrderId, OrderPatch)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn fail_next_create(&self, error: ServiceError) {
        *self.fail_next_create.lock().unwrap() = Some(error);
    }

    pub fn fail_next_update(&self, error: ServiceError) {
        *self.fail_next_update.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl OrderStore for FakeOrders {
    async fn create_order(&self, snapshot: &OrderSnapshot) -> Result<CreatedOrder, ServiceError> {
        if let Some(error) = self.fail_next_create.lock().unwrap().take() {
            return Err(error);
        }
        let mut created = self.created.lock().unwrap();
        created.push(snapshot.clone());
        let n = created.len();
        Ok(CreatedOrder {
            id: OrderId::new(format!("order_{n}")),
            order_number: format!("VD-{n:04}"),
        })
    }

    async fn update_order(&self, id: &OrderId, patch: OrderPatch) -> Result<(), ServiceError> {
        if let Some(error) = self.fail_next_update.lock().unwrap().take() {
            return Err(error);
        }
        self.patches.lock().unwrap().push((id.clone(), patch));
        Ok(())
    }
}

// =============================================================================
// Credits
// =============================================================================

#[derive(Default)]
pub struct FakeCredits {
    balances: Mutex<HashMap<String, Money>>,
    redemptions: Mutex<Vec<(String, Money)>>,
    fail_next_redeem: Mutex<Option<ServiceError>>,
}

impl FakeCredits {
    pub fn set_balance(&self, code: &str, balance: Money) {
        self.balances.lock().unwrap().insert(code.to_owned(), balance);
    }

    pub fn redemptions(&self) -> Vec<(String, Money)> {
        self.redemptions.lock().unwrap().clone()
    }

    pub fn fail_next_redeem(&self, error: ServiceError) {
        *self.fail_next_redeem.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl CreditLedger for FakeCredits {
    async fn verify(
        &self,
        code: &str,
        _customer: Option<CustomerId>,
    ) -> Result<Money, ServiceError> {
        self.balances
            .lock()
            .unwrap()
            .get(code)
            .copied()
            .ok_or_else(|| ServiceError::NotFound(code.to_owned()))
    }

    async fn redeem(&self, code: &str, _order: &OrderId, amount: Money) -> Result<(), ServiceError> {
        if let Some(error) = self.fail_next_redeem.lock().unwrap().take() {
            return Err(error);
        }
        self.redemptions
            .lock()
            .unwrap()
            .push((code.to_owned(), amount));
        Ok(())
    }
}

// =============================================================================
// Notifications and abandoned carts
// =============================================================================

#[derive(Default)]
pub struct FakeNotifications {
    sent: Mutex<Vec<(Email, OrderConfirmation)>>,
    fail_next_send: Mutex<Option<ServiceError>>,
}

impl FakeNotifications {
    pub fn sent(&self) -> Vec<(Email, OrderConfirmation)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next_send(&self, error: ServiceError) {
        *self.fail_next_send.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl NotificationService for FakeNotifications {
    async fn send_order_confirmation(
        &self,
        email: &Email,
        confirmation: &OrderConfirmation,
    ) -> Result<(), ServiceError> {
        if let Some(error) = self.fail_next_send.lock().unwrap().take() {
            return Err(error);
        }
        self.sent
            .lock()
            .unwrap()
            .push((email.clone(), confirmation.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeAbandonedCarts {
    snapshots: Mutex<HashMap<String, Vec<CartLine>>>,
}

impl FakeAbandonedCarts {
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

#[async_trait]
impl AbandonedCartStore for FakeAbandonedCarts {
    async fn upsert_snapshot(
        &self,
        session_key: &str,
        _email: &Email,
        lines: &[CartLine],
    ) -> Result<(), ServiceError> {
        self.snapshots
            .lock()
            .unwrap()
            .insert(session_key.to_owned(), lines.to_vec());
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Fully faked checkout wiring plus handles to every fake for assertions.
pub struct TestHarness {
    pub catalog: Arc<FakeCatalog>,
    pub remote_cart: Arc<FakeRemoteCart>,
    pub promotions: Arc<FakePromotions>,
    pub carrier: Arc<FakeCarrier>,
    pub pickup: Arc<FakePickup>,
    pub payments: Arc<FakePayments>,
    pub orders: Arc<FakeOrders>,
    pub credits: Arc<FakeCredits>,
    pub notifications: Arc<FakeNotifications>,
    pub abandoned_carts: Arc<FakeAbandonedCarts>,
    pub context: CheckoutContext,
}

impl TestHarness {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config(true))
    }

    #[must_use]
    pub fn payments_disabled() -> Self {
        Self::with_config(test_config(false))
    }

    #[must_use]
    pub fn with_config(config: CheckoutConfig) -> Self {
        let catalog = Arc::new(FakeCatalog::default());
        let remote_cart = Arc::new(FakeRemoteCart::default());
        let promotions = Arc::new(FakePromotions::default());
        let carrier = Arc::new(FakeCarrier::default());
        let pickup = Arc::new(FakePickup::default());
        let payments = Arc::new(FakePayments::default());
        let orders = Arc::new(FakeOrders::default());
        let credits = Arc::new(FakeCredits::default());
        let notifications = Arc::new(FakeNotifications::default());
        let abandoned_carts = Arc::new(FakeAbandonedCarts::default());

        let services = Services {
            catalog: catalog.clone(),
            remote_cart: remote_cart.clone(),
            promotions: promotions.clone(),
            carrier: carrier.clone(),
            pickup: pickup.clone(),
            payments: payments.clone(),
            orders: orders.clone(),
            credits: credits.clone(),
            notifications: notifications.clone(),
            abandoned_carts: abandoned_carts.clone(),
        };
        let context = CheckoutContext::with_services(config, services);

        Self {
            catalog,
            remote_cart,
            promotions,
            carrier,
            pickup,
            payments,
            orders,
            credits,
            notifications,
            abandoned_carts,
            context,
        }
    }

    /// A cart store over an in-memory local cache, with a short debounce
    /// so tests settle quickly.
    #[must_use]
    pub fn cart(&self) -> CartStore {
        CartStore::with_debounce(
            Arc::new(InMemoryCartCache::default()),
            self.remote_cart.clone(),
            Duration::from_millis(5),
        )
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn test_config(payments_enabled: bool) -> CheckoutConfig {
    CheckoutConfig {
        platform: PlatformConfig {
            base_url: "http://platform.test".to_owned(),
            token: SecretString::from("test-token"),
        },
        carrier: CarrierConfig {
            base_url: "http://carrier.test".to_owned(),
            api_key: SecretString::from("test-key"),
        },
        stripe_secret_key: None,
        payments_enabled,
        tax: TaxConfig::default(),
        seedlings_per_box: 72,
        membership_rate: Decimal::new(10, 2),
    }
}

/// A cart line for a seedling product.
#[must_use]
pub fn seedling_line(id: &str, price_cents: i64, quantity: u32) -> CartLine {
    CartLine {
        product_id: ProductId::new(id),
        name: format!("{id} seedling"),
        unit_price: Money::from_cents(price_cents),
        compare_at_price: None,
        quantity,
        category: "seedlings".to_owned(),
        constraint: FulfillmentConstraint::Either,
        seedlings_per_unit: 1,
    }
}

/// A Georgia shipping address.
#[must_use]
pub fn georgia_address() -> Address {
    Address {
        line1: "12 Fern Rd".to_owned(),
        line2: None,
        city: "Athens".to_owned(),
        state: "GA".to_owned(),
        postal_code: "30601".to_owned(),
        country: "US".to_owned(),
    }
}

/// A flat-amount shipping rate.
#[must_use]
pub fn flat_rate(id: &str, cents: i64) -> ShippingRateOption {
    ShippingRateOption {
        rate_id: verdant_core::RateId::new(id),
        carrier_id: verdant_core::CarrierId::new("usps"),
        carrier_name: "USPS".to_owned(),
        service_name: "Ground Advantage".to_owned(),
        amount: Money::from_cents(cents),
        transit_days: Some(3),
        estimated_delivery_date: None,
    }
}
