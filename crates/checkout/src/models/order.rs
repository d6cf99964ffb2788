//! Orders and their immutable commit-time snapshots.

use serde::{Deserialize, Serialize};

use verdant_core::{
    CustomerId, Email, FulfillmentMethod, LocationId, Money, OrderId, PaymentStatus, ProductId,
};

use crate::models::pickup::PickupSlot;
use crate::models::shipping::{Address, ShippingRateOption};
use crate::tax::TaxResult;

/// What setup the customer grows in.
///
/// Required on every order; drives the care sheet included with the
/// shipment or handed over at pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowingSystem {
    Raft,
    MediaBed,
    Nft,
    Soil,
    Other,
}

/// Who placed the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OrderCustomer {
    Registered { customer_id: CustomerId },
    Guest { email: Email },
}

/// An order line frozen at commit time.
///
/// A copy of the cart line, not a live reference: later catalog price
/// changes must never alter a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub category: String,
}

/// Fulfillment details captured on the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum FulfillmentDetails {
    Shipping {
        address: Address,
        rate: ShippingRateOption,
    },
    Pickup {
        location_id: LocationId,
        slot: PickupSlot,
    },
}

impl FulfillmentDetails {
    /// The coarse fulfillment method for this order.
    #[must_use]
    pub const fn method(&self) -> FulfillmentMethod {
        match self {
            Self::Shipping { .. } => FulfillmentMethod::Shipping,
            Self::Pickup { .. } => FulfillmentMethod::Pickup,
        }
    }
}

/// The full pricing and line-item snapshot persisted at order creation.
///
/// Built once per checkout attempt, before any payment call, and never
/// recomputed from a live cart afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub lines: Vec<OrderLine>,
    pub fulfillment: FulfillmentDetails,
    pub customer: OrderCustomer,
    pub growing_system: GrowingSystem,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub discount_label: Option<String>,
    pub shipping: Money,
    pub tax: TaxResult,
    pub total: Money,
    /// Stable per-session key for abandoned-cart and idempotency tracking.
    pub session_key: String,
}

/// Identifiers handed back by order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub id: OrderId,
    pub order_number: String,
}

/// Partial update applied after payment settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrderPatch {
    pub payment_status: Option<PaymentStatus>,
    pub payment_intent_id: Option<String>,
}

/// Summary handed to the notification service after finalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_number: String,
    pub line_summaries: Vec<String>,
    pub fulfillment_method: FulfillmentMethod,
    pub total: Money,
}

impl OrderConfirmation {
    /// Build the confirmation summary from a created order's snapshot.
    #[must_use]
    pub fn from_snapshot(order_number: &str, snapshot: &OrderSnapshot) -> Self {
        Self {
            order_number: order_number.to_owned(),
            line_summaries: snapshot
                .lines
                .iter()
                .map(|l| format!("{} x{} @ {}", l.name, l.quantity, l.unit_price))
                .collect(),
            fulfillment_method: snapshot.fulfillment.method(),
            total: snapshot.total,
        }
    }
}
