//! Domain types for the checkout pipeline.
//!
//! These types provide a clean, ergonomic API separate from the wire
//! payloads of the platform and carrier clients.

pub mod cart;
pub mod discount;
pub mod order;
pub mod pickup;
pub mod shipping;

pub use cart::{CartLine, FulfillmentConstraint, StockIssue, subtotal};
pub use discount::{DiscountCandidate, DiscountSource};
pub use order::{
    CreatedOrder, FulfillmentDetails, GrowingSystem, OrderConfirmation, OrderCustomer,
    OrderLine, OrderPatch, OrderSnapshot,
};
pub use pickup::{PickupLocation, PickupSlot, SlotDay};
pub use shipping::{
    Address, AddressValidation, PackageBreakdown, ShippingRateOption, ZoneInfo, ZoneStatus,
};
