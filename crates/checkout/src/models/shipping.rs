//! Shipping addresses, carrier rates, and zone data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use verdant_core::{AddressStatus, CarrierId, Money, RateId};

/// A shipping destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    /// Two-letter state code (drives nexus tax and zone lookup).
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Result of carrier address validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressValidation {
    pub status: AddressStatus,
    /// Carrier-normalized form, when validation produced one.
    pub normalized: Option<Address>,
}

/// Service level offered by zone rules for a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ZoneStatus {
    /// Full service.
    Open,
    /// Live plants only survive short transits; only rates at or under the
    /// threshold are offered.
    Conditional { max_transit_days: u32 },
    /// No service to this destination.
    Blocked,
}

/// Zone ruling for a destination, with a customer-facing reason when the
/// zone limits service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneInfo {
    pub status: ZoneStatus,
    pub reason: Option<String>,
}

/// A single bookable carrier rate for a validated address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingRateOption {
    pub rate_id: RateId,
    pub carrier_id: CarrierId,
    pub carrier_name: String,
    pub service_name: String,
    pub amount: Money,
    pub transit_days: Option<u32>,
    pub estimated_delivery_date: Option<NaiveDate>,
}

/// How cart quantity splits across shippable packages.
///
/// Quantity is first expanded by each product's seedlings-per-unit
/// multiplier, then packed `per_box` physical units to a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageBreakdown {
    /// Total physical seedling units across the cart.
    pub seedling_units: u32,
    /// Number of boxes required.
    pub boxes: u32,
    /// Box capacity in physical units.
    pub per_box: u32,
}
