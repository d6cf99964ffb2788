//! Cart line items.

use serde::{Deserialize, Serialize};

use verdant_core::{Money, ProductId};

/// Per-item delivery constraint.
///
/// Seed packets ship anywhere; live seedlings are pickup-only; most dry
/// goods can go either way. A cart mixing `ShipOnly` and `PickupOnly`
/// lines cannot be fulfilled and blocks checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentConstraint {
    #[default]
    Either,
    ShipOnly,
    PickupOnly,
}

/// A single product line in the active cart.
///
/// Owned by the [`CartStore`](crate::cart::CartStore); mutated only through
/// its operations. Quantity is always at least 1 - decrementing below 1
/// removes the line instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    /// Display name at the time the line was added (refreshed on reconcile).
    pub name: String,
    pub unit_price: Money,
    /// Pre-promotion price, when a promotional window is open.
    pub compare_at_price: Option<Money>,
    pub quantity: u32,
    /// Catalog category (used for promotion scoping).
    pub category: String,
    pub constraint: FulfillmentConstraint,
    /// Physical seedling units per sale unit; drives shipping weight and
    /// package breakdown (a 6-pack tray counts as 6 units in a box).
    pub seedlings_per_unit: u32,
}

impl CartLine {
    /// Extended price for the line.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// Physical seedling units this line contributes to packaging.
    #[must_use]
    pub const fn seedling_units(&self) -> u32 {
        self.quantity * self.seedlings_per_unit
    }
}

/// Sum of line totals across the cart.
#[must_use]
pub fn subtotal(lines: &[CartLine]) -> Money {
    lines.iter().map(CartLine::line_total).sum()
}

/// A line whose requested quantity exceeds live availability.
///
/// Emitted by the stock validator immediately before order creation; the
/// order is never created while any issue remains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIssue {
    pub product_id: ProductId,
    pub name: String,
    pub requested: u32,
    pub available: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(cents: i64, qty: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new("prod_1"),
            name: "Basil 6-pack".to_owned(),
            unit_price: Money::from_cents(cents),
            compare_at_price: None,
            quantity: qty,
            category: "herbs".to_owned(),
            constraint: FulfillmentConstraint::Either,
            seedlings_per_unit: 6,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(2000, 2).line_total(), Money::from_cents(4000));
    }

    #[test]
    fn test_seedling_units() {
        assert_eq!(line(2000, 3).seedling_units(), 18);
    }

    #[test]
    fn test_subtotal() {
        let lines = vec![line(2000, 2), line(550, 1)];
        assert_eq!(subtotal(&lines), Money::from_cents(4550));
    }
}
