//! Fulfillment resolution.
//!
//! Reduces per-item constraints to the set of legal delivery methods for
//! the cart as a whole. A conflict (ship-only and pickup-only in the same
//! cart) is reported, never silently resolved.

use serde::{Deserialize, Serialize};

use verdant_core::FulfillmentMethod;

use crate::models::{CartLine, FulfillmentConstraint};

/// What the cart's constraints allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentPlan {
    pub has_pickup_only: bool,
    pub has_ship_only: bool,
    pub has_either: bool,
    /// Cart mixes mutually exclusive requirements; checkout cannot proceed
    /// until the cart changes.
    pub conflict: bool,
    /// The method the cart forces, when it forces one.
    pub forced_method: Option<FulfillmentMethod>,
}

impl FulfillmentPlan {
    /// Whether the customer still has a choice of method.
    #[must_use]
    pub const fn customer_chooses(&self) -> bool {
        !self.conflict && self.forced_method.is_none()
    }

    /// Whether a given method is legal for this cart.
    #[must_use]
    pub fn allows(&self, method: FulfillmentMethod) -> bool {
        if self.conflict {
            return false;
        }
        match self.forced_method {
            Some(forced) => forced == method,
            None => true,
        }
    }
}

/// Resolve the legal delivery methods for a cart.
#[must_use]
pub fn resolve(lines: &[CartLine]) -> FulfillmentPlan {
    let has_pickup_only = lines
        .iter()
        .any(|l| l.constraint == FulfillmentConstraint::PickupOnly);
    let has_ship_only = lines
        .iter()
        .any(|l| l.constraint == FulfillmentConstraint::ShipOnly);
    let has_either = lines
        .iter()
        .any(|l| l.constraint == FulfillmentConstraint::Either);

    let conflict = has_pickup_only && has_ship_only;
    let must_pickup = has_pickup_only && !has_ship_only;
    let must_ship = !lines.is_empty() && lines
        .iter()
        .all(|l| l.constraint == FulfillmentConstraint::ShipOnly);

    let forced_method = if conflict {
        None
    } else if must_pickup {
        Some(FulfillmentMethod::Pickup)
    } else if must_ship {
        Some(FulfillmentMethod::Shipping)
    } else {
        None
    };

    FulfillmentPlan {
        has_pickup_only,
        has_ship_only,
        has_either,
        conflict,
        forced_method,
    }
}

#[cfg(test)]
mod tests {
    use verdant_core::{Money, ProductId};

    use super::*;

    fn line(constraint: FulfillmentConstraint) -> CartLine {
        CartLine {
            product_id: ProductId::new("prod"),
            name: "item".to_owned(),
            unit_price: Money::from_cents(1000),
            compare_at_price: None,
            quantity: 1,
            category: "misc".to_owned(),
            constraint,
            seedlings_per_unit: 1,
        }
    }

    #[test]
    fn test_all_either_leaves_choice_open() {
        let plan = resolve(&[
            line(FulfillmentConstraint::Either),
            line(FulfillmentConstraint::Either),
        ]);
        assert!(!plan.conflict);
        assert!(plan.customer_chooses());
        assert!(plan.allows(FulfillmentMethod::Shipping));
        assert!(plan.allows(FulfillmentMethod::Pickup));
    }

    #[test]
    fn test_pickup_only_forces_pickup() {
        let plan = resolve(&[
            line(FulfillmentConstraint::PickupOnly),
            line(FulfillmentConstraint::Either),
        ]);
        assert_eq!(plan.forced_method, Some(FulfillmentMethod::Pickup));
        assert!(plan.allows(FulfillmentMethod::Pickup));
        assert!(!plan.allows(FulfillmentMethod::Shipping));
    }

    #[test]
    fn test_all_ship_only_forces_shipping() {
        let plan = resolve(&[
            line(FulfillmentConstraint::ShipOnly),
            line(FulfillmentConstraint::ShipOnly),
        ]);
        assert_eq!(plan.forced_method, Some(FulfillmentMethod::Shipping));
    }

    #[test]
    fn test_ship_only_with_either_does_not_force() {
        let plan = resolve(&[
            line(FulfillmentConstraint::ShipOnly),
            line(FulfillmentConstraint::Either),
        ]);
        assert_eq!(plan.forced_method, None);
        assert!(plan.customer_chooses());
    }

    #[test]
    fn test_mixed_exclusive_constraints_conflict() {
        let plan = resolve(&[
            line(FulfillmentConstraint::PickupOnly),
            line(FulfillmentConstraint::ShipOnly),
        ]);
        assert!(plan.conflict);
        assert_eq!(plan.forced_method, None);
        assert!(!plan.allows(FulfillmentMethod::Pickup));
        assert!(!plan.allows(FulfillmentMethod::Shipping));
    }

    #[test]
    fn test_empty_cart_forces_nothing() {
        let plan = resolve(&[]);
        assert!(!plan.conflict);
        assert_eq!(plan.forced_method, None);
    }
}
