//! Shipping rate selection.
//!
//! Wraps the carrier service with the storefront's zone policy: blocked
//! destinations fail before any rate reaches the UI layer, conditional
//! zones drop rates over the transit-day threshold, and surviving rates
//! are returned cheapest-first with a package breakdown.

use std::sync::Arc;

use tracing::instrument;

use crate::error::CheckoutError;
use crate::models::{
    Address, AddressValidation, CartLine, PackageBreakdown, ShippingRateOption, ZoneStatus,
};
use crate::services::CarrierService;

/// Filtered, sorted rates for a serviceable destination.
#[derive(Debug, Clone, PartialEq)]
pub struct RatePlan {
    pub options: Vec<ShippingRateOption>,
    pub packages: PackageBreakdown,
}

/// Rate service adapter over the carrier client.
#[derive(Clone)]
pub struct ShippingService {
    carrier: Arc<dyn CarrierService>,
}

impl ShippingService {
    #[must_use]
    pub fn new(carrier: Arc<dyn CarrierService>) -> Self {
        Self { carrier }
    }

    /// Validate a destination address.
    ///
    /// Must be re-run whenever any address field changes; the session layer
    /// invalidates a previously selected rate on edit.
    ///
    /// # Errors
    ///
    /// Returns an error if the carrier call fails.
    #[instrument(skip(self, address), fields(state = %address.state))]
    pub async fn validate_address(
        &self,
        address: &Address,
    ) -> Result<AddressValidation, CheckoutError> {
        Ok(self.carrier.validate_address(address).await?)
    }

    /// Fetch rates for a validated address, applying zone policy.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::ZoneBlocked`] when the destination has no
    /// service, or a service error if the carrier call fails.
    #[instrument(skip(self, address, lines), fields(state = %address.state))]
    pub async fn quote(
        &self,
        address: &Address,
        lines: &[CartLine],
    ) -> Result<RatePlan, CheckoutError> {
        let quote = self.carrier.fetch_rates(address, lines).await?;

        let options = match quote.zone.status {
            ZoneStatus::Blocked => {
                let reason = quote
                    .zone
                    .reason
                    .unwrap_or_else(|| format!("No service to {}", address.state));
                return Err(CheckoutError::ZoneBlocked(reason));
            }
            ZoneStatus::Conditional { max_transit_days } => quote
                .options
                .into_iter()
                .filter(|r| r.transit_days.is_none_or(|d| d <= max_transit_days))
                .collect(),
            ZoneStatus::Open => quote.options,
        };

        let mut options = options;
        options.sort_by_key(|r| r.amount);

        Ok(RatePlan {
            options,
            packages: quote.packages,
        })
    }
}

/// Split expanded cart quantity across shippable boxes.
///
/// Each line contributes `quantity * seedlings_per_unit` physical units;
/// boxes hold `per_box` units.
#[must_use]
pub fn package_breakdown(lines: &[CartLine], per_box: u32) -> PackageBreakdown {
    let seedling_units: u32 = lines.iter().map(CartLine::seedling_units).sum();
    let per_box = per_box.max(1);
    let boxes = seedling_units.div_ceil(per_box);

    PackageBreakdown {
        seedling_units,
        boxes,
        per_box,
    }
}

#[cfg(test)]
mod tests {
    use verdant_core::{CarrierId, Money, ProductId, RateId};

    use crate::models::{FulfillmentConstraint, ZoneInfo};
    use crate::services::{MockCarrierService, RateQuote};

    use super::*;

    fn line(qty: u32, seedlings_per_unit: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new("prod"),
            name: "tray".to_owned(),
            unit_price: Money::from_cents(1500),
            compare_at_price: None,
            quantity: qty,
            category: "herbs".to_owned(),
            constraint: FulfillmentConstraint::Either,
            seedlings_per_unit,
        }
    }

    fn rate(id: &str, cents: i64, transit_days: Option<u32>) -> ShippingRateOption {
        ShippingRateOption {
            rate_id: RateId::new(id),
            carrier_id: CarrierId::new("ups"),
            carrier_name: "UPS".to_owned(),
            service_name: id.to_owned(),
            amount: Money::from_cents(cents),
            transit_days,
            estimated_delivery_date: None,
        }
    }

    fn quote(status: ZoneStatus, options: Vec<ShippingRateOption>) -> RateQuote {
        RateQuote {
            zone: ZoneInfo {
                status,
                reason: None,
            },
            options,
            packages: PackageBreakdown {
                seedling_units: 8,
                boxes: 1,
                per_box: 30,
            },
        }
    }

    #[test]
    fn test_package_breakdown_rounds_up() {
        let breakdown = package_breakdown(&[line(2, 6), line(1, 4)], 10);
        assert_eq!(breakdown.seedling_units, 16);
        assert_eq!(breakdown.boxes, 2);

        let exact = package_breakdown(&[line(5, 6)], 30);
        assert_eq!(exact.boxes, 1);
    }

    #[tokio::test]
    async fn test_blocked_zone_is_terminal_for_address() {
        let mut carrier = MockCarrierService::new();
        carrier
            .expect_fetch_rates()
            .returning(|_, _| Ok(quote(ZoneStatus::Blocked, vec![rate("ground", 600, Some(3))])));

        let service = ShippingService::new(Arc::new(carrier));
        let result = service.quote(&Address::default(), &[line(1, 1)]).await;
        assert!(matches!(result, Err(CheckoutError::ZoneBlocked(_))));
    }

    #[tokio::test]
    async fn test_conditional_zone_filters_slow_rates() {
        let mut carrier = MockCarrierService::new();
        carrier.expect_fetch_rates().returning(|_, _| {
            Ok(quote(
                ZoneStatus::Conditional {
                    max_transit_days: 2,
                },
                vec![
                    rate("ground", 600, Some(5)),
                    rate("2day", 1400, Some(2)),
                    rate("overnight", 2900, Some(1)),
                ],
            ))
        });

        let service = ShippingService::new(Arc::new(carrier));
        let plan = service
            .quote(&Address::default(), &[line(1, 1)])
            .await
            .expect("quote");

        let names: Vec<_> = plan.options.iter().map(|r| r.service_name.as_str()).collect();
        assert_eq!(names, vec!["2day", "overnight"]);
    }

    #[tokio::test]
    async fn test_rates_sorted_cheapest_first() {
        let mut carrier = MockCarrierService::new();
        carrier.expect_fetch_rates().returning(|_, _| {
            Ok(quote(
                ZoneStatus::Open,
                vec![
                    rate("overnight", 2900, Some(1)),
                    rate("ground", 600, Some(5)),
                    rate("2day", 1400, Some(2)),
                ],
            ))
        });

        let service = ShippingService::new(Arc::new(carrier));
        let plan = service
            .quote(&Address::default(), &[line(1, 1)])
            .await
            .expect("quote");

        let amounts: Vec<_> = plan.options.iter().map(|r| r.amount.to_cents()).collect();
        assert_eq!(amounts, vec![600, 1400, 2900]);
    }
}
