//! Order submission.
//!
//! Sequences validation, the pre-commit stock check, order creation,
//! payment, and finalization. The protocol is save-before-charge: the
//! order is persisted in pending status with its full pricing snapshot
//! before any payment call, so a client disconnect after a successful
//! charge never loses the order. Finalize is the only place the session's
//! completion guard flips.

use tracing::{error, info, instrument, warn};

use verdant_core::{FulfillmentMethod, Money, PaymentStatus};

use crate::cart::CartStore;
use crate::context::CheckoutContext;
use crate::discount::{self, DiscountInputs, MembershipDiscount};
use crate::error::{CheckoutError, ValidationIssue};
use crate::fulfillment;
use crate::models::{
    subtotal, CartLine, CreatedOrder, FulfillmentDetails, OrderConfirmation, OrderCustomer,
    OrderLine, OrderPatch, OrderSnapshot,
};
use crate::session::{CheckoutSession, PendingOrder};
use crate::stock;
use crate::tax;

/// Result of a submission attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// The order was placed and finalized.
    Confirmed(OrderConfirmation),
    /// This session already completed; the original confirmation is
    /// returned and no new order was created.
    AlreadyCompleted(OrderConfirmation),
}

/// Submit the checkout.
///
/// Safe to call again after any error: a pending order from a failed
/// payment attempt is charged from its persisted snapshot rather than
/// recreated or repriced, and a session that already finalized returns its
/// confirmation without side effects.
///
/// # Errors
///
/// - [`CheckoutError::Validation`] for form or selection gaps
/// - [`CheckoutError::StockConflict`] when availability no longer covers
///   the cart, including the race where stock changed between the check
///   and order creation
/// - [`CheckoutError::Payment`] when the charge fails; the order stays
///   pending and retry is allowed
/// - [`CheckoutError::OrderCreate`] / [`CheckoutError::Service`] for
///   upstream failures
#[instrument(skip_all, fields(session = session.session_key()))]
pub async fn submit(
    ctx: &CheckoutContext,
    cart: &CartStore,
    session: &mut CheckoutSession,
) -> Result<SubmissionOutcome, CheckoutError> {
    if let Some(confirmation) = session.completion() {
        info!("submission re-entered after finalize, returning prior confirmation");
        return Ok(SubmissionOutcome::AlreadyCompleted(confirmation.clone()));
    }

    // A failed payment attempt already persisted the order with its pricing
    // snapshot. Retry charges and finalizes exactly what was persisted;
    // nothing is recomputed from the live cart.
    if let Some(pending) = session.pending_order().cloned() {
        info!(order = %pending.created.id, "retrying payment for pending order");
        return settle(ctx, cart, session, pending).await;
    }

    let lines = cart.lines();
    let services = ctx.services();

    // Gather discounts before validation so an invalid entered code is
    // reported alongside the other form issues.
    let membership = MembershipDiscount {
        rate: ctx.config().membership_rate,
        ..MembershipDiscount::default()
    };
    let gathered = discount::gather(
        services.promotions.as_ref(),
        &membership,
        DiscountInputs {
            lines: &lines,
            customer: session.customer.clone(),
            lifetime_member: session.lifetime_member,
            entered_code: session.entered_code.as_deref(),
        },
    )
    .await?;

    let fulfillment_details = validate(session, &lines, gathered.invalid_code_message.as_deref())?;

    // Abandoned-cart capture must never block or delay the submission.
    if let Some(email) = session.email.clone() {
        let store = services.abandoned_carts.clone();
        let key = session.session_key().to_owned();
        let snapshot_lines = lines.clone();
        tokio::spawn(async move {
            if let Err(err) = store.upsert_snapshot(&key, &email, &snapshot_lines).await {
                warn!(error = %err, "abandoned-cart snapshot failed");
            }
        });
    }

    let issues = stock::validate(services.catalog.as_ref(), &lines).await?;
    if !issues.is_empty() {
        return Err(CheckoutError::StockConflict(issues));
    }

    let winner = discount::resolve_best(gathered.candidates);
    let discount_amount = winner.as_ref().map_or(Money::ZERO, |w| w.amount);
    let free_shipping = winner.as_ref().is_some_and(|w| w.free_shipping);

    let shipping = match &fulfillment_details {
        FulfillmentDetails::Shipping { rate, .. } if !free_shipping => rate.amount,
        _ => Money::ZERO,
    };

    // Authoritative tax at commit; the display-time figure is an estimate.
    let destination_state = match &fulfillment_details {
        FulfillmentDetails::Shipping { address, .. } => address.state.clone(),
        FulfillmentDetails::Pickup { .. } => session
            .pickup_location
            .as_ref()
            .map(|l| l.state.clone())
            .unwrap_or_default(),
    };
    let cart_subtotal = subtotal(&lines);
    let tax = tax::calculate(
        cart_subtotal,
        &destination_state,
        session.tax_exemption.as_deref(),
        &ctx.config().tax,
    );

    let total = cart_subtotal.sub_saturating(discount_amount) + shipping + tax.amount;

    let customer = match (&session.customer, &session.email) {
        (Some(customer_id), _) => OrderCustomer::Registered {
            customer_id: customer_id.clone(),
        },
        (None, Some(email)) => OrderCustomer::Guest {
            email: email.clone(),
        },
        // Unreachable after validation; kept total rather than panicking.
        (None, None) => {
            return Err(CheckoutError::Validation(vec![ValidationIssue::new(
                "email",
                "Email is required",
            )]));
        }
    };

    let snapshot = OrderSnapshot {
        lines: lines.iter().map(order_line).collect(),
        fulfillment: fulfillment_details,
        customer,
        growing_system: session
            .growing_system
            .ok_or_else(|| missing("growing_system", "Select your growing system"))?,
        subtotal: cart_subtotal,
        discount_amount,
        discount_label: winner.as_ref().map(|w| w.label.clone()),
        shipping,
        tax,
        total,
        session_key: session.session_key().to_owned(),
    };

    let created = create_order(ctx, services.catalog.as_ref(), &lines, &snapshot).await?;
    let pending = PendingOrder {
        created,
        snapshot,
        winner,
    };
    session.set_pending_order(pending.clone());

    settle(ctx, cart, session, pending).await
}

/// Charge and finalize a persisted pending order.
///
/// The snapshot inside `pending` is the single source of truth from here
/// on; a payment failure leaves it in the session for retry.
async fn settle(
    ctx: &CheckoutContext,
    cart: &CartStore,
    session: &mut CheckoutSession,
    pending: PendingOrder,
) -> Result<SubmissionOutcome, CheckoutError> {
    let payment = if ctx.config().payments_enabled {
        take_payment(ctx, session, &pending.created, pending.snapshot.total).await?
    } else {
        PaymentReceipt::default()
    };

    let confirmation = finalize(
        ctx,
        cart,
        session,
        &pending.created,
        &pending.snapshot,
        pending.winner.as_ref(),
        &payment,
    )
    .await;
    session.complete(confirmation.clone());
    info!(
        order = %pending.created.id,
        order_number = %pending.created.order_number,
        "checkout confirmed"
    );
    Ok(SubmissionOutcome::Confirmed(confirmation))
}

/// Validate form state and resolve the fulfillment selection.
fn validate(
    session: &CheckoutSession,
    lines: &[CartLine],
    invalid_code: Option<&str>,
) -> Result<FulfillmentDetails, CheckoutError> {
    let mut issues = Vec::new();

    if lines.is_empty() {
        issues.push(ValidationIssue::new("cart", "Your cart is empty"));
    }
    if session.customer.is_none() && session.email.is_none() {
        issues.push(ValidationIssue::new("email", "Email is required"));
    }
    if session.growing_system.is_none() {
        issues.push(ValidationIssue::new(
            "growing_system",
            "Select your growing system",
        ));
    }
    if let Some(message) = invalid_code {
        issues.push(ValidationIssue::new("promotion_code", message));
    }

    let plan = fulfillment::resolve(lines);
    if plan.conflict {
        issues.push(ValidationIssue::new(
            "fulfillment",
            "Cart mixes pickup-only and ship-only items; remove one to continue",
        ));
        return Err(CheckoutError::Validation(issues));
    }

    let method = match plan.forced_method.or(session.method_choice) {
        Some(method) => method,
        None => {
            issues.push(ValidationIssue::new(
                "fulfillment",
                "Choose shipping or pickup",
            ));
            return Err(CheckoutError::Validation(issues));
        }
    };

    let details = match method {
        FulfillmentMethod::Shipping => {
            let address = session.address.clone();
            if address.line1.is_empty()
                || address.city.is_empty()
                || address.state.is_empty()
                || address.postal_code.is_empty()
            {
                issues.push(ValidationIssue::new(
                    "address",
                    "A complete shipping address is required",
                ));
            }
            match session.selected_rate() {
                Some(rate) => Some(FulfillmentDetails::Shipping {
                    address,
                    rate: rate.clone(),
                }),
                None => {
                    issues.push(ValidationIssue::new(
                        "shipping_rate",
                        "Select a shipping rate",
                    ));
                    None
                }
            }
        }
        FulfillmentMethod::Pickup => {
            match (&session.pickup_location, &session.selected_slot) {
                (Some(location), Some(slot)) if slot.is_selectable() => {
                    Some(FulfillmentDetails::Pickup {
                        location_id: location.id.clone(),
                        slot: slot.clone(),
                    })
                }
                (Some(_), Some(_)) => {
                    issues.push(ValidationIssue::new(
                        "pickup_slot",
                        "That pickup time is full; choose another",
                    ));
                    None
                }
                _ => {
                    issues.push(ValidationIssue::new(
                        "pickup_slot",
                        "Select a pickup location and time",
                    ));
                    None
                }
            }
        }
    };

    match details {
        Some(details) if issues.is_empty() => Ok(details),
        _ => Err(CheckoutError::Validation(issues)),
    }
}

/// Persist the pending order, mapping the platform's inventory guard back
/// to a recoverable stock conflict.
async fn create_order(
    ctx: &CheckoutContext,
    catalog: &dyn crate::services::CatalogService,
    lines: &[CartLine],
    snapshot: &OrderSnapshot,
) -> Result<CreatedOrder, CheckoutError> {
    match ctx.services().orders.create_order(snapshot).await {
        Ok(created) => Ok(created),
        Err(err) if err.is_stock_guard() => {
            // Stock moved between the check and the commit. Re-fetch so the
            // customer sees current numbers.
            let issues = stock::validate(catalog, lines).await.unwrap_or_default();
            Err(CheckoutError::StockConflict(issues))
        }
        Err(err) => Err(CheckoutError::OrderCreate(err)),
    }
}

/// What the payment step settled, threaded into finalize.
#[derive(Debug, Default)]
struct PaymentReceipt {
    /// Seedling credit actually applied, capped at the verified balance.
    applied_credit: Money,
    intent_id: Option<String>,
}

/// Create and confirm the payment intent for the charge amount.
///
/// The charge is the order total minus any verified seedling credit; the
/// ledger balance is authoritative, never a client-supplied figure. On
/// failure the order stays pending and the session keeps its pending-order
/// handle for retry.
async fn take_payment(
    ctx: &CheckoutContext,
    session: &CheckoutSession,
    created: &CreatedOrder,
    total: Money,
) -> Result<PaymentReceipt, CheckoutError> {
    let services = ctx.services();

    let mut applied_credit = Money::ZERO;
    if let Some(code) = &session.credit_code {
        let balance = services
            .credits
            .verify(code, session.customer.clone())
            .await?;
        applied_credit = balance.min(total);
    }
    let charge = total.sub_saturating(applied_credit);

    let intent = services
        .payments
        .create_intent(charge, &created.id, session.session_key())
        .await
        .map_err(|err| CheckoutError::Payment(err.to_string()))?;

    match services.payments.await_confirmation(&intent.intent_id).await {
        Ok(crate::services::ConfirmOutcome::Succeeded) => Ok(PaymentReceipt {
            applied_credit,
            intent_id: Some(intent.intent_id),
        }),
        Ok(crate::services::ConfirmOutcome::RequiresAction) => Err(CheckoutError::Payment(
            "Additional authentication is required; please try again".to_owned(),
        )),
        Ok(crate::services::ConfirmOutcome::Error { message }) => {
            Err(CheckoutError::Payment(message))
        }
        Err(err) => Err(CheckoutError::Payment(err.to_string())),
    }
}

/// Post-payment completion.
///
/// Everything here runs after money has moved, so failures are logged and
/// swallowed; the customer still reaches confirmation.
async fn finalize(
    ctx: &CheckoutContext,
    cart: &CartStore,
    session: &CheckoutSession,
    created: &CreatedOrder,
    snapshot: &OrderSnapshot,
    winner: Option<&crate::models::DiscountCandidate>,
    payment: &PaymentReceipt,
) -> OrderConfirmation {
    let services = ctx.services();

    let patch = OrderPatch {
        payment_status: Some(if ctx.config().payments_enabled {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        }),
        payment_intent_id: payment.intent_id.clone(),
    };
    if let Err(err) = services.orders.update_order(&created.id, patch).await {
        error!(order = %created.id, error = %err, "failed to mark order paid");
    }

    if let Some(code) = &session.credit_code {
        if !payment.applied_credit.is_zero() {
            if let Err(err) = services
                .credits
                .redeem(code, &created.id, payment.applied_credit)
                .await
            {
                warn!(order = %created.id, error = %err, "credit redemption failed");
            }
        }
    }

    if let Some(promotion) = winner.and_then(|w| w.promotion_id.as_ref()) {
        if let Err(err) = services.promotions.record_usage(promotion, &created.id).await {
            warn!(order = %created.id, error = %err, "promotion usage recording failed");
        }
    }

    cart.clear();

    let confirmation = OrderConfirmation::from_snapshot(&created.order_number, snapshot);

    if let Some(email) = session.email.clone() {
        let notifications = services.notifications.clone();
        let send = confirmation.clone();
        tokio::spawn(async move {
            if let Err(err) = notifications.send_order_confirmation(&email, &send).await {
                warn!(error = %err, "order confirmation email failed");
            }
        });
    }

    confirmation
}

fn order_line(line: &CartLine) -> OrderLine {
    OrderLine {
        product_id: line.product_id.clone(),
        name: line.name.clone(),
        unit_price: line.unit_price,
        quantity: line.quantity,
        category: line.category.clone(),
    }
}

fn missing(field: &str, message: &str) -> CheckoutError {
    CheckoutError::Validation(vec![ValidationIssue::new(field, message)])
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use verdant_core::{CarrierId, Email, LocationId, ProductId, RateId, ScheduleId};

    use crate::models::{
        Address, FulfillmentConstraint, GrowingSystem, PickupLocation, PickupSlot,
        ShippingRateOption,
    };

    use super::*;

    fn line(constraint: FulfillmentConstraint) -> CartLine {
        CartLine {
            product_id: ProductId::new("basil"),
            name: "Basil Seedling".to_owned(),
            unit_price: Money::from_cents(400),
            compare_at_price: None,
            quantity: 2,
            category: "seedlings".to_owned(),
            constraint,
            seedlings_per_unit: 1,
        }
    }

    fn rate() -> ShippingRateOption {
        ShippingRateOption {
            rate_id: RateId::new("rate_1"),
            carrier_id: CarrierId::new("usps"),
            carrier_name: "USPS".to_owned(),
            service_name: "Ground Advantage".to_owned(),
            amount: Money::from_cents(600),
            transit_days: Some(3),
            estimated_delivery_date: None,
        }
    }

    fn shipping_session() -> CheckoutSession {
        let mut session = CheckoutSession::new();
        session.email = Some(Email::parse("fern@example.com").expect("valid email"));
        session.growing_system = Some(GrowingSystem::MediaBed);
        session.method_choice = Some(FulfillmentMethod::Shipping);
        session.address = Address {
            line1: "12 Fern Rd".to_owned(),
            line2: None,
            city: "Athens".to_owned(),
            state: "GA".to_owned(),
            postal_code: "30601".to_owned(),
            country: "US".to_owned(),
        };
        session.select_rate(rate());
        session
    }

    fn issue_fields(err: CheckoutError) -> Vec<String> {
        match err {
            CheckoutError::Validation(issues) => {
                issues.into_iter().map(|i| i.field).collect()
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_validate_complete_shipping_form_passes() {
        let session = shipping_session();
        let details = validate(&session, &[line(FulfillmentConstraint::Either)], None)
            .expect("valid form");
        assert_eq!(details.method(), FulfillmentMethod::Shipping);
    }

    #[test]
    fn test_validate_reports_all_gaps_at_once() {
        let session = CheckoutSession::new();
        let fields = issue_fields(
            validate(&session, &[], None).expect_err("empty form must fail"),
        );
        assert!(fields.contains(&"cart".to_owned()));
        assert!(fields.contains(&"email".to_owned()));
        assert!(fields.contains(&"growing_system".to_owned()));
        assert!(fields.contains(&"fulfillment".to_owned()));
    }

    #[test]
    fn test_validate_blocks_fulfillment_conflict() {
        let session = shipping_session();
        let lines = vec![
            line(FulfillmentConstraint::ShipOnly),
            line(FulfillmentConstraint::PickupOnly),
        ];
        let fields = issue_fields(
            validate(&session, &lines, None).expect_err("conflict must fail"),
        );
        assert!(fields.contains(&"fulfillment".to_owned()));
    }

    #[test]
    fn test_validate_requires_rate_for_shipping() {
        let mut session = shipping_session();
        session.edit_address(|a| a.postal_code = "30605".to_owned());
        let fields = issue_fields(
            validate(&session, &[line(FulfillmentConstraint::Either)], None)
                .expect_err("cleared rate must fail"),
        );
        assert!(fields.contains(&"shipping_rate".to_owned()));
    }

    #[test]
    fn test_validate_rejects_full_pickup_slot() {
        let mut session = shipping_session();
        session.method_choice = Some(FulfillmentMethod::Pickup);
        session.select_pickup(
            PickupLocation {
                id: LocationId::new("loc_1"),
                name: "Eastside Greenhouse".to_owned(),
                street: "12 Fern Rd".to_owned(),
                city: "Athens".to_owned(),
                state: "GA".to_owned(),
                active: true,
            },
            PickupSlot {
                schedule_id: ScheduleId::new("morning"),
                date: NaiveDate::from_ymd_opt(2026, 5, 4).expect("date"),
                start_time: NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
                end_time: NaiveTime::from_hms_opt(11, 0, 0).expect("time"),
                capacity: 4,
                booked_count: 4,
            },
        );
        let fields = issue_fields(
            validate(&session, &[line(FulfillmentConstraint::Either)], None)
                .expect_err("full slot must fail"),
        );
        assert!(fields.contains(&"pickup_slot".to_owned()));
    }

    #[test]
    fn test_validate_surfaces_invalid_code_message() {
        let session = shipping_session();
        let err = validate(
            &session,
            &[line(FulfillmentConstraint::Either)],
            Some("Code SPRING has expired"),
        )
        .expect_err("invalid code must fail");
        assert!(err.to_string().contains("Code SPRING has expired"));
    }
}
