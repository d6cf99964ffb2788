//! Per-checkout session state.
//!
//! Holds the form inputs, current selections, and the two pieces of commit
//! state the submission flow depends on: the pending order persisted before
//! payment (charged as-is on retry) and the one-shot completion marker that
//! makes a resubmitted checkout a no-op.

use uuid::Uuid;

use verdant_core::{CustomerId, Email, FulfillmentMethod};

use crate::models::{
    Address, CreatedOrder, DiscountCandidate, GrowingSystem, OrderConfirmation, OrderSnapshot,
    PickupLocation, PickupSlot, ShippingRateOption,
};

/// An order persisted before a payment attempt that has not finalized.
///
/// Carries the commit-time snapshot so a retry charges and confirms exactly
/// what was persisted, regardless of cart edits in between.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    pub created: CreatedOrder,
    pub snapshot: OrderSnapshot,
    /// The discount that won at commit time, kept for usage recording.
    pub winner: Option<DiscountCandidate>,
}

/// Mutable state for one checkout attempt.
#[derive(Debug, Default)]
pub struct CheckoutSession {
    /// Stable identifier for this session, used as the payment metadata and
    /// abandoned-cart key.
    session_key: String,

    pub email: Option<Email>,
    pub customer: Option<CustomerId>,
    pub lifetime_member: bool,
    pub growing_system: Option<GrowingSystem>,
    /// Tax exemption reason for qualifying customers (e.g. resale permit).
    pub tax_exemption: Option<String>,

    /// Customer's method choice when the cart allows either.
    pub method_choice: Option<FulfillmentMethod>,
    pub address: Address,
    pub pickup_location: Option<PickupLocation>,
    pub selected_slot: Option<PickupSlot>,

    /// Entered promotion code, carried across navigation so it survives a
    /// return to checkout.
    pub entered_code: Option<String>,
    /// Seedling buy-back credit code. The verified balance comes from the
    /// ledger at payment time, never from the client.
    pub credit_code: Option<String>,

    selected_rate: Option<ShippingRateOption>,
    /// Monotonic counter for rate requests; a response is discarded unless
    /// it carries the latest token (last-request-wins).
    rate_request_seq: u64,

    pending_order: Option<PendingOrder>,
    completion: Option<OrderConfirmation>,
}

/// Token tying a rate response back to the request that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRequestToken(u64);

impl CheckoutSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_key: Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Edit the shipping address. Any selected rate is cleared and any
    /// in-flight rate request is invalidated, so a stale rate can never be
    /// submitted.
    pub fn edit_address(&mut self, edit: impl FnOnce(&mut Address)) {
        edit(&mut self.address);
        self.selected_rate = None;
        self.rate_request_seq += 1;
    }

    /// Start a rate request for the current address.
    #[must_use]
    pub fn begin_rate_request(&mut self) -> RateRequestToken {
        self.rate_request_seq += 1;
        RateRequestToken(self.rate_request_seq)
    }

    /// Whether a rate response is still current, or was superseded by a
    /// newer request or an address edit while in flight.
    #[must_use]
    pub fn rate_request_current(&self, token: RateRequestToken) -> bool {
        self.rate_request_seq == token.0
    }

    pub fn select_rate(&mut self, rate: ShippingRateOption) {
        self.selected_rate = Some(rate);
    }

    #[must_use]
    pub fn selected_rate(&self) -> Option<&ShippingRateOption> {
        self.selected_rate.as_ref()
    }

    pub fn select_pickup(&mut self, location: PickupLocation, slot: PickupSlot) {
        self.pickup_location = Some(location);
        self.selected_slot = Some(slot);
    }

    /// The pending order from an earlier payment attempt, if any.
    #[must_use]
    pub fn pending_order(&self) -> Option<&PendingOrder> {
        self.pending_order.as_ref()
    }

    pub(crate) fn set_pending_order(&mut self, pending: PendingOrder) {
        self.pending_order = Some(pending);
    }

    /// The confirmation from a finished submission, if this session already
    /// completed.
    #[must_use]
    pub fn completion(&self) -> Option<&OrderConfirmation> {
        self.completion.as_ref()
    }

    /// Flip the one-shot completion guard. Called once, strictly after
    /// finalize succeeds.
    pub(crate) fn complete(&mut self, confirmation: OrderConfirmation) {
        self.pending_order = None;
        self.completion = Some(confirmation);
    }
}
