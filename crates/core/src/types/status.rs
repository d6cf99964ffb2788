//! Status enums shared across the checkout pipeline.

use serde::{Deserialize, Serialize};

/// Payment status of a placed order.
///
/// Orders are created `Pending` before any payment attempt so a client
/// disconnect after a successful charge cannot lose the order. `Failed` is
/// terminal for the attempt; the order itself stays pending for manual
/// recovery and retried payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// How an order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentMethod {
    Shipping,
    Pickup,
}

impl std::fmt::Display for FulfillmentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shipping => write!(f, "shipping"),
            Self::Pickup => write!(f, "pickup"),
        }
    }
}

/// Outcome of carrier address validation.
///
/// `Warning` addresses are deliverable but inexact (e.g. missing unit
/// number); `Blocked` destinations cannot be served at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressStatus {
    Verified,
    Warning,
    Blocked,
}
