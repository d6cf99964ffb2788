//! Unified error handling for the checkout pipeline.
//!
//! Every pipeline entry point returns `Result<T, CheckoutError>`. Variants
//! distinguish problems the customer can fix (validation, stock, blocked
//! zones, declined payments) from upstream service failures.

use thiserror::Error;

use crate::models::StockIssue;
use crate::services::ServiceError;

/// A single field-level problem with the checkout form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Form field the issue belongs to, e.g. `"email"` or `"shipping_rate"`.
    pub field: String,
    /// Customer-facing message.
    pub message: String,
}

impl ValidationIssue {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Checkout-level error type.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The checkout form is incomplete or inconsistent.
    #[error("Validation failed: {}", format_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// Requested quantities exceed current availability.
    #[error("Insufficient stock for {} item(s)", .0.len())]
    StockConflict(Vec<StockIssue>),

    /// The destination is in a zone we do not ship to.
    #[error("Shipping unavailable: {0}")]
    ZoneBlocked(String),

    /// Payment was declined or could not be confirmed.
    #[error("Payment failed: {0}")]
    Payment(String),

    /// Order creation failed upstream.
    #[error("Order creation failed: {0}")]
    OrderCreate(#[source] ServiceError),

    /// An upstream service call failed.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.field, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for `CheckoutError`.
pub type Result<T> = std::result::Result<T, CheckoutError>;
