//! Nexus-based sales tax calculation.
//!
//! Pure function, no I/O. The same inputs always produce the same output;
//! the pipeline computes tax once for display and once authoritatively at
//! commit, and the two must agree.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use verdant_core::Money;

/// Sales tax configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxConfig {
    pub enabled: bool,
    /// Rate applied inside nexus states (e.g. 0.07 for 7%).
    pub default_rate: Decimal,
    /// Two-letter state codes where the nursery has tax nexus.
    pub nexus_states: Vec<String>,
    /// Label shown on the order (e.g. "GA Sales Tax").
    pub label: String,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_rate: Decimal::new(7, 2),
            nexus_states: vec!["GA".to_owned()],
            label: "Sales Tax".to_owned(),
        }
    }
}

/// Computed tax for one order, with an audit trail of why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxResult {
    pub rate: Decimal,
    pub amount: Money,
    pub label: String,
    pub audit_note: String,
    pub is_taxable: bool,
}

impl TaxResult {
    fn untaxed(label: &str, audit_note: String) -> Self {
        Self {
            rate: Decimal::ZERO,
            amount: Money::ZERO,
            label: label.to_owned(),
            audit_note,
            is_taxable: false,
        }
    }
}

/// Calculate sales tax for a destination.
///
/// Decision order: disabled, then exemption, then nexus membership, then
/// the configured rate rounded to cents. Pickup orders pass the pickup
/// location's state, which is always in-state.
#[must_use]
pub fn calculate(
    subtotal: Money,
    destination_state: &str,
    exemption_reason: Option<&str>,
    config: &TaxConfig,
) -> TaxResult {
    if !config.enabled {
        return TaxResult::untaxed(&config.label, "Tax collection disabled".to_owned());
    }

    if let Some(reason) = exemption_reason {
        return TaxResult::untaxed(&config.label, format!("Tax-exempt: {reason}"));
    }

    let state = destination_state.trim().to_uppercase();
    if !config.nexus_states.iter().any(|s| s.eq_ignore_ascii_case(&state)) {
        return TaxResult::untaxed(&config.label, format!("Out of state ({state})"));
    }

    TaxResult {
        rate: config.default_rate,
        amount: subtotal.apply_rate(config.default_rate),
        label: config.label.clone(),
        audit_note: format!("{state} nexus at {}", config.default_rate),
        is_taxable: true,
    }
}
