//! Pre-commit stock validation.
//!
//! Runs immediately before order creation against live availability. If
//! any line exceeds what's on hand the submission halts; the caller either
//! reduces quantities or abandons. Partially available stock is never
//! silently substituted.

use tracing::instrument;

use crate::models::{CartLine, StockIssue};
use crate::services::{CatalogService, ServiceError};

/// Compare requested quantities against live inventory.
///
/// Returns one issue per short line; an empty vec means the cart is
/// fully coverable.
///
/// # Errors
///
/// Returns an error if a live availability lookup fails.
#[instrument(skip(catalog, lines), fields(line_count = lines.len()))]
pub async fn validate(
    catalog: &dyn CatalogService,
    lines: &[CartLine],
) -> Result<Vec<StockIssue>, ServiceError> {
    let mut issues = Vec::new();

    for line in lines {
        let available = catalog.available_quantity(&line.product_id).await?;
        if available < line.quantity {
            issues.push(StockIssue {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                requested: line.quantity,
                available,
            });
        }
    }

    Ok(issues)
}

/// Reduce a cart to reported availability, dropping lines at zero.
///
/// The resolution path offered to the customer after a stock conflict.
pub fn clamp_to_available(lines: &mut Vec<CartLine>, issues: &[StockIssue]) {
    lines.retain_mut(|line| {
        match issues.iter().find(|i| i.product_id == line.product_id) {
            Some(issue) if issue.available == 0 => false,
            Some(issue) => {
                line.quantity = issue.available;
                true
            }
            None => true,
        }
    });
}
