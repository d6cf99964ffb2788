//! Discount resolution.
//!
//! Three independent sources are evaluated and reduced to one winner:
//! the lifetime-membership percentage, the best automatic promotion, and a
//! manually entered code. The candidate with the strictly largest amount
//! is applied; ties prefer manual over automatic over membership.
//! Candidates never combine.

use rust_decimal::Decimal;
use tracing::instrument;

use verdant_core::CustomerId;

use crate::models::{CartLine, DiscountCandidate, DiscountSource, subtotal};
use crate::services::{CodeEvaluation, PromotionEvaluator, ServiceError};

/// Flat percentage granted to lifetime-membership customers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDiscount {
    /// e.g. 0.10 for 10% of subtotal.
    pub rate: Decimal,
    pub label: String,
}

impl Default for MembershipDiscount {
    fn default() -> Self {
        Self {
            rate: Decimal::new(10, 2),
            label: "Lifetime member 10%".to_owned(),
        }
    }
}

/// Everything discount gathering needs to know about the session.
#[derive(Debug, Clone)]
pub struct DiscountInputs<'a> {
    pub lines: &'a [CartLine],
    pub customer: Option<CustomerId>,
    /// Customer has ever redeemed a qualifying membership program.
    pub lifetime_member: bool,
    /// Manually entered promotion code, carried across navigation.
    pub entered_code: Option<&'a str>,
}

/// Gathered candidates plus the rejection message for an invalid entered
/// code, which validation reports inline.
#[derive(Debug, Clone, Default)]
pub struct GatheredDiscounts {
    pub candidates: Vec<DiscountCandidate>,
    pub invalid_code_message: Option<String>,
}

/// Evaluate all discount sources for the current cart and identity.
///
/// # Errors
///
/// Returns an error only when the promotion evaluator itself fails;
/// an invalid code is a normal outcome reported in the result.
#[instrument(skip(evaluator, inputs), fields(has_code = inputs.entered_code.is_some()))]
pub async fn gather(
    evaluator: &dyn PromotionEvaluator,
    membership: &MembershipDiscount,
    inputs: DiscountInputs<'_>,
) -> Result<GatheredDiscounts, ServiceError> {
    let mut gathered = GatheredDiscounts::default();

    if inputs.lifetime_member {
        let amount = subtotal(inputs.lines).apply_rate(membership.rate);
        if !amount.is_zero() {
            gathered.candidates.push(DiscountCandidate {
                source: DiscountSource::LifetimeMembership,
                amount,
                free_shipping: false,
                label: membership.label.clone(),
                promotion_id: None,
                promotion_code: None,
            });
        }
    }

    if let Some(auto) = evaluator
        .evaluate_auto(inputs.lines, inputs.customer.clone())
        .await?
    {
        gathered.candidates.push(auto);
    }

    if let Some(code) = inputs.entered_code {
        match evaluator
            .evaluate_code(inputs.lines, code, inputs.customer)
            .await?
        {
            CodeEvaluation::Valid(candidate) => gathered.candidates.push(candidate),
            CodeEvaluation::Invalid { message } => {
                gathered.invalid_code_message = Some(message);
            }
        }
    }

    Ok(gathered)
}

/// Reduce candidates to the single winner.
///
/// Largest amount wins; equal amounts fall back to source rank (manual >
/// automatic > membership). Candidates without a positive amount never
/// win, so an order with no real discount shows no discount line.
#[must_use]
pub fn resolve_best(candidates: Vec<DiscountCandidate>) -> Option<DiscountCandidate> {
    candidates
        .into_iter()
        .filter(|c| !c.amount.is_zero())
        .max_by_key(|c| (c.amount, c.source.rank()))
}

#[cfg(test)]
mod tests {
    use verdant_core::{Money, ProductId};

    use crate::models::FulfillmentConstraint;
    use crate::services::MockPromotionEvaluator;

    use super::*;

    fn candidate(source: DiscountSource, cents: i64, free_shipping: bool) -> DiscountCandidate {
        DiscountCandidate {
            source,
            amount: Money::from_cents(cents),
            free_shipping,
            label: format!("{source:?}"),
            promotion_id: None,
            promotion_code: None,
        }
    }

    fn cart() -> Vec<CartLine> {
        vec![CartLine {
            product_id: ProductId::new("prod_1"),
            name: "Tomato 4-pack".to_owned(),
            unit_price: Money::from_cents(2000),
            compare_at_price: None,
            quantity: 2,
            category: "vegetables".to_owned(),
            constraint: FulfillmentConstraint::Either,
            seedlings_per_unit: 4,
        }]
    }

    #[test]
    fn test_largest_amount_wins() {
        let winner = resolve_best(vec![
            candidate(DiscountSource::LifetimeMembership, 500, false),
            candidate(DiscountSource::ManualPromotionCode, 800, true),
            candidate(DiscountSource::AutoPromotion, 300, false),
        ])
        .expect("winner");
        assert_eq!(winner.amount, Money::from_cents(800));
        assert_eq!(winner.source, DiscountSource::ManualPromotionCode);
        assert!(winner.free_shipping);
    }

    #[test]
    fn test_free_shipping_reflects_winner_only() {
        let winner = resolve_best(vec![
            candidate(DiscountSource::ManualPromotionCode, 300, true),
            candidate(DiscountSource::AutoPromotion, 900, false),
        ])
        .expect("winner");
        assert_eq!(winner.source, DiscountSource::AutoPromotion);
        assert!(!winner.free_shipping);
    }

    #[test]
    fn test_tie_prefers_manual_then_auto_then_membership() {
        let winner = resolve_best(vec![
            candidate(DiscountSource::LifetimeMembership, 500, false),
            candidate(DiscountSource::AutoPromotion, 500, false),
            candidate(DiscountSource::ManualPromotionCode, 500, false),
        ])
        .expect("winner");
        assert_eq!(winner.source, DiscountSource::ManualPromotionCode);

        let winner = resolve_best(vec![
            candidate(DiscountSource::LifetimeMembership, 500, false),
            candidate(DiscountSource::AutoPromotion, 500, false),
        ])
        .expect("winner");
        assert_eq!(winner.source, DiscountSource::AutoPromotion);
    }

    #[test]
    fn test_zero_amounts_produce_no_discount() {
        assert!(resolve_best(vec![]).is_none());
        assert!(
            resolve_best(vec![candidate(DiscountSource::AutoPromotion, 0, true)]).is_none()
        );
    }

    #[tokio::test]
    async fn test_gather_includes_membership_percentage() {
        let mut evaluator = MockPromotionEvaluator::new();
        evaluator.expect_evaluate_auto().returning(|_, _| Ok(None));

        let gathered = gather(
            &evaluator,
            &MembershipDiscount::default(),
            DiscountInputs {
                lines: &cart(),
                customer: Some(CustomerId::new("cust_1")),
                lifetime_member: true,
                entered_code: None,
            },
        )
        .await
        .expect("gather");

        assert_eq!(gathered.candidates.len(), 1);
        // 10% of $40.00
        assert_eq!(gathered.candidates[0].amount, Money::from_cents(400));
        assert_eq!(
            gathered.candidates[0].source,
            DiscountSource::LifetimeMembership
        );
    }

    #[tokio::test]
    async fn test_gather_reports_invalid_code_without_failing() {
        let mut evaluator = MockPromotionEvaluator::new();
        evaluator.expect_evaluate_auto().returning(|_, _| Ok(None));
        evaluator.expect_evaluate_code().returning(|_, _, _| {
            Ok(CodeEvaluation::Invalid {
                message: "Code SPRING has expired".to_owned(),
            })
        });

        let gathered = gather(
            &evaluator,
            &MembershipDiscount::default(),
            DiscountInputs {
                lines: &cart(),
                customer: None,
                lifetime_member: false,
                entered_code: Some("SPRING"),
            },
        )
        .await
        .expect("gather");

        assert!(gathered.candidates.is_empty());
        assert_eq!(
            gathered.invalid_code_message.as_deref(),
            Some("Code SPRING has expired")
        );
    }
}
