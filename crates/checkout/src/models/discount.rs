//! Discount candidates.

use serde::{Deserialize, Serialize};

use verdant_core::{Money, PromotionId};

/// Where a discount came from.
///
/// Sources are evaluated independently and reduced to a single winner; the
/// rank ordering breaks amount ties (manual code beats automatic beats
/// membership).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountSource {
    LifetimeMembership,
    AutoPromotion,
    ManualPromotionCode,
}

impl DiscountSource {
    /// Tie-break rank; higher wins at equal amounts.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::LifetimeMembership => 0,
            Self::AutoPromotion => 1,
            Self::ManualPromotionCode => 2,
        }
    }
}

/// One evaluated discount, recomputed on every cart or identity change.
///
/// At most one candidate is ever applied to an order; candidates never
/// combine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountCandidate {
    pub source: DiscountSource,
    pub amount: Money,
    /// Winner-only flag: zeroes shipping cost regardless of selected rate.
    pub free_shipping: bool,
    /// Customer-facing label (e.g. "Lifetime member 10%").
    pub label: String,
    pub promotion_id: Option<PromotionId>,
    pub promotion_code: Option<String>,
}
