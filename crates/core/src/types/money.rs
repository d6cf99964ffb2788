//! Type-safe money representation using decimal arithmetic.
//!
//! All checkout math runs on [`rust_decimal::Decimal`] and rounds to two
//! decimal places only at well-defined points (tax, rate application).
//! The storefront is single-currency (USD), so `Money` carries the amount
//! alone; display formatting prepends the dollar sign.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A USD monetary amount in dollars (not cents).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero dollars.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a money amount from a decimal dollar value.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a money amount from an integer cent count.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal dollar amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount as whole cents, rounded half-up.
    ///
    /// Used at the payment-gateway boundary, which bills in the smallest
    /// currency unit.
    #[must_use]
    pub fn to_cents(&self) -> i64 {
        let cents = (self.0 * Decimal::from(100)).round();
        cents.try_into().unwrap_or(0)
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, clamping at zero.
    ///
    /// Discounts and credits must never drive a charge negative.
    #[must_use]
    pub fn sub_saturating(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Multiply by a rate (e.g. a tax rate), rounding to two decimal places.
    #[must_use]
    pub fn apply_rate(self, rate: Decimal) -> Self {
        Self((self.0 * rate).round_dp(2))
    }

    /// Multiply by a unit count.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
