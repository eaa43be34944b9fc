//! # Money
//!
//! Every amount in the store is a whole number of cents. Prices, line
//! subtotals, discounts, order totals and ledger entries all share this one
//! type, so nothing ever passes through a float.
//!
//! ```text
//! 34500 cents, 5% general discount
//!   float:   345.00 × 0.95      = 327.74999999999994
//!   integer: 34500 × 500 / 10000 = 1725  →  total 32775
//! ```
//!
//! Rounding happens in exactly one place, [`Money::percentage_of`].
//!
//! ```rust
//! use tienda_core::money::Money;
//!
//! let line = Money::from_cents(10000) * 3;
//! assert_eq!(line.cents(), 30000);
//! assert_eq!(line.to_string(), "$300.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Percentage;

/// A signed amount of cents. Ledger payments are negative.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole currency units, truncated toward zero.
    pub const fn units(&self) -> i64 {
        self.0 / 100
    }

    /// The 0..=99 remainder after [`Money::units`], without sign.
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub const fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub const fn multiply_quantity(&self, quantity: i64) -> Self {
        Self(self.0 * quantity)
    }

    /// `rate` of this amount, rounded half away from zero to the cent.
    ///
    /// ```text
    /// 34500 × 5.00%  = 1725.0  → 1725
    /// 999   × 12.50% = 124.875 → 125
    /// 5     × 10.00% = 0.5     → 1
    /// ```
    pub fn percentage_of(&self, rate: Percentage) -> Money {
        let scaled = i128::from(self.0) * i128::from(rate.bps());
        let half = 5_000 * scaled.signum();
        Self(((scaled + half) / 10_000) as i64)
    }

    /// The amount left after taking `rate` off.
    pub fn apply_percentage_discount(&self, rate: Percentage) -> Money {
        *self - self.percentage_of(rate)
    }

    pub fn min(self, other: Money) -> Money {
        Ord::min(self, other)
    }
}

/// Receipt format: `$1234.50`, `-$200.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            f.write_str("-")?;
        }
        write!(f, "${}.{:02}", self.units().abs(), self.cents_part())
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;
    fn mul(self, quantity: i64) -> Money {
        self.multiply_quantity(quantity)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_split() {
        let price = Money::from_cents(1099);
        assert_eq!(price.units(), 10);
        assert_eq!(price.cents_part(), 99);
        assert_eq!(Money::from_cents(-1099).cents_part(), 99);
    }

    #[test]
    fn test_receipt_format() {
        assert_eq!(Money::from_cents(32775).to_string(), "$327.75");
        assert_eq!(Money::from_cents(500).to_string(), "$5.00");
        assert_eq!(Money::from_cents(-20000).to_string(), "-$200.00");
        assert_eq!(Money::from_cents(-5).to_string(), "-$0.05");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn test_operators() {
        let mut running = Money::from_cents(1000);
        running += Money::from_cents(500);
        assert_eq!(running.cents(), 1500);
        running -= Money::from_cents(200);
        assert_eq!(running.cents(), 1300);
        assert_eq!((running * 2).cents(), 2600);
        assert_eq!((-running).cents(), -1300);
    }

    #[test]
    fn test_percentage_rounding() {
        let ten = Percentage::from_bps(1000);
        assert_eq!(Money::from_cents(5).percentage_of(ten).cents(), 1);
        assert_eq!(Money::from_cents(4).percentage_of(ten).cents(), 0);
        assert_eq!(Money::from_cents(-5).percentage_of(ten).cents(), -1);
        assert_eq!(Money::zero().percentage_of(ten).cents(), 0);
        assert_eq!(
            Money::from_cents(999).percentage_of(Percentage::from_bps(1250)).cents(),
            125
        );
    }

    #[test]
    fn test_general_discount_on_mixed_cart() {
        let subtotal = Money::from_cents(34500);
        let after = subtotal.apply_percentage_discount(Percentage::from_bps(500));
        assert_eq!(after.cents(), 32775);
    }

    #[test]
    fn test_sum_and_min() {
        let total: Money = [100, 250, -50].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 300);
        assert_eq!(Money::from_cents(7).min(Money::from_cents(3)).cents(), 3);
        assert!(Money::from_cents(-100).abs().is_positive());
    }
}
