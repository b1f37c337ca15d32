//! # Money Module
//!
//! Provides the `Money` and `Percentage` types for handling monetary values
//! and rates safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Splitting a 40.00 card payment 80/20 between services and products:   │
//! │    40.00 × 0.8 = 31.999999999999996 → receivable of 31.99?             │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + Rational Proration                       │
//! │    4000 × 8000 / 10000 = 3200 cents exactly                            │
//! │    Second share = whole − first share, so shares always add up         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tabline_core::money::{Money, Percentage};
//!
//! let card = Money::from_cents(4000); // 40.00
//! let fee = card.apply_percentage(Percentage::from_bps(300)); // 3%
//! assert_eq!(fee.cents(), 120);
//!
//! // 40.00 split in the 80.00 : 100.00 proportion
//! let service_share = card.prorate(Money::from_cents(8000), Money::from_cents(10000));
//! assert_eq!(service_share.cents(), 3200);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// All amounts in a tenant share one local currency with two decimal places.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for divergences and reversals
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Transparent sqlx type**: Stored as a plain INTEGER column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tabline_core::money::Money;
    ///
    /// let price = Money::from_cents(8000); // Represents 80.00
    /// assert_eq!(price.cents(), 8000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts, only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50, not -4.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `rate` of this amount, rounded half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use tabline_core::money::{Money, Percentage};
    ///
    /// // 10.00 at 8.25% = 0.825 → 0.83
    /// let fee = Money::from_cents(1000).apply_percentage(Percentage::from_bps(825));
    /// assert_eq!(fee.cents(), 83);
    /// ```
    pub fn apply_percentage(&self, rate: Percentage) -> Money {
        // i128 keeps large amounts from overflowing during the multiply
        let cents = div_round(self.0 as i128 * rate.bps() as i128, 10_000);
        Money(cents as i64)
    }

    /// Returns the share of this amount proportional to `part / whole`.
    ///
    /// ## Proration
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  payment 60.00, services 80.00, order total 100.00                  │
    /// │                                                                     │
    /// │  6000 × 8000 / 10000 = 4800  → Service share 48.00                  │
    /// │  6000 − 4800         = 1200  → Product share 12.00                  │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// A zero `whole` yields zero. Rounds half away from zero.
    pub fn prorate(&self, part: Money, whole: Money) -> Money {
        if whole.is_zero() {
            return Money::zero();
        }
        let cents = div_round(self.0 as i128 * part.0 as i128, whole.0 as i128);
        Money(cents as i64)
    }

    /// Returns the larger of two values.
    #[inline]
    pub fn max(self, other: Money) -> Money {
        if self >= other {
            self
        } else {
            other
        }
    }

    /// Clamps negative values to zero.
    #[inline]
    pub fn non_negative(self) -> Money {
        self.max(Money::zero())
    }
}

/// Integer division rounding half away from zero.
fn div_round(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        let sign = if (numerator < 0) == (denominator < 0) { 1 } else { -1 };
        quotient + sign
    } else {
        quotient
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as `12.34` (tenant-local currency, no symbol).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by i64 (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Percentage
// =============================================================================

/// A rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so every rate a payment processor or a
/// commission agreement quotes with two decimals is exact:
/// 300 bps = 3%, 1250 bps = 12.5%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct Percentage(u32);

impl Percentage {
    /// 100%.
    pub const FULL: Percentage = Percentage(10_000);

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Percentage::zero()
    }
}

/// Shows the rate as `3.00%`.
impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
        assert_eq!(Percentage::from_bps(300).to_string(), "3.00%");
        assert_eq!(Percentage::from_bps(1250).to_string(), "12.50%");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_apply_percentage_rounds_half_away_from_zero() {
        let amount = Money::from_cents(1000);
        assert_eq!(amount.apply_percentage(Percentage::from_bps(825)).cents(), 83);
        assert_eq!(amount.apply_percentage(Percentage::FULL).cents(), 1000);
        assert_eq!(amount.apply_percentage(Percentage::zero()).cents(), 0);

        let negative = Money::from_cents(-1000);
        assert_eq!(negative.apply_percentage(Percentage::from_bps(825)).cents(), -83);
    }

    #[test]
    fn test_prorate_matches_worked_example() {
        let services = Money::from_cents(8000);
        let total = Money::from_cents(10000);

        assert_eq!(Money::from_cents(6000).prorate(services, total).cents(), 4800);
        assert_eq!(Money::from_cents(4000).prorate(services, total).cents(), 3200);

        // Fixed fee 0.50 pro-rated by sub-amount / full amount
        let fixed_fee = Money::from_cents(50);
        let card = Money::from_cents(4000);
        assert_eq!(fixed_fee.prorate(Money::from_cents(3200), card).cents(), 40);
        assert_eq!(fixed_fee.prorate(Money::from_cents(800), card).cents(), 10);
    }

    #[test]
    fn test_prorate_zero_whole_is_zero() {
        let amount = Money::from_cents(1234);
        assert_eq!(amount.prorate(Money::from_cents(1), Money::zero()), Money::zero());
    }

    #[test]
    fn test_prorate_rounding() {
        // 10.00 × 1/3 = 3.333 → 3.33, 10.00 × 2/3 = 6.667 → 6.67
        let ten = Money::from_cents(1000);
        let whole = Money::from_cents(3);
        assert_eq!(ten.prorate(Money::from_cents(1), whole).cents(), 333);
        assert_eq!(ten.prorate(Money::from_cents(2), whole).cents(), 667);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(-100).is_negative());
        assert_eq!(Money::from_cents(-100).non_negative(), Money::zero());
        assert_eq!(Money::from_cents(-100).abs().cents(), 100);
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&Money::from_cents(4800)).unwrap();
        assert_eq!(json, "4800");
        let rate: Percentage = serde_json::from_str("300").unwrap();
        assert_eq!(rate.bps(), 300);
    }
}
