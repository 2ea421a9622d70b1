//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Decimal, Rounded Eagerly?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Rates (0.075) and multipliers (1.25) are fractional, so integer       │
//! │  cents alone can't carry them.                                          │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal + round at the point of computation         │
//! │    amount × rate  ──► round to 2 dp ──► Money                           │
//! │    Money + Money  ──► exact (both sides already 2 dp)                   │
//! │                                                                         │
//! │  So `total == subtotal + tax + fee` holds exactly, every time.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cell_core::money::Money;
//! use rust_decimal::Decimal;
//!
//! let price = Money::round(Decimal::new(10995, 3)); // 10.995
//! assert_eq!(price.amount(), Decimal::new(1100, 2)); // 11.00
//!
//! let tax = price.apply_rate(Decimal::new(75, 3)); // 7.5%
//! assert_eq!(tax.amount(), Decimal::new(83, 2)); // 0.825 → 0.83
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Number of decimal places every monetary value carries.
pub const MONEY_SCALE: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value, always rounded to [`MONEY_SCALE`] decimal places.
///
/// ## Design Decisions
/// - **Decimal, not f64**: exact base-10 arithmetic
/// - **Rounded on construction**: there is no way to hold a 3-decimal Money
/// - **Half away from zero**: 0.825 → 0.83, matching how receipts are printed
///
/// ## Where Money is Used
/// ```text
/// TaxRequest.amount ──► subtotal ──┬──► tax  (apply_rate, scale)
///                                  ├──► fee  (FeeRule::fee_for)
///                                  └──► total = subtotal + tax + fee
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Creates a Money value, rounding to 2 decimal places.
    ///
    /// ## Example
    /// ```rust
    /// use cell_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(Money::round(Decimal::new(1005, 3)).amount(), Decimal::new(101, 2));
    /// assert_eq!(Money::round(Decimal::new(-1005, 3)).amount(), Decimal::new(-101, 2));
    /// ```
    pub fn round(value: Decimal) -> Self {
        Money(value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub fn from_units(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Returns the underlying decimal amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by a rate or multiplier and rounds the product.
    ///
    /// ## Example
    /// ```rust
    /// use cell_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let amount = Money::from_units(1000);
    /// let tax = amount.apply_rate(Decimal::new(75, 3)); // 7.5%
    /// assert_eq!(tax.amount(), Decimal::from(75));
    /// ```
    pub fn apply_rate(&self, rate: Decimal) -> Money {
        Money::round(self.0 * rate)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Always prints two decimal places (`1075.00`).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::round(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

/// Addition of two Money values is exact (both sides are already 2 dp).
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

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(Money::round(dec!(0.825)).amount(), dec!(0.83));
        assert_eq!(Money::round(dec!(0.824)).amount(), dec!(0.82));
        assert_eq!(Money::round(dec!(-0.825)).amount(), dec!(-0.83));
        assert_eq!(Money::round(dec!(2.5)).amount(), dec!(2.50));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_units(1075).to_string(), "1075.00");
        assert_eq!(Money::round(dec!(0.5)).to_string(), "0.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_apply_rate_rounds_product() {
        let amount = Money::round(dec!(19.99));
        // 19.99 × 0.075 = 1.49925
        assert_eq!(amount.apply_rate(dec!(0.075)).amount(), dec!(1.50));
    }

    #[test]
    fn test_addition_is_exact() {
        let a = Money::round(dec!(0.1));
        let b = Money::round(dec!(0.2));
        assert_eq!((a + b).amount(), dec!(0.3));

        let mut total = Money::zero();
        total += a;
        total += b;
        assert_eq!(total, a + b);
        assert_eq!((total - a).amount(), dec!(0.2));
    }

    #[test]
    fn test_zero_and_sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_negative());
        assert!(Money::round(dec!(-1)).is_negative());
        assert!(!Money::from_units(1).is_negative());
    }

    #[test]
    fn test_deserialize_rounds() {
        let money: Money = serde_json::from_str("10.125").unwrap();
        assert_eq!(money.amount(), dec!(10.13));
    }
}
