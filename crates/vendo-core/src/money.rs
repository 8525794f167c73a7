//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    1099 cents = $10.99, arithmetic stays exact                          │
//! │    Rounding happens in exactly one place (discount allocation)          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use vendo_core::money::Money;
//!
//! let price = Money::from_cents(1099); // $10.99
//! let line = price * 3;                // $32.97
//! assert_eq!(line.cents(), 3297);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for returns and corrections
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use vendo_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
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

    /// Subtraction clamped at zero.
    ///
    /// Order totals never go below zero, however large the discount.
    #[inline]
    pub const fn saturating_sub_to_zero(&self, other: Money) -> Money {
        let diff = self.0 - other.0;
        if diff < 0 {
            Money(0)
        } else {
            Money(diff)
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use vendo_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299); // $2.99
    /// let line_total = unit_price.multiply_quantity(3);
    /// assert_eq!(line_total.cents(), 897); // $8.97
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Allocates a share of an aggregate discount to this line and returns
    /// the net amount.
    ///
    /// ## The Allocation Rule
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  N bundled items, aggregate discount D, subtotal S = Σ prices       │
    /// │                                                                     │
    /// │  net_i = price_i − (price_i / S) × D        (floored at zero)       │
    /// │                                                                     │
    /// │  The discount is split proportionally to each item's share of the   │
    /// │  pre-discount subtotal.                                             │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Arguments
    /// * `subtotal` - Pre-discount sum of all bundled prices
    /// * `discount` - Aggregate discount applied to the bundle
    ///
    /// ## Example
    /// ```rust
    /// use vendo_core::money::Money;
    ///
    /// let price = Money::from_cents(3000);      // $30.00 of a $100 bundle
    /// let subtotal = Money::from_cents(10000);
    /// let discount = Money::from_cents(1000);   // $10.00 off
    ///
    /// // $30 − 30% of $10 = $27.00
    /// assert_eq!(price.allocate_discount(subtotal, discount).cents(), 2700);
    /// ```
    pub fn allocate_discount(&self, subtotal: Money, discount: Money) -> Money {
        if subtotal.0 <= 0 || discount.0 <= 0 {
            return *self;
        }

        // i128 keeps the intermediate product from overflowing; the +S/2
        // term rounds the share to the nearest cent.
        let share =
            (self.0 as i128 * discount.0 as i128 + subtotal.0 as i128 / 2) / subtotal.0 as i128;
        let net = self.0 - share as i64;
        Money(net.max(0))
    }

    /// Formats the value as a plain decimal string with exactly two decimal
    /// places and no currency symbol. Used by the CSV export.
    ///
    /// ## Example
    /// ```rust
    /// use vendo_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).format_decimal(), "10.99");
    /// assert_eq!(Money::from_cents(-550).format_decimal(), "-5.50");
    /// assert_eq!(Money::zero().format_decimal(), "0.00");
    /// ```
    pub fn format_decimal(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.0.abs() / 100, self.0.abs() % 100)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// For debugging and log output; UI formatting handles localization.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by integer (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Summation over iterators of Money (metric accumulation).
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
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
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(Money::from_cents(1099).format_decimal(), "10.99");
        assert_eq!(Money::from_cents(500).format_decimal(), "5.00");
        assert_eq!(Money::from_cents(-550).format_decimal(), "-5.50");
        assert_eq!(Money::from_cents(-50).format_decimal(), "-0.50");
        assert_eq!(Money::zero().format_decimal(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        let result: Money = a * 3;
        assert_eq!(result.cents(), 3000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 49]
            .into_iter()
            .map(Money::from_cents)
            .sum();
        assert_eq!(total.cents(), 399);
    }

    #[test]
    fn test_saturating_sub_to_zero() {
        let a = Money::from_cents(500);
        assert_eq!(a.saturating_sub_to_zero(Money::from_cents(200)).cents(), 300);
        assert_eq!(a.saturating_sub_to_zero(Money::from_cents(900)).cents(), 0);
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::from_cents(299);
        let line_total = unit_price.multiply_quantity(3);
        assert_eq!(line_total.cents(), 897);
    }

    #[test]
    fn test_allocate_discount_proportional() {
        // $30 + $70 bundle with $10 off: shares are $3 and $7
        let subtotal = Money::from_cents(10000);
        let discount = Money::from_cents(1000);

        let a = Money::from_cents(3000).allocate_discount(subtotal, discount);
        let b = Money::from_cents(7000).allocate_discount(subtotal, discount);

        assert_eq!(a.cents(), 2700);
        assert_eq!(b.cents(), 6300);
        assert_eq!((a + b).cents(), 9000);
    }

    /// With a zero discount, every component's net equals its price.
    #[test]
    fn test_allocate_discount_zero_is_identity() {
        let subtotal = Money::from_cents(12345);
        for price in [0, 1, 99, 4567, 12345] {
            let price = Money::from_cents(price);
            assert_eq!(price.allocate_discount(subtotal, Money::zero()), price);
        }
    }

    /// A discount larger than the line's price floors the net at zero.
    #[test]
    fn test_allocate_discount_floors_at_zero() {
        let price = Money::from_cents(100);
        let net = price.allocate_discount(Money::from_cents(100), Money::from_cents(500));
        assert_eq!(net.cents(), 0);
    }
}
