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
//! │  OUR SOLUTION: Integer Rupiah                                           │
//! │    IDR has no minor unit in practice, so one Money unit = Rp1.          │
//! │    12_000_000 / 2 = 6_000_000, exactly, every time.                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use gerai_core::money::Money;
//!
//! let price = Money::from_rupiah(12_500_000);
//! let total = price + Money::from_rupiah(500_000);
//! assert_eq!(total.rupiah(), 13_000_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole rupiah.
///
/// ## Design Decisions
/// - **i64 (signed)**: allows negative values for refunds and adjustments
/// - **Single-field tuple struct**: zero-cost abstraction over i64
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole rupiah.
    #[inline]
    pub const fn from_rupiah(rupiah: i64) -> Self {
        Money(rupiah)
    }

    /// Returns the value in whole rupiah.
    #[inline]
    pub const fn rupiah(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the smaller of two values.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// Subtraction clamped at zero. An order total never goes negative,
    /// even when a fixed discount exceeds the subtotal.
    #[inline]
    pub const fn saturating_sub_floor_zero(self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 { Money(0) } else { Money(diff) }
    }

    /// Applies a percentage given in basis points (1000 bps = 10%) and
    /// returns the resulting portion, rounded half-up.
    ///
    /// Round-half-up keeps repeated discount computations deterministic:
    /// the same code on the same subtotal always yields the same amount.
    ///
    /// ## Example
    /// ```rust
    /// use gerai_core::money::Money;
    ///
    /// let subtotal = Money::from_rupiah(12_000_000);
    /// assert_eq!(subtotal.percentage_bps(1000).rupiah(), 1_200_000); // 10%
    /// assert_eq!(Money::from_rupiah(125).percentage_bps(5000).rupiah(), 63); // 62.5 → 63
    /// ```
    pub fn percentage_bps(&self, bps: u32) -> Money {
        // i128 to prevent overflow on large amounts; +5000 rounds half up
        let portion = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money(portion as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display for logs and operator messages. Indonesian grouping: `Rp12.000.000`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let digits = self.0.abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        write!(f, "{sign}Rp{grouped}")
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
