//! # Money Module
//!
//! Monetary values and exchange-rate snapshots for a dual-currency store.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                         │
//! │                                                                     │
//! │  In floating point:                                                 │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                       │
//! │                                                                     │
//! │  OUR SOLUTION: Integer minor units (céntimos / cents)               │
//! │    Bs. 2000.00 is stored as 200000                                  │
//! │    $10.99 is stored as 1099                                         │
//! │                                                                     │
//! │  Exchange rates use the same trick: a rate of 40.1234 Bs/$ is       │
//! │  stored as 401234 (scaled by 10 000), so every conversion is        │
//! │  integer arithmetic with one explicit rounding step.                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Settlement tolerance
//! All "is this paid off" comparisons use [`SETTLEMENT_TOLERANCE`]
//! (0.01 currency units) instead of exact equality, so a payment that
//! converts to 99.995 against a 100.00 total still settles the document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest unit of its currency (céntimos, cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds and compensating movements need negatives
/// - **Currency-agnostic**: the currency travels next to the amount in the
///   owning record; mixing currencies is a caller bug, not a type error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

/// Fixed margin for near-equal monetary comparisons: 0.01 currency units.
///
/// Absorbs rounding noise from rate conversions. Used by every settlement
/// check in the ledger (order totals, refund matching).
pub const SETTLEMENT_TOLERANCE: Money = Money::from_cents(1);

impl Money {
    /// Creates a Money value from minor units (cents).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
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

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies by a quantity (line totals).
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Clamps a balance at zero. Used for `due_amount`, which is never
    /// allowed to go negative when payments exceed the total.
    #[inline]
    pub const fn max_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Checks whether this amount settles `total` within the tolerance.
    ///
    /// ## Example
    /// ```rust
    /// use bodegon_core::money::Money;
    ///
    /// let total = Money::from_cents(10_000);      // 100.00
    /// let paid = Money::from_cents(9_999);        // 99.99 ≈ 99.995 rounded
    /// assert!(paid.settles(total));
    /// assert!(!Money::from_cents(9_998).settles(total));
    /// ```
    #[inline]
    pub const fn settles(&self, total: Money) -> bool {
        self.0 >= total.0 - SETTLEMENT_TOLERANCE.0
    }

    /// Checks whether this amount equals `other` within the tolerance.
    /// Used to match refund instructions against the returned value.
    #[inline]
    pub const fn matches(&self, other: Money) -> bool {
        (self.0 - other.0).abs() <= SETTLEMENT_TOLERANCE.0
    }

    /// Converts a reference-currency amount to local currency.
    ///
    /// Half-up rounding on the scaled product; i128 intermediate so large
    /// totals times large rates cannot overflow.
    pub fn to_local(&self, rate: ExchangeRate) -> Money {
        let scaled = self.0 as i128 * rate.scaled() as i128;
        let rounded = if scaled >= 0 {
            (scaled + ExchangeRate::SCALE as i128 / 2) / ExchangeRate::SCALE as i128
        } else {
            (scaled - ExchangeRate::SCALE as i128 / 2) / ExchangeRate::SCALE as i128
        };
        Money(rounded as i64)
    }

    /// Converts a local-currency amount to the reference currency.
    pub fn to_reference(&self, rate: ExchangeRate) -> Money {
        let scaled = self.0 as i128 * ExchangeRate::SCALE as i128;
        let divisor = rate.scaled() as i128;
        let rounded = if scaled >= 0 {
            (scaled + divisor / 2) / divisor
        } else {
            (scaled - divisor / 2) / divisor
        };
        Money(rounded as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// A conversion rate (local currency units per one reference unit), scaled
/// by 10 000 so that four decimal places survive as integers.
///
/// A rate of 40.1234 Bs/$ is stored as `401234`.
///
/// ## Frozen rates
/// Orders copy the rate in effect at creation into
/// `exchange_rate_at_sale` and never recompute it; historical records stay
/// stable under later rate changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    /// Scale factor: rates carry four decimal places.
    pub const SCALE: i64 = 10_000;

    /// Creates a rate from its scaled integer form (40.1234 → 401234).
    #[inline]
    pub const fn from_scaled(scaled: i64) -> Self {
        ExchangeRate(scaled)
    }

    /// Creates a rate from whole local-currency units per reference unit.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        ExchangeRate(units * Self::SCALE)
    }

    /// Returns the scaled integer form.
    #[inline]
    pub const fn scaled(&self) -> i64 {
        self.0
    }

    /// A rate must be strictly positive to be usable for conversion.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / Self::SCALE, (self.0 % Self::SCALE).abs())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
