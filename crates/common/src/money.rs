//! Money in integer minor units.

use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point drift.
///
/// Serialized as the bare cent count. Wire formats that speak in major
/// units (`29.99`) convert through [`Money::from_major`] / [`Money::as_major`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Largest amount any order, payment or price may carry (10^12 major units).
    pub const MAX: Money = Money(100_000_000_000_000);

    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a Money amount from a major-unit value, rounding to the nearest cent.
    ///
    /// Input outside `±MAX` is clamped. Untrusted values go through
    /// [`Money::try_from_major`].
    pub fn from_major(amount: f64) -> Self {
        Self::try_from_major(amount).unwrap_or(if amount.is_sign_negative() {
            Money(-Self::MAX.0)
        } else {
            Self::MAX
        })
    }

    /// Converts a major-unit value, or `None` if it is not finite or beyond `±MAX`.
    pub fn try_from_major(amount: f64) -> Option<Self> {
        let cents = (amount * 100.0).round();
        if !cents.is_finite() || cents.abs() > Self::MAX.0 as f64 {
            return None;
        }
        Some(Self(cents as i64))
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the amount in major units.
    pub fn as_major(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns true if the amount lies within `±MAX`.
    pub fn is_within_bounds(&self) -> bool {
        self.0.abs() <= Self::MAX.0
    }

    /// Multiplies by a quantity, saturating at the `i64` range.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Multiplies by a quantity, or `None` if the product leaves `±MAX`.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Money)
            .filter(Money::is_within_bounds)
    }

    /// Adds, or `None` if the sum leaves `±MAX`.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .filter(Money::is_within_bounds)
    }

    /// Divides by a quantity, rounding half away from zero. Zero divisor yields zero.
    pub fn divide_rounded(&self, divisor: u32) -> Money {
        if divisor == 0 {
            return Money::zero();
        }
        let divisor = i64::from(divisor);
        let half = divisor / 2;
        let rounded = if self.0 >= 0 {
            self.0.saturating_add(half) / divisor
        } else {
            self.0.saturating_sub(half) / divisor
        };
        Money(rounded)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
