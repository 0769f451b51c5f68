use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("cannot parse dollar amount {0:?}")]
    Unparseable(String),
    #[error("dollar amount {0:?} does not fit in a cent ledger")]
    OutOfRange(String),
}

/// An amount of US dollars held as integer cents.
///
/// Cents are the source of truth for all balance arithmetic; `Decimal`
/// dollars exist only at parse/display boundaries. The value is signed so
/// that adjustment deltas can be negative, but ledger balances are kept
/// non-negative by the callers via [`Money::saturating_sub`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Parse a user-entered decimal dollar string into cents.
    ///
    /// An empty string is zero. Sub-cent precision is truncated toward zero
    /// ("1.239" becomes 123 cents, "-1.239" becomes -123), matching the
    /// historical ledger behavior that downstream balances were built on.
    pub fn from_dollars_str(s: &str) -> Result<Self, MoneyError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Money::ZERO);
        }
        let dollars: Decimal = trimmed
            .parse()
            .map_err(|_| MoneyError::Unparseable(s.to_string()))?;
        let cents = (dollars * Decimal::from(100))
            .trunc()
            .to_i64()
            .ok_or_else(|| MoneyError::OutOfRange(s.to_string()))?;
        Ok(Money(cents))
    }

    /// Convert decimal dollars already in hand (e.g. off the wire) to
    /// cents, truncating sub-cent precision toward zero.
    pub fn from_dollars(dollars: Decimal) -> Result<Self, MoneyError> {
        let cents = (dollars * Decimal::from(100))
            .trunc()
            .to_i64()
            .ok_or_else(|| MoneyError::OutOfRange(dollars.to_string()))?;
        Ok(Money(cents))
    }

    /// Decimal dollars with two fractional digits.
    pub fn to_dollars(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Subtraction clamped at zero. Balance debits go through here so no
    /// remaining-amount field ever goes negative.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Apply a coinsurance-style rate, truncating any sub-cent result
    /// toward zero (same convention as [`Money::from_dollars_str`]).
    pub fn apply_rate(self, rate: Decimal) -> Money {
        let cents = (Decimal::from(self.0) * rate).trunc().to_i64().unwrap_or(0);
        Money(cents)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dollars())
    }
}
