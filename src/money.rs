//! Exact currency arithmetic.
//!
//! Amounts are integer minor units (cents) everywhere they touch the store;
//! `rust_decimal` carries the fractional math (parsing, rate application)
//! so no floating point ever gets near money.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use crate::error::{Error, Result};

/// One-time late fee applied to overdue pending bills: 10%.
pub const PENALTY_RATE_PERCENT: i64 = 10;

/// A currency amount in minor units. Construct via [`Money::from_cents`]
/// or [`Money::parse`]; arithmetic stays in integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    /// Parse a decimal string ("300.00", "12.5") into an exact cent amount.
    /// Sub-cent precision is rejected rather than silently rounded.
    pub fn parse(s: &str) -> Result<Self> {
        let dec: Decimal = s
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("invalid amount: {s:?}")))?;
        Self::from_decimal(dec)
    }

    pub fn from_decimal(dec: Decimal) -> Result<Self> {
        let scaled = dec * Decimal::from(100);
        if scaled.fract() != Decimal::ZERO {
            return Err(Error::Validation(format!(
                "amount {dec} has sub-cent precision"
            )));
        }
        scaled
            .to_i64()
            .map(Money)
            .ok_or_else(|| Error::Validation(format!("amount {dec} out of range")))
    }

    pub fn as_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Apply a whole-percent rate, rounding half-up to the cent.
    /// Used for the late-fee computation.
    pub fn percent(self, rate_percent: i64) -> Money {
        let fee = self.as_decimal() * Decimal::new(rate_percent, 2);
        let rounded = fee.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        // Two-decimal rounding keeps the mantissa within i64 cents.
        Money((rounded * Decimal::from(100)).to_i64().unwrap_or(0))
    }

    /// Split evenly across `n` recipients with largest-remainder allocation:
    /// everyone gets `floor(cents / n)`, and the first `cents % n` recipients
    /// one extra cent, so the parts always sum back to the whole.
    pub fn split_even(self, n: usize) -> Vec<Money> {
        if n == 0 {
            return Vec::new();
        }
        let n = n as i64;
        let base = self.0.div_euclid(n);
        let rem = self.0.rem_euclid(n);
        (0..n)
            .map(|i| Money(base + if i < rem { 1 } else { 0 }))
            .collect()
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_i64().map(Money).map_err(|_| FromSqlError::InvalidType)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_sub_cent() {
        assert_eq!(Money::parse("300.00").unwrap().cents(), 30000);
        assert_eq!(Money::parse("12.5").unwrap().cents(), 1250);
        assert!(Money::parse("1.005").is_err());
        assert!(Money::parse("abc").is_err());
    }

    #[test]
    fn split_conserves_total() {
        let total = Money::parse("300.00").unwrap();
        let parts = total.split_even(3);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.cents() == 10000));

        // Non-divisible: 100.00 across 3 = 33.34 + 33.33 + 33.33
        let parts = Money::parse("100.00").unwrap().split_even(3);
        assert_eq!(
            parts.iter().map(|p| p.cents()).collect::<Vec<_>>(),
            vec![3334, 3333, 3333]
        );
        assert_eq!(parts.into_iter().sum::<Money>().cents(), 10000);
    }

    #[test]
    fn split_by_zero_is_empty() {
        assert!(Money::from_cents(500).split_even(0).is_empty());
    }

    #[test]
    fn ten_percent_penalty() {
        assert_eq!(
            Money::parse("100.00").unwrap().percent(PENALTY_RATE_PERCENT),
            Money::parse("10.00").unwrap()
        );
        // Half-up at the cent boundary: 10% of 33.33 = 3.333 -> 3.33
        assert_eq!(Money::from_cents(3333).percent(10).cents(), 333);
        // 10% of 0.05 = 0.005 -> 0.01
        assert_eq!(Money::from_cents(5).percent(10).cents(), 1);
    }

    #[test]
    fn display_is_two_decimal() {
        assert_eq!(Money::from_cents(30000).to_string(), "300.00");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
    }
}
