use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use crate::LedgerError;

/// Signed money amount represented as **integer rupiah**.
///
/// Use this type for all monetary values (balances, transaction amounts,
/// asset prices) to avoid floating-point drift.
///
/// The value is signed:
/// - positive = income / increase
/// - negative = expense / decrease
///
/// # Examples
///
/// ```rust
/// use ledger::Money;
///
/// let amount = Money::new(10_500);
/// assert_eq!(amount.minor(), 10_500);
/// assert_eq!(amount.to_string(), "Rp 10.500");
/// ```
///
/// Parsing accepts `.` or `,` as thousands separator:
///
/// ```rust
/// use ledger::Money;
///
/// assert_eq!("50000".parse::<Money>().unwrap().minor(), 50_000);
/// assert_eq!("50.000".parse::<Money>().unwrap().minor(), 50_000);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from minor units (whole rupiah).
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }
}

impl fmt::Display for Money {
    /// Formats the amount the way the bot shows rupiah: `Rp 10.500`,
    /// negative amounts as `-Rp 10.500`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let digits = self.0.unsigned_abs().to_string();

        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        let offset = digits.len() % 3;
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (i + 3 - offset) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }

        write!(f, "{sign}Rp {grouped}")
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
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

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl FromStr for Money {
    type Err = LedgerError;

    /// Parses a plain rupiah amount.
    ///
    /// Accepts an optional leading `+`/`-`, an optional `Rp` prefix, and `.`
    /// or `,` as thousands separators. Fractional rupiah are rejected (IDR
    /// has no minor units); multiplier shorthand like `50rb` is handled by
    /// the bot's input parser, not here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || LedgerError::InvalidAmount("empty amount".to_string());
        let invalid = || LedgerError::InvalidAmount("invalid amount".to_string());
        let overflow = || LedgerError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (sign, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (-1i64, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (1i64, stripped)
        } else {
            (1i64, trimmed)
        };

        let rest = rest.trim();
        let rest = rest
            .strip_prefix("Rp")
            .or_else(|| rest.strip_prefix("rp"))
            .unwrap_or(rest)
            .trim();
        if rest.is_empty() {
            return Err(empty());
        }

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                '.' | ',' => {}
                _ => return Err(invalid()),
            }
        }
        if digits.is_empty() {
            return Err(invalid());
        }

        let value: i64 = digits.parse().map_err(|_| overflow())?;
        let signed = if sign < 0 {
            value.checked_neg().ok_or_else(overflow)?
        } else {
            value
        };

        Ok(Money(signed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_idr() {
        assert_eq!(Money::new(0).to_string(), "Rp 0");
        assert_eq!(Money::new(500).to_string(), "Rp 500");
        assert_eq!(Money::new(10_500).to_string(), "Rp 10.500");
        assert_eq!(Money::new(1_250_000).to_string(), "Rp 1.250.000");
        assert_eq!(Money::new(-75_000).to_string(), "-Rp 75.000");
    }

    #[test]
    fn parse_accepts_separators_and_prefix() {
        assert_eq!("50000".parse::<Money>().unwrap().minor(), 50_000);
        assert_eq!("50.000".parse::<Money>().unwrap().minor(), 50_000);
        assert_eq!("1,250,000".parse::<Money>().unwrap().minor(), 1_250_000);
        assert_eq!("Rp 25.000".parse::<Money>().unwrap().minor(), 25_000);
        assert_eq!("-10000".parse::<Money>().unwrap().minor(), -10_000);
        assert_eq!(" +500 ".parse::<Money>().unwrap().minor(), 500);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("12x00".parse::<Money>().is_err());
        assert!("Rp".parse::<Money>().is_err());
    }
}
