//! Currency value type for the `"$12.34"` strings stored in rate sheets.
//!
//! Amounts are non-negative, held at two decimal places and fit a
//! `numeric(10,2)` column. Parsing
//! accepts the amount with or without a leading `$`; formatting always
//! produces the `$`-prefixed form the stored JSON uses.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::calculators::{round_money, MAX_AMOUNT};

/// Errors from parsing a currency string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("amount is empty")]
    Empty,

    #[error("amount {0:?} is not a valid number")]
    Invalid(String),

    #[error("amount {0:?} is negative")]
    Negative(String),

    #[error("amount {0:?} exceeds {max}", max = MAX_AMOUNT)]
    TooLarge(String),
}

/// Non-negative dollar amount quantized to cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Wrap a decimal amount, rounding half-up to cents.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount < Decimal::ZERO {
            return Err(MoneyError::Negative(amount.to_string()));
        }
        Self::bounded(round_money(amount, 2), || amount.to_string())
    }

    /// Parse `"$12.34"`, `"12.34"` or `"12"`.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
        if digits.is_empty() {
            return Err(MoneyError::Empty);
        }

        let amount = Decimal::from_str(digits).map_err(|_| MoneyError::Invalid(input.to_string()))?;
        if amount < Decimal::ZERO {
            return Err(MoneyError::Negative(input.to_string()));
        }

        Self::bounded(round_money(amount, 2), || input.to_string())
    }

    fn bounded(amount: Decimal, raw: impl FnOnce() -> String) -> Result<Self, MoneyError> {
        if amount > MAX_AMOUNT {
            return Err(MoneyError::TooLarge(raw()));
        }
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Money::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_with_and_without_dollar_sign() {
        assert_eq!(Money::parse("$12.34").unwrap().amount(), dec!(12.34));
        assert_eq!(Money::parse("12.34").unwrap().amount(), dec!(12.34));
        assert_eq!(Money::parse(" $ 7 ").unwrap().amount(), dec!(7));
    }

    #[test]
    fn test_parse_rounds_half_up_to_cents() {
        assert_eq!(Money::parse("$1.005").unwrap().amount(), dec!(1.01));
        assert_eq!(Money::parse("$1.004").unwrap().amount(), dec!(1.00));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(Money::parse(""), Err(MoneyError::Empty));
        assert_eq!(Money::parse("$"), Err(MoneyError::Empty));
        assert!(matches!(Money::parse("abc"), Err(MoneyError::Invalid(_))));
        assert!(matches!(Money::parse("$-5.00"), Err(MoneyError::Negative(_))));
        assert!(matches!(Money::parse("-5"), Err(MoneyError::Negative(_))));
    }

    #[test]
    fn test_amounts_beyond_column_range_rejected() {
        assert_eq!(Money::parse("$99999999.99").unwrap().amount(), MAX_AMOUNT);
        assert!(matches!(Money::parse("$99999999.995"), Err(MoneyError::TooLarge(_))));
        assert!(matches!(
            Money::parse(&Decimal::MAX.to_string()),
            Err(MoneyError::TooLarge(_))
        ));
        assert!(matches!(Money::new(Decimal::MAX), Err(MoneyError::TooLarge(_))));
    }

    #[test]
    fn test_display_always_has_dollar_and_cents() {
        assert_eq!(Money::parse("12").unwrap().to_string(), "$12.00");
        assert_eq!(Money::parse("$0.5").unwrap().to_string(), "$0.50");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_serde_uses_dollar_string() {
        let money = Money::parse("25").unwrap();
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"$25.00\"");

        let back: Money = serde_json::from_str("\"25.5\"").unwrap();
        assert_eq!(back.amount(), dec!(25.50));

        assert!(serde_json::from_str::<Money>("\"-1\"").is_err());
    }

    #[test]
    fn test_new_rejects_negative() {
        assert!(Money::new(dec!(-0.01)).is_err());
        assert_eq!(Money::new(dec!(3.333)).unwrap().amount(), dec!(3.33));
    }
}
