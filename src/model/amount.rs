//! Amount type for reading and printing money.
//!
//! Ledger records hold plain `Decimal` values. `Amount` is the user-facing wrapper: it parses
//! input that may include a dollar sign and thousands separators, and prints values as
//! `-$1,234.56`.

use crate::error::Error;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The largest amount a single transaction may carry: one trillion.
///
/// Sums over a ledger of such amounts stay far inside `Decimal`'s range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Represents a money value.
///
/// # Examples
///
/// ```
/// # use pocket_ledger::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("$1,250.5").unwrap();
/// assert_eq!(amount.to_string(), "$1,250.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Parses a strictly positive magnitude no larger than [`MAX_AMOUNT`], the only kind of
    /// amount a transaction may carry.
    pub fn parse_magnitude(s: &str) -> crate::Result<Self> {
        let amount = Amount::from_str(s)?;
        check_magnitude(amount.0)?;
        Ok(amount)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid("An amount is required"));
        }

        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let digits = rest.strip_prefix('$').unwrap_or(rest).replace(',', "");
        if digits.starts_with(['-', '+']) {
            return Err(Error::invalid(format!("Unable to parse amount '{s}': misplaced sign")));
        }

        let value = Decimal::from_str(&digits)
            .map_err(|e| Error::invalid(format!("Unable to parse amount '{s}': {e}")))?;
        Ok(Amount(if negative { -value } else { value }))
    }
}

/// Fails with `InvalidArgument` unless `value` is in `(0, MAX_AMOUNT]`.
pub(crate) fn check_magnitude(value: Decimal) -> crate::Result<()> {
    if value <= Decimal::ZERO {
        return Err(Error::invalid(format!(
            "Amount must be greater than zero, got {value}"
        )));
    }
    if value > MAX_AMOUNT {
        return Err(Error::invalid(format!(
            "Amount must not exceed {MAX_AMOUNT}, got {value}"
        )));
    }
    Ok(())
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.0.is_sign_negative() && !self.0.is_zero() {
            "-"
        } else {
            ""
        };
        let num = self.0.abs().to_f64().unwrap_or_default();
        write!(f, "{sign}${}", format_num::format_num!(",.2", num))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain_and_dollar() {
        assert_eq!(Amount::from_str("50.00").unwrap().value(), dec("50"));
        assert_eq!(Amount::from_str(" $50.25 ").unwrap().value(), dec("50.25"));
        assert_eq!(Amount::from_str("-$50").unwrap().value(), dec("-50"));
    }

    #[test]
    fn test_parse_commas() {
        let amount = Amount::from_str("$1,234,567.89").unwrap();
        assert_eq!(amount.value(), dec("1234567.89"));
    }

    #[test]
    fn test_parse_garbage() {
        let err = Amount::from_str("twelve").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);
        assert!(Amount::from_str("").is_err());
    }

    #[test]
    fn test_parse_rejects_second_sign() {
        for input in ["--5", "-$-5", "$-5", "+5", "-+5"] {
            let err = Amount::from_str(input).unwrap_err();
            assert_eq!(err.error_type(), ErrorType::InvalidArgument, "{input}");
        }
        assert!(Amount::parse_magnitude("--5").is_err());
    }

    #[test]
    fn test_parse_magnitude_rejects_zero_and_negative() {
        assert!(Amount::parse_magnitude("0").is_err());
        assert!(Amount::parse_magnitude("-5").is_err());
        assert_eq!(Amount::parse_magnitude("5").unwrap().value(), dec("5"));
    }

    #[test]
    fn test_parse_magnitude_caps_size() {
        assert_eq!(MAX_AMOUNT, dec("1000000000000"));
        assert!(Amount::parse_magnitude("1,000,000,000,000").is_ok());
        let err = Amount::parse_magnitude("1000000000000.01").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidArgument);
        assert!(Amount::parse_magnitude("50000000000000000000000000000").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::new(dec("60000")).to_string(), "$60,000.00");
        assert_eq!(Amount::new(dec("-4.5")).to_string(), "-$4.50");
        assert_eq!(Amount::new(Decimal::ZERO).to_string(), "$0.00");
    }

    #[test]
    fn test_serde_as_string() {
        let amount = Amount::new(dec("33.34"));
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"$33.34\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
